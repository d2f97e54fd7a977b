use lens_frontend::parser::{Access, DataSectionKind, FileDescriptionKind, ProgramTree};
use lens_frontend::{Diagnostic, SourceRange, SourceUnit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::metrics::Metrics;

/// Handle of a [`DataItem`] inside its model's item table
pub type ItemId = u32;

/// A data name as written by a clause or statement, with what it resolved to.
///
/// `resolved` is empty for an unknown name and holds several ids when the name is
/// ambiguous under the given qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub name: String,
    /// Innermost first, upper-cased
    pub qualifiers: Vec<String>,
    pub range: SourceRange,
    pub resolved: Vec<ItemId>,
}

impl ItemRef {
    #[must_use]
    pub fn unique(&self) -> Option<ItemId> {
        match self.resolved.as_slice() {
            [id] => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurs {
    pub min: u32,
    pub max: u32,
    /// Counter of a variable-length table
    pub depending_on: Option<ItemRef>,
    pub indexed_by: Vec<String>,
}

impl Occurs {
    #[must_use]
    pub const fn is_variable(&self) -> bool {
        self.depending_on.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renames {
    pub from: ItemRef,
    pub thru: Option<ItemRef>,
}

/// One data description entry after level nesting has been resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItem {
    pub id: ItemId,
    pub level: u8,
    /// `None` for FILLER
    pub name: Option<String>,
    /// Whole entry, level number to period
    pub range: SourceRange,
    /// The name word alone
    pub name_range: Option<SourceRange>,
    pub section: DataSectionKind,
    /// Owning FD/SD for file records and their subordinates
    pub file: Option<String>,
    /// Enclosing group (non-owning handle into the same table)
    pub parent: Option<ItemId>,
    pub children: Vec<ItemId>,
    /// Enclosing names, innermost first, upper-cased; ends with the file name for records
    pub qualification: Vec<String>,
    pub picture: Option<String>,
    pub usage: Option<String>,
    pub value: Option<String>,
    pub redefines: Option<ItemRef>,
    pub occurs: Option<Occurs>,
    pub renames: Option<Renames>,
}

impl DataItem {
    #[must_use]
    pub fn upper_name(&self) -> Option<String> {
        self.name.as_deref().map(str::to_ascii_uppercase)
    }

    #[must_use]
    pub const fn is_condition(&self) -> bool {
        self.level == 88
    }

    /// Where the item is defined: its name, or the entry for FILLER
    #[must_use]
    pub fn definition_range(&self) -> &SourceRange {
        self.name_range.as_ref().unwrap_or(&self.range)
    }

    /// Has subordinate entries other than condition names
    #[must_use]
    pub fn is_group(&self, items: &[DataItem]) -> bool {
        self.children
            .iter()
            .filter_map(|id| items.get(*id as usize))
            .any(|child| child.level < 50)
    }

    /// `BALANCE OF CUSTOMER-REC`
    #[must_use]
    pub fn qualified_name(&self) -> String {
        let mut out = self.name.clone().unwrap_or_else(|| "FILLER".to_string());
        for qualifier in &self.qualification {
            out.push_str(" OF ");
            out.push_str(qualifier);
        }
        out
    }
}

/// FD/SD merged with its SELECT entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub kind: Option<FileDescriptionKind>,
    pub range: SourceRange,
    pub assign_to: Option<String>,
    pub organization: Option<String>,
    pub access: Option<String>,
    pub status: Option<ItemRef>,
    pub records: Vec<ItemId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    Section,
    Paragraph,
    /// Body of an inline `PERFORM ... END-PERFORM`
    InlinePerform,
}

impl ProcedureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Paragraph => "paragraph",
            Self::InlinePerform => "inline-perform",
        }
    }
}

/// A data reference made by a statement inside one procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAccess {
    pub item: ItemRef,
    pub access: Access,
    pub verb: String,
}

/// Section, paragraph or inline PERFORM body.
///
/// Keys are stable across re-parses: `SECTION`, `SECTION::PARA` (or `PARA` outside
/// any section), `scope::#n` for unnamed paragraphs and `owner::perform#n` for inline
/// bodies, `n` counting from 1 in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureNode {
    pub key: String,
    pub name: Option<String>,
    pub kind: ProcedureKind,
    /// Key of the enclosing section (paragraphs) or owner (inline bodies)
    pub parent: Option<String>,
    /// Key of the section governing unqualified name lookups
    pub section: Option<String>,
    pub range: SourceRange,
    pub name_range: Option<SourceRange>,
    /// Source order among all procedures of the unit
    pub position: u32,
    pub statements: u32,
    pub decisions: u32,
    pub accesses: Vec<DataAccess>,
}

impl ProcedureNode {
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.key)
    }

    #[must_use]
    pub fn definition_range(&self) -> &SourceRange {
        self.name_range.as_ref().unwrap_or(&self.range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Perform,
    GoTo,
    Call,
    /// Section → paragraph, owner → inline body
    Contains,
}

impl EdgeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Perform => "perform",
            Self::GoTo => "goto",
            Self::Call => "call",
            Self::Contains => "contains",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EdgeTarget {
    /// Procedure of the same unit
    Resolved { key: String },
    /// Several procedures share the name; none was picked
    Ambiguous { name: String, candidates: Vec<String> },
    /// Procedure name never declared in the unit
    Unresolved { name: String },
    /// CALL of another program by literal name
    External { program: String },
    /// CALL through a data item, known only at run time
    Dynamic { data_name: String },
}

impl EdgeTarget {
    #[must_use]
    pub fn resolved_key(&self) -> Option<&str> {
        match self {
            Self::Resolved { key } => Some(key),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Resolved { key } => key,
            Self::Ambiguous { name, .. } | Self::Unresolved { name } => name,
            Self::External { program } => program,
            Self::Dynamic { data_name } => data_name,
        }
    }
}

impl fmt::Display for EdgeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved { key } => f.write_str(key),
            Self::Ambiguous { name, candidates } => {
                write!(f, "{name} (ambiguous: {})", candidates.join(", "))
            }
            Self::Unresolved { name } => write!(f, "{name} (unresolved)"),
            Self::External { program } => write!(f, "program {program}"),
            Self::Dynamic { data_name } => write!(f, "dynamic via {data_name}"),
        }
    }
}

/// Directed control transfer out of a procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub kind: EdgeKind,
    pub target: EdgeTarget,
    /// End of a `PERFORM a THRU b` range
    pub thru: Option<EdgeTarget>,
    /// Where the target name is written (the child's header for `Contains`)
    pub range: SourceRange,
    pub thru_range: Option<SourceRange>,
}

/// Consolidated, immutable model of one source unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramModel {
    pub unit_id: Arc<str>,
    pub program_id: Option<String>,
    pub path: Option<PathBuf>,
    pub content_hash: String,
    /// COPY members expanded into the unit, first use first
    pub copybooks: Vec<String>,
    /// Literal CALL targets, first use first
    pub external_calls: Vec<String>,
    pub source: SourceUnit,
    pub tree: ProgramTree,
    pub items: Vec<DataItem>,
    /// Upper-cased name → every item carrying it
    pub names: BTreeMap<String, Vec<ItemId>>,
    pub files: Vec<FileInfo>,
    /// Source order
    pub procedures: Vec<ProcedureNode>,
    pub procedure_keys: BTreeMap<String, usize>,
    pub edges: Vec<Edge>,
    pub diagnostics: Vec<Diagnostic>,
    pub metrics: Metrics,
}

impl ProgramModel {
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&DataItem> {
        self.items.get(id as usize)
    }

    #[must_use]
    pub fn items_named(&self, name: &str) -> &[ItemId] {
        self.names
            .get(&name.to_ascii_uppercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Items matching `name` whose enclosing names contain `qualifiers` in order
    #[must_use]
    pub fn resolve_item(&self, name: &str, qualifiers: &[String]) -> Vec<ItemId> {
        crate::data::resolve(&self.items, &self.names, name, qualifiers)
    }

    /// Ancestors of an item, nearest first
    pub fn parent_chain(&self, id: ItemId) -> impl Iterator<Item = &DataItem> {
        let mut next = self.item(id).and_then(|item| item.parent);
        std::iter::from_fn(move || {
            let item = self.item(next?)?;
            next = item.parent;
            Some(item)
        })
    }

    #[must_use]
    pub fn procedure(&self, key: &str) -> Option<&ProcedureNode> {
        self.procedure_keys
            .get(key)
            .and_then(|idx| self.procedures.get(*idx))
    }

    /// Sections and paragraphs carrying `name` (case-insensitive)
    pub fn procedures_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ProcedureNode> + 'a {
        self.procedures.iter().filter(move |node| {
            node.name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
    }

    pub fn outgoing<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.from == key)
    }

    pub fn incoming<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| {
            edge.target.resolved_key() == Some(key)
                || edge.thru.as_ref().and_then(EdgeTarget::resolved_key) == Some(key)
        })
    }

    #[must_use]
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Program name used for cross-unit links: PROGRAM-ID, else the unit id
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program_id
            .clone()
            .unwrap_or_else(|| self.unit_id.to_string())
            .to_ascii_uppercase()
    }
}
