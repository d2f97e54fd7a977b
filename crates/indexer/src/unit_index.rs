use lens_frontend::parser::Access;
use lens_frontend::SourceRange;
use lens_model::{EdgeKind, EdgeTarget, ItemRef, ProgramModel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What an indexed name denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Data,
    Condition,
    File,
    Procedure,
    Program,
}

/// How an occurrence uses the name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Definition,
    Read,
    Write,
    ReadWrite,
    Perform,
    GoTo,
    Call,
    /// REDEFINES, OCCURS DEPENDING ON, RENAMES, FILE STATUS, USING / RETURNING
    Clause,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "read_write",
            Self::Perform => "perform",
            Self::GoTo => "goto",
            Self::Call => "call",
            Self::Clause => "clause",
        }
    }
}

impl From<Access> for Role {
    fn from(access: Access) -> Self {
        match access {
            Access::Read => Self::Read,
            Access::Write => Self::Write,
            Access::ReadWrite => Self::ReadWrite,
        }
    }
}

/// One place a name is written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Spelling found in the source
    pub text: String,
    pub kind: SymbolKind,
    pub role: Role,
    pub range: SourceRange,
    /// Key of the procedure the occurrence sits in
    pub procedure: Option<String>,
}

/// A unit's contribution to the corpus index.
///
/// `terms` maps upper-cased names to their occurrences in source order; `outgoing` and
/// `incoming` map procedure keys to positions in the model's edge list. Built purely
/// from one [`ProgramModel`], so rebuilding the same model yields the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitIndex {
    pub unit_id: Arc<str>,
    pub content_hash: String,
    terms: BTreeMap<String, Vec<Occurrence>>,
    outgoing: BTreeMap<String, Vec<usize>>,
    incoming: BTreeMap<String, Vec<usize>>,
}

impl UnitIndex {
    pub fn build(model: &ProgramModel) -> Self {
        let mut collector = Collector::new(model);

        if let Some(program) = model.tree.program_id() {
            collector.push(
                program.text.clone(),
                SymbolKind::Program,
                Role::Definition,
                &program.range,
                None,
            );
        }

        for item in &model.items {
            let kind = if item.is_condition() {
                SymbolKind::Condition
            } else {
                SymbolKind::Data
            };
            if let Some(name) = &item.name {
                collector.push(name.clone(), kind, Role::Definition, item.definition_range(), None);
            }
            if let Some(target) = &item.redefines {
                collector.item_ref(target, Role::Clause, None);
            }
            if let Some(counter) = item.occurs.as_ref().and_then(|o| o.depending_on.as_ref()) {
                collector.item_ref(counter, Role::Clause, None);
            }
            if let Some(renames) = &item.renames {
                collector.item_ref(&renames.from, Role::Clause, None);
                if let Some(thru) = &renames.thru {
                    collector.item_ref(thru, Role::Clause, None);
                }
            }
        }

        for file in &model.files {
            collector.push(file.name.clone(), SymbolKind::File, Role::Definition, &file.range, None);
            if let Some(status) = &file.status {
                collector.item_ref(status, Role::Clause, None);
            }
        }

        if let Some(procedure) = &model.tree.procedure {
            let parameters = procedure.using.iter().chain(procedure.returning.iter());
            for data_ref in parameters {
                let item = model.resolve_item(&data_ref.name, &data_ref.qualifiers);
                let kind = collector.data_kind(&item);
                collector.push(data_ref.name.clone(), kind, Role::Clause, &data_ref.range, None);
            }
        }

        for node in &model.procedures {
            if let Some(name) = &node.name {
                collector.push(
                    name.clone(),
                    SymbolKind::Procedure,
                    Role::Definition,
                    node.definition_range(),
                    Some(&node.key),
                );
            }
            for access in &node.accesses {
                collector.item_ref(&access.item, access.access.into(), Some(&node.key));
            }
        }

        let mut outgoing: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut incoming: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (position, edge) in model.edges.iter().enumerate() {
            outgoing.entry(edge.from.clone()).or_default().push(position);
            let targets = std::iter::once(&edge.target).chain(edge.thru.iter());
            for key in targets.filter_map(EdgeTarget::resolved_key) {
                let slot = incoming.entry(key.to_string()).or_default();
                if slot.last() != Some(&position) {
                    slot.push(position);
                }
            }

            let role = match edge.kind {
                EdgeKind::Perform => Role::Perform,
                EdgeKind::GoTo => Role::GoTo,
                EdgeKind::Call => Role::Call,
                EdgeKind::Contains => continue,
            };
            match &edge.target {
                EdgeTarget::External { program } => {
                    collector.push(program.clone(), SymbolKind::Program, role, &edge.range, Some(&edge.from));
                }
                EdgeTarget::Dynamic { data_name } => {
                    let item = model.resolve_item(data_name, &[]);
                    let kind = collector.data_kind(&item);
                    collector.push(data_name.clone(), kind, Role::Read, &edge.range, Some(&edge.from));
                }
                target => {
                    let text = collector.written(&edge.range, target);
                    collector.push(text, SymbolKind::Procedure, role, &edge.range, Some(&edge.from));
                }
            }
            if let (Some(thru), Some(range)) = (&edge.thru, &edge.thru_range) {
                let text = collector.written(range, thru);
                collector.push(text, SymbolKind::Procedure, role, range, Some(&edge.from));
            }
        }

        let mut terms = collector.terms;
        for occurrences in terms.values_mut() {
            occurrences.sort_by(|a, b| {
                (a.range.line, a.range.start_col, a.role).cmp(&(b.range.line, b.range.start_col, b.role))
            });
            occurrences.dedup_by(|a, b| a.range == b.range && a.role == b.role);
        }

        log::debug!(
            "Indexed {}: {} terms, {} procedures with edges",
            model.unit_id,
            terms.len(),
            outgoing.len()
        );

        Self {
            unit_id: model.unit_id.clone(),
            content_hash: model.content_hash.clone(),
            terms,
            outgoing,
            incoming,
        }
    }

    /// Occurrences of exactly `name` (case-insensitive)
    #[must_use]
    pub fn exact(&self, name: &str) -> &[Occurrence] {
        self.terms
            .get(&name.to_ascii_uppercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Terms starting with `prefix`, in term order
    pub fn with_prefix<'a>(&'a self, prefix: &str) -> impl Iterator<Item = (&'a str, &'a [Occurrence])> + 'a {
        let prefix = prefix.to_ascii_uppercase();
        self.terms
            .range(prefix.clone()..)
            .take_while(move |(term, _)| term.starts_with(&prefix))
            .map(|(term, occurrences)| (term.as_str(), occurrences.as_slice()))
    }

    /// Terms containing `fragment` anywhere, in term order
    pub fn containing<'a>(&'a self, fragment: &str) -> impl Iterator<Item = (&'a str, &'a [Occurrence])> + 'a {
        let fragment = fragment.to_ascii_uppercase();
        self.terms
            .iter()
            .filter(move |(term, _)| term.contains(&fragment))
            .map(|(term, occurrences)| (term.as_str(), occurrences.as_slice()))
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    #[must_use]
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn occurrence_count(&self) -> usize {
        self.terms.values().map(Vec::len).sum()
    }

    /// Positions in the model's edge list leaving `key`
    #[must_use]
    pub fn outgoing(&self, key: &str) -> &[usize] {
        self.outgoing.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Positions in the model's edge list whose target (or THRU end) is `key`
    #[must_use]
    pub fn incoming(&self, key: &str) -> &[usize] {
        self.incoming.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}

struct Collector<'m> {
    model: &'m ProgramModel,
    terms: BTreeMap<String, Vec<Occurrence>>,
}

impl<'m> Collector<'m> {
    fn new(model: &'m ProgramModel) -> Self {
        Self {
            model,
            terms: BTreeMap::new(),
        }
    }

    fn push(&mut self, text: String, kind: SymbolKind, role: Role, range: &SourceRange, procedure: Option<&String>) {
        if text.is_empty() {
            return;
        }
        self.terms
            .entry(text.to_ascii_uppercase())
            .or_default()
            .push(Occurrence {
                text,
                kind,
                role,
                range: range.clone(),
                procedure: procedure.cloned(),
            });
    }

    fn item_ref(&mut self, item: &ItemRef, role: Role, procedure: Option<&String>) {
        let kind = self.data_kind(&item.resolved);
        self.push(item.name.clone(), kind, role, &item.range, procedure);
    }

    /// Condition when every candidate is a level 88
    fn data_kind(&self, resolved: &[u32]) -> SymbolKind {
        let all_conditions = !resolved.is_empty()
            && resolved
                .iter()
                .all(|id| self.model.item(*id).is_some_and(|item| item.is_condition()));
        if all_conditions {
            SymbolKind::Condition
        } else {
            SymbolKind::Data
        }
    }

    /// The procedure name as written at `range`, falling back to the target's label
    fn written(&self, range: &SourceRange, target: &EdgeTarget) -> String {
        let text = self.model.source.slice(range);
        if text.trim().is_empty() {
            let label = target.label();
            label.rsplit("::").next().unwrap_or(label).to_string()
        } else {
            text.trim().to_string()
        }
    }
}
