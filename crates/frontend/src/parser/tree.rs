//! Structural tree produced by the parser.
//!
//! The tree owns everything top-down; no node points back at its parent. Names keep
//! the spelling found in the source, comparisons go through [`Name::upper`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::source::SourceRange;

/// A user-defined word and where it was written
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    pub text: String,
    pub range: SourceRange,
}

impl Name {
    #[must_use]
    pub fn upper(&self) -> String {
        self.text.to_ascii_uppercase()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivisionKind {
    Identification,
    Environment,
    Data,
    Procedure,
}

impl DivisionKind {
    #[must_use]
    pub fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "IDENTIFICATION" | "ID" => Some(Self::Identification),
            "ENVIRONMENT" => Some(Self::Environment),
            "DATA" => Some(Self::Data),
            "PROCEDURE" => Some(Self::Procedure),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identification => "IDENTIFICATION",
            Self::Environment => "ENVIRONMENT",
            Self::Data => "DATA",
            Self::Procedure => "PROCEDURE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionHeader {
    pub kind: DivisionKind,
    pub range: SourceRange,
}

/// Root of one unit's parse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramTree {
    pub unit: Arc<str>,
    /// Headers in source order
    pub headers: Vec<DivisionHeader>,
    pub identification: Option<IdentificationDivision>,
    pub environment: Option<EnvironmentDivision>,
    pub data: Option<DataDivision>,
    pub procedure: Option<ProcedureDivision>,
}

impl ProgramTree {
    #[must_use]
    pub fn program_id(&self) -> Option<&Name> {
        self.identification
            .as_ref()
            .and_then(|id| id.program_id.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentificationDivision {
    pub range: SourceRange,
    pub program_id: Option<Name>,
    /// AUTHOR, DATE-WRITTEN, ... → their free text
    pub paragraphs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDivision {
    pub range: SourceRange,
    pub file_controls: Vec<FileControl>,
}

/// `SELECT file ASSIGN TO ...` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileControl {
    pub name: Name,
    pub assign_to: Option<String>,
    pub organization: Option<String>,
    pub access: Option<String>,
    pub status: Option<DataRef>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDivision {
    pub range: SourceRange,
    pub sections: Vec<DataSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSectionKind {
    File,
    WorkingStorage,
    LocalStorage,
    Linkage,
    Other,
}

impl DataSectionKind {
    #[must_use]
    pub fn from_word(word: &str) -> Self {
        match word.to_ascii_uppercase().as_str() {
            "FILE" => Self::File,
            "WORKING-STORAGE" => Self::WorkingStorage,
            "LOCAL-STORAGE" => Self::LocalStorage,
            "LINKAGE" => Self::Linkage,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSection {
    pub kind: DataSectionKind,
    /// `None` for entries written before any section header
    pub name: Option<Name>,
    pub range: SourceRange,
    pub files: Vec<FileDescription>,
    pub entries: Vec<DataEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileDescriptionKind {
    Fd,
    Sd,
}

/// FD / SD entry with the record descriptions that follow it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescription {
    pub kind: FileDescriptionKind,
    pub name: Name,
    pub range: SourceRange,
    pub records: Vec<DataEntry>,
}

/// One data description entry, clauses kept raw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub level: u8,
    /// `None` for FILLER and unnamed entries
    pub name: Option<Name>,
    pub range: SourceRange,
    pub picture: Option<String>,
    pub usage: Option<String>,
    pub redefines: Option<Name>,
    pub occurs: Option<OccursClause>,
    pub value: Option<String>,
    pub renames: Option<RenamesClause>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccursClause {
    pub min: u32,
    pub max: u32,
    pub depending_on: Option<DataRef>,
    pub indexed_by: Vec<Name>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamesClause {
    pub from: DataRef,
    pub thru: Option<DataRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureDivision {
    pub range: SourceRange,
    pub using: Vec<DataRef>,
    pub returning: Option<DataRef>,
    pub sections: Vec<SectionNode>,
}

impl ProcedureDivision {
    pub fn paragraphs(&self) -> impl Iterator<Item = &ParagraphNode> {
        self.sections.iter().flat_map(|s| s.paragraphs.iter())
    }
}

/// A named section, or the implicit one holding paragraphs written before any section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionNode {
    pub name: Option<Name>,
    pub range: SourceRange,
    pub paragraphs: Vec<ParagraphNode>,
}

/// A named paragraph, or the anonymous one holding sentences written before any paragraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphNode {
    pub name: Option<Name>,
    pub range: SourceRange,
    pub sentences: Vec<Sentence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub range: SourceRange,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Upper-cased first word
    pub verb: String,
    pub range: SourceRange,
    pub kind: StatementKind,
    pub operands: Vec<DataRef>,
}

impl Statement {
    /// IF, WHEN, EVALUATE and looping PERFORMs
    #[must_use]
    pub fn is_decision(&self) -> bool {
        match &self.kind {
            StatementKind::Perform(perform) => perform.looping,
            _ => matches!(self.verb.as_str(), "IF" | "WHEN" | "EVALUATE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatementKind {
    Plain,
    Perform(PerformStatement),
    GoTo {
        targets: Vec<Name>,
        depending: Option<DataRef>,
    },
    Call {
        target: CallTarget,
    },
    /// `EXEC ... END-EXEC` vendor block
    Exec {
        text: String,
    },
    /// Sentence the grammar did not recognize, verbatim
    Opaque {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformStatement {
    /// Out-of-line target; `None` for inline bodies
    pub target: Option<Name>,
    pub thru: Option<Name>,
    /// Statements between PERFORM and END-PERFORM
    pub inline: Vec<Statement>,
    /// UNTIL / VARYING / TIMES
    pub looping: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CallTarget {
    /// `CALL 'PROG'`: program name without quotes
    Literal(Name),
    /// `CALL WS-PROG`: target known only at run time
    Dynamic(DataRef),
}

/// How a statement touches a data item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    #[must_use]
    pub const fn reads(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    #[must_use]
    pub const fn writes(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// A (possibly qualified) data name used by a statement or clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRef {
    pub name: String,
    /// `A OF B IN C` → ["B", "C"], innermost first
    pub qualifiers: Vec<String>,
    /// Range of the name itself
    pub range: SourceRange,
    pub access: Access,
}

impl DataRef {
    #[must_use]
    pub fn upper(&self) -> String {
        self.name.to_ascii_uppercase()
    }
}
