use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod range_key;

pub use range_key::{RangeKey, RangeKeyError};

pub const PROTOCOL_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    DataItem,
    ConditionName,
    File,
    Section,
    Paragraph,
    InlinePerform,
    Program,
}

/// Where a span came from before COPY expansion
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct Origin {
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct Definition {
    pub unit: String,
    pub kind: SymbolKind,
    pub name: String,
    /// `BALANCE OF CUSTOMER-REC`, or the procedure key
    pub qualified_name: String,
    pub location: RangeKey,
    pub origin: Option<Origin>,
    pub level: Option<u8>,
    pub picture: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceRole {
    Definition,
    Read,
    Write,
    ReadWrite,
    Perform,
    GoTo,
    Call,
    Clause,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct Reference {
    pub unit: String,
    pub name: String,
    pub role: ReferenceRole,
    /// Procedure key the occurrence sits in
    pub procedure: Option<String>,
    pub location: RangeKey,
    pub origin: Option<Origin>,
}

/// Ranking class, best first
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Prefix,
    Substring,
    Fuzzy,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct SearchHit {
    pub unit: String,
    /// Indexed spelling that matched
    pub text: String,
    pub match_kind: MatchKind,
    pub role: ReferenceRole,
    pub location: RangeKey,
    /// Fuzzy matcher score; `None` for exact/prefix/substring
    pub score: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GraphDirection {
    #[default]
    Forward,
    Backward,
    Both,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct NodeView {
    /// `UNIT/KEY`
    pub id: String,
    pub unit: String,
    pub key: String,
    pub label: String,
    pub kind: SymbolKind,
    pub location: RangeKey,
    /// Hops from the root
    pub distance: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct EdgeView {
    pub from: String,
    /// Node id when resolved, otherwise the written target name
    pub to: String,
    pub kind: String,
    pub resolved: bool,
    pub label: String,
    pub location: RangeKey,
}

/// Bounded neighborhood for the presentation layer
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct GraphView {
    /// Every procedure the reference matched; an ambiguous name roots at all of them
    pub roots: Vec<String>,
    pub depth: u32,
    pub direction: GraphDirection,
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct DataItemView {
    pub name: String,
    pub qualified_name: String,
    pub level: u8,
    pub picture: Option<String>,
    pub usage: Option<String>,
    pub location: RangeKey,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct DataAccessView {
    pub unit: String,
    pub procedure: String,
    pub item: String,
    pub verb: String,
    pub reads: bool,
    pub writes: bool,
    pub location: RangeKey,
}

/// A procedure plus its direct edges and the data it touches, for the explanation
/// service
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ProcedureExcerpt {
    pub schema_version: u32,
    pub unit: String,
    pub key: String,
    pub kind: SymbolKind,
    pub location: RangeKey,
    /// Expanded source lines of the procedure plus the context window
    pub source: Vec<String>,
    pub first_line: u32,
    pub outgoing: Vec<EdgeView>,
    pub incoming: Vec<EdgeView>,
    pub data: Vec<DataItemView>,
    pub truncated: bool,
    pub used_chars: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct DiagnosticView {
    pub unit: String,
    pub kind: String,
    pub severity: String,
    pub message: String,
    pub location: RangeKey,
    pub origin: Option<Origin>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ProgramDependency {
    pub program: String,
    pub unit: String,
    /// Programs this one CALLs; `unit` is set when the callee is in the corpus
    pub calls: Vec<CallLink>,
    pub called_by: Vec<String>,
    pub copybooks: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct CallLink {
    pub program: String,
    pub unit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct UnitSummary {
    pub unit: String,
    pub program: String,
    pub path: Option<String>,
    pub source_lines: u32,
    pub expanded_lines: u32,
    pub statements: u32,
    pub decisions: u32,
    pub data_items: u32,
    pub sections: u32,
    pub paragraphs: u32,
    pub edges: u32,
    pub diagnostics: u32,
    /// low / medium / high
    pub complexity: String,
    pub copybooks: Vec<String>,
    /// Groups of procedures that PERFORM each other
    pub perform_cycles: Vec<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct FailedUnitView {
    pub unit: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct CorpusStats {
    pub schema_version: u32,
    pub units: usize,
    pub failed: Vec<FailedUnitView>,
    pub procedures: usize,
    pub edges: usize,
    pub data_items: usize,
    pub diagnostics: usize,
    pub terms: usize,
    pub occurrences: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct NameCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct ComplexityDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

/// Programs bucketed by source lines: <100, 100-499, 500-999, 1000+
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct SizeDistribution {
    pub small: usize,
    pub medium: usize,
    pub large: usize,
    pub very_large: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct CodebaseOverview {
    pub programs: usize,
    pub source_lines: u64,
    pub average_source_lines: u64,
    pub complexity: ComplexityDistribution,
    pub sizes: SizeDistribution,
    /// Distinct COPY members and CALL targets across the corpus
    pub unique_dependencies: usize,
    pub common_dependencies: Vec<NameCount>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct RelationshipReport {
    /// Program to dependency links, COPY members and CALL targets alike
    pub relationships: usize,
    pub programs_with_dependencies: usize,
    /// Programs that copy nothing and call nothing
    pub isolated_programs: Vec<String>,
    /// Called programs ranked by distinct callers
    pub most_depended_on: Vec<NameCount>,
    pub dependency_graph: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ProgramFigures {
    pub program: String,
    pub unit: String,
    pub source_lines: u32,
    pub complexity: String,
    pub dependencies: usize,
}

/// Programs sharing one dependency set
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct DependencyPattern {
    pub dependencies: Vec<String>,
    pub programs: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct RefactoringReport {
    pub high_complexity: Vec<ProgramFigures>,
    pub large_programs: Vec<ProgramFigures>,
    pub highly_dependent: Vec<ProgramFigures>,
    pub isolated_programs: Vec<ProgramFigures>,
    pub duplicate_dependencies: Vec<DependencyPattern>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct AnalyticsReport {
    pub overview: CodebaseOverview,
    pub relationships: RelationshipReport,
    pub refactoring: RefactoringReport,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub hint: Option<String>,
}

/// Serialized size of `value` once its own `used_chars` field is filled in
pub fn finalize_used_chars<T: Serialize>(
    value: &mut T,
    mut set_used: impl FnMut(&mut T, usize),
) -> Result<usize> {
    let mut used = 0usize;
    // the count feeds back into the payload, so iterate to a fixed point
    for _ in 0..8 {
        set_used(value, used);
        let raw = serde_json::to_string(value)?;
        let next = raw.chars().count();
        if next == used {
            return Ok(next);
        }
        used = next;
    }
    set_used(value, used);
    Ok(used)
}

/// Shrink `value` until its JSON fits in `max_chars`
pub fn enforce_max_chars<T: Serialize>(
    value: &mut T,
    max_chars: usize,
    mut set_used: impl FnMut(&mut T, usize),
    mut on_truncate: impl FnMut(&mut T),
    mut shrink: impl FnMut(&mut T) -> bool,
) -> Result<usize> {
    loop {
        let used = finalize_used_chars(value, &mut set_used)?;
        if used <= max_chars {
            return Ok(used);
        }
        on_truncate(value);
        if !shrink(value) {
            anyhow::bail!("payload exceeds budget (used_chars={used}, max_chars={max_chars})");
        }
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excerpt(lines: usize) -> ProcedureExcerpt {
        ProcedureExcerpt {
            schema_version: PROTOCOL_SCHEMA_VERSION,
            unit: "PAYROLL".to_string(),
            key: "MAIN-PARA".to_string(),
            kind: SymbolKind::Paragraph,
            location: RangeKey::new("PAYROLL", 10, 8, 20, 30),
            source: (0..lines).map(|n| format!("           DISPLAY 'LINE {n}'.")).collect(),
            first_line: 10,
            outgoing: Vec::new(),
            incoming: Vec::new(),
            data: Vec::new(),
            truncated: false,
            used_chars: 0,
        }
    }

    #[test]
    fn used_chars_matches_serialized_size() {
        let mut value = excerpt(3);
        let used = finalize_used_chars(&mut value, |v, used| v.used_chars = used).unwrap();
        assert_eq!(value.used_chars, used);
        assert_eq!(serde_json::to_string(&value).unwrap().chars().count(), used);
    }

    #[test]
    fn budget_drops_lines_until_it_fits() {
        let mut value = excerpt(50);
        let used = enforce_max_chars(
            &mut value,
            1_000,
            |v, used| v.used_chars = used,
            |v| v.truncated = true,
            |v| v.source.pop().is_some(),
        )
        .unwrap();
        assert!(used <= 1_000);
        assert!(value.truncated);
        assert!(value.source.len() < 50);
    }

    #[test]
    fn impossible_budget_is_an_error() {
        let mut value = excerpt(1);
        let result = enforce_max_chars(
            &mut value,
            10,
            |v, used| v.used_chars = used,
            |v| v.truncated = true,
            |v| v.source.pop().is_some(),
        );
        assert!(result.is_err());
    }
}
