use serde::{Deserialize, Serialize};
use std::fmt;

use crate::source::SourceRange;

/// How bad a diagnostic is. None of these stop ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Every recoverable condition the pipeline reports against a source range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// COPY chain revisits a member already open on the inclusion stack
    CircularInclude,
    /// COPY member not found on the search path
    UnresolvedInclude,
    /// COPY nesting deeper than the configured limit
    IncludeTooDeep,
    /// Unparseable REPLACE / COPY REPLACING operands
    MalformedDirective,
    /// String literal not closed and not continued correctly
    MalformedLiteral,
    /// Header or 01/77 entry outside Area A
    AreaAViolation,
    /// Sentence the parser could not understand; kept verbatim
    OpaqueStatement,
    /// Level number out of order or out of range
    LevelNesting,
    /// REDEFINES target undefined or declared later
    UnresolvedRedefines,
    /// OCCURS DEPENDING ON counter not found
    UnresolvedOccursCounter,
    /// PERFORM / GO TO target not declared in the unit
    DanglingTarget,
    /// PERFORM / GO TO target matches several procedures
    AmbiguousTarget,
    /// CALL to a program outside this unit
    ExternalCall,
    /// Division appears after a division that must follow it
    DivisionOrder,
}

impl DiagnosticKind {
    #[must_use]
    pub const fn default_severity(self) -> Severity {
        match self {
            Self::CircularInclude | Self::UnresolvedInclude | Self::IncludeTooDeep => {
                Severity::Error
            }
            Self::ExternalCall => Severity::Info,
            _ => Severity::Warning,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CircularInclude => "circular_include",
            Self::UnresolvedInclude => "unresolved_include",
            Self::IncludeTooDeep => "include_too_deep",
            Self::MalformedDirective => "malformed_directive",
            Self::MalformedLiteral => "malformed_literal",
            Self::AreaAViolation => "area_a_violation",
            Self::OpaqueStatement => "opaque_statement",
            Self::LevelNesting => "level_nesting",
            Self::UnresolvedRedefines => "unresolved_redefines",
            Self::UnresolvedOccursCounter => "unresolved_occurs_counter",
            Self::DanglingTarget => "dangling_target",
            Self::AmbiguousTarget => "ambiguous_target",
            Self::ExternalCall => "external_call",
            Self::DivisionOrder => "division_order",
        }
    }
}

/// A recorded, non-fatal finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub range: SourceRange,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, range: SourceRange, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            range,
            message: message.into(),
        }
    }

    /// Builder: override the default severity
    #[must_use]
    pub const fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.range,
            self.kind.as_str(),
            self.message
        )
    }
}
