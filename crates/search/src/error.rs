use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Empty query")]
    EmptyQuery,

    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error("Procedure not found: {0}")]
    ProcedureNotFound(String),

    /// The reference matched several procedures and the operation needs exactly one
    #[error("Procedure {name} is ambiguous: {}", candidates.join(", "))]
    AmbiguousProcedure { name: String, candidates: Vec<String> },

    #[error("Payload error: {0}")]
    Payload(#[from] anyhow::Error),

    #[error("{0}")]
    Other(String),
}

impl SearchError {
    /// Stable machine-readable code for error envelopes
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "empty_query",
            Self::UnitNotFound(_) => "unit_not_found",
            Self::ProcedureNotFound(_) => "procedure_not_found",
            Self::AmbiguousProcedure { .. } => "ambiguous_procedure",
            Self::Payload(_) => "payload",
            Self::Other(_) => "internal",
        }
    }
}
