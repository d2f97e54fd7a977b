use std::path::PathBuf;
use thiserror::Error;

use crate::source::SourceRange;

/// Result type for frontend operations
pub type Result<T> = std::result::Result<T, FrontendError>;

/// Errors that stop a whole source unit (or the configuration) from being processed.
///
/// Everything recoverable is reported as a [`crate::Diagnostic`] instead.
#[derive(Error, Debug)]
pub enum FrontendError {
    /// IO error while reading a unit
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No IDENTIFICATION/ENVIRONMENT/DATA/PROCEDURE header anywhere in the unit
    #[error("no division headers found in unit {unit}")]
    NoDivisions { unit: String },

    /// A division header runs into end-of-unit without its terminating period
    #[error("division header at {range} is not terminated before end of unit")]
    UnterminatedDivision { range: SourceRange },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Empty content
    #[error("Empty content provided for unit {0}")]
    EmptyContent(String),
}

impl FrontendError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this error means the unit itself is structurally unusable.
    #[must_use]
    pub const fn is_fatal_to_unit(&self) -> bool {
        matches!(
            self,
            Self::NoDivisions { .. } | Self::UnterminatedDivision { .. } | Self::EmptyContent(_)
        )
    }
}
