mod services;

use lens_indexer::IndexerError;
use lens_protocol::ErrorEnvelope;
use lens_search::SearchError;
use serde::Serialize;
use serde_json::Value;

pub use services::execute;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

/// What every command prints on stdout
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    pub data: Value,
    pub meta: ResponseMeta,
}

impl CommandResponse {
    pub fn ok(data: Value, meta: ResponseMeta) -> Self {
        Self {
            status: CommandStatus::Ok,
            error: None,
            data,
            meta,
        }
    }

    pub fn error(err: &anyhow::Error) -> Self {
        Self {
            status: CommandStatus::Error,
            error: Some(classify_error(err)),
            data: Value::Null,
            meta: ResponseMeta::default(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == CommandStatus::Error
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Units in the corpus the answer was computed from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    /// Units re-parsed before answering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reindexed: Option<usize>,
}

/// Stable code and a next-step hint for a failed command
pub fn classify_error(err: &anyhow::Error) -> ErrorEnvelope {
    let message = format!("{err:#}");

    if let Some(search) = err.downcast_ref::<SearchError>() {
        let hint = match search {
            SearchError::EmptyQuery => Some("Pass a non-empty name or fragment."),
            SearchError::UnitNotFound(_) => Some("Run `cobol-lens stats` to list indexed units."),
            SearchError::ProcedureNotFound(_) => {
                Some("Look the name up with `cobol-lens search <fragment>`.")
            }
            SearchError::AmbiguousProcedure { .. } => {
                Some("Qualify the procedure as UNIT/KEY, e.g. PAYROLL/MAIN::STEP-A.")
            }
            SearchError::Payload(_) => Some("Raise --max-chars or lower --context."),
            SearchError::Other(_) => None,
        };
        return ErrorEnvelope {
            code: search.code().to_string(),
            message,
            hint: hint.map(str::to_string),
        };
    }

    if let Some(indexer) = err.downcast_ref::<IndexerError>() {
        let code = match indexer {
            IndexerError::InvalidPath(_) => "invalid_path",
            IndexerError::UnitNotFound(_) => "unit_not_found",
            IndexerError::IoError(_) => "io",
            _ => "index",
        };
        return ErrorEnvelope {
            code: code.to_string(),
            message,
            hint: Some("Check the project path and run `cobol-lens index`.".to_string()),
        };
    }

    let code = if message.contains("Invalid project path") {
        "invalid_path"
    } else if message.contains("config") {
        "config"
    } else {
        "internal"
    };
    ErrorEnvelope {
        code: code.to_string(),
        message,
        hint: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_errors_keep_their_codes() {
        let err = anyhow::Error::new(SearchError::AmbiguousProcedure {
            name: "MAIN-PARA".to_string(),
            candidates: vec!["A/MAIN-PARA".to_string(), "B/MAIN-PARA".to_string()],
        });
        let envelope = classify_error(&err);
        assert_eq!(envelope.code, "ambiguous_procedure");
        assert!(envelope.message.contains("A/MAIN-PARA"));
        assert!(envelope.hint.is_some());
    }

    #[test]
    fn context_does_not_hide_the_source_error() {
        let err = anyhow::Error::new(SearchError::EmptyQuery).context("search failed");
        assert_eq!(classify_error(&err).code, "empty_query");

        let other = anyhow::anyhow!("boom");
        assert_eq!(classify_error(&other).code, "internal");
    }
}
