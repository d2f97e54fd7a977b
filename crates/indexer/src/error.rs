use lens_frontend::FrontendError;
use lens_model::ModelError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Frontend error: {0}")]
    FrontendError(#[from] FrontendError),

    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error("{0}")]
    Other(String),
}
