use lens_frontend::FrontendError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Frontend(#[from] FrontendError),

    #[error("Procedure not found: {0}")]
    ProcedureNotFound(String),

    #[error("Data item not found: {0}")]
    ItemNotFound(u32),
}
