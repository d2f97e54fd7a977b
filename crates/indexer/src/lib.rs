//! # cobol-lens indexer
//!
//! Per-unit indexes, the shared corpus and batch ingestion.
//!
//! ## Pipeline
//!
//! ```text
//! Project directory
//!     │
//!     ├──> UnitScanner (.gitignore aware)
//!     │      └─> .cbl / .cob / .cobol units, copybook directories
//!     │
//!     ├──> Pipeline (one unit per blocking task, bounded by a semaphore)
//!     │      ├─ preprocess → content hash unchanged? skip
//!     │      ├─ lex → parse → ModelBuilder
//!     │      └─ UnitIndex: names → occurrences, procedure → edges
//!     │
//!     ├──> Corpus (Arc snapshot swapped per commit, readers never block)
//!     │
//!     └──> UnitStore (.cobol-lens/units/*.json, tmp + rename)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use lens_frontend::FrontendConfig;
//! use lens_indexer::{Corpus, Pipeline, ProjectIngestor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lens_indexer::IndexerError> {
//!     let corpus = Arc::new(Corpus::new());
//!     let pipeline = Arc::new(Pipeline::new(FrontendConfig::relaxed(), corpus.clone())?);
//!     let stats = ProjectIngestor::new("/path/to/project", pipeline)?
//!         .ingest_all()
//!         .await?;
//!
//!     println!("Indexed {} units, {} failed", stats.indexed, stats.failed.len());
//!     Ok(())
//! }
//! ```

mod corpus;
mod error;
mod limits;
mod pipeline;
mod project;
mod scanner;
mod stats;
mod store;
mod unit_index;

pub use corpus::{Corpus, CorpusSnapshot, UnitEntry};
pub use error::{IndexerError, Result};
pub use limits::{ingest_concurrency, INGEST_CONCURRENCY_ENV};
pub use pipeline::{IngestOutcome, Pipeline};
pub use project::ProjectIngestor;
pub use scanner::{
    has_extension, unit_id_for_path, ScanResult, UnitScanner, COPY_EXTENSIONS, UNIT_EXTENSIONS,
};
pub use stats::{FailedUnit, IngestStats};
pub use store::{store_dir_for_project_root, UnitStore, STORE_DIR_NAME, UNIT_STORE_SCHEMA_VERSION};
pub use unit_index::{Occurrence, Role, SymbolKind, UnitIndex};
