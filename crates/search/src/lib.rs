//! # cobol-lens search
//!
//! Queries over a corpus snapshot: definitions, references, call graph
//! neighborhoods, data access, ranked and fuzzy name search.
//!
//! ```text
//! Corpus ──snapshot()──> QueryEngine
//!                          ├─ find_definition / find_references   (UnitIndex terms)
//!                          ├─ call_graph_neighborhood             (edge adjacency, BFS)
//!                          ├─ search  exact > prefix > substring  (fuzzy fallback)
//!                          ├─ excerpt / summaries / stats         (lens-protocol views)
//!                          └─ overview / relationships / refactoring_candidates
//! ```

mod analytics;
mod engine;
mod error;
mod fuzzy;
mod neighborhood;
mod query;
mod views;

pub use analytics::RefactoringThresholds;
pub use engine::QueryEngine;
pub use error::{Result, SearchError};
pub use fuzzy::FuzzySearch;
pub use query::{ProcedureRef, QualifiedName};
