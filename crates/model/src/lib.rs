//! # cobol-lens program model
//!
//! Consolidates one parsed unit into an immutable [`ProgramModel`].
//!
//! ## Architecture
//!
//! ```text
//! FrontendOutput (SourceUnit + ProgramTree + diagnostics)
//!     │
//!     ├──> Pass 1: data division
//!     │      ├─ level-number nesting (parent handles, qualification chains)
//!     │      ├─ REDEFINES → earlier item, OCCURS DEPENDING → counter item
//!     │      └─ FD/SD records merged with SELECT entries
//!     │
//!     ├──> Pass 2: procedure division
//!     │      ├─ sections, paragraphs, inline PERFORM bodies (stable keys)
//!     │      ├─ PERFORM / GO TO / CALL edges, resolved or reported
//!     │      └─ data accesses per procedure
//!     │
//!     └──> ProgramModel ──> CallGraph (petgraph): cycles, reachability
//! ```

mod builder;
mod data;
mod error;
mod graph;
mod metrics;
mod procedure;
mod types;

pub use builder::ModelBuilder;
pub use error::{ModelError, Result};
pub use graph::CallGraph;
pub use metrics::{Complexity, Metrics};
pub use types::{
    DataAccess, DataItem, Edge, EdgeKind, EdgeTarget, FileInfo, ItemId, ItemRef, Occurs,
    ProcedureKind, ProcedureNode, ProgramModel, Renames,
};
