use serde::{Deserialize, Serialize};

/// A unit whose ingestion produced no model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUnit {
    pub unit_id: String,
    pub reason: String,
}

/// Statistics about one batch ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Source units found by the scanner
    pub units: usize,

    /// Units parsed and committed
    pub indexed: usize,

    /// Units skipped because their expanded text hash was unchanged
    pub unchanged: usize,

    /// Units dropped from the corpus because their file is gone
    pub removed: usize,

    /// Units not reached because the batch was cancelled
    pub skipped: usize,

    /// Fatal-to-unit failures
    pub failed: Vec<FailedUnit>,

    /// Diagnostics carried by the freshly indexed units
    pub diagnostics: usize,

    /// Lines of the program files themselves
    pub total_lines: usize,

    pub cancelled: bool,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// IO and persistence errors encountered
    pub errors: Vec<String>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_indexed(&mut self, lines: usize, diagnostics: usize) {
        self.indexed += 1;
        self.total_lines += lines;
        self.diagnostics += diagnostics;
    }

    pub fn add_failure(&mut self, unit_id: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(FailedUnit {
            unit_id: unit_id.into(),
            reason: reason.into(),
        });
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    /// Sort the per-unit lists so reports do not depend on task completion order
    pub(crate) fn normalize(&mut self) {
        self.failed.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        self.errors.sort();
    }
}
