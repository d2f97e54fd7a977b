use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    /// Bucket for `decisions + data items`
    #[must_use]
    pub const fn from_score(score: u32) -> Self {
        if score < 10 {
            Self::Low
        } else if score < 50 {
            Self::Medium
        } else {
            Self::High
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Size and complexity figures for one unit
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Lines of the program file itself
    pub source_lines: u32,
    /// Lines after COPY expansion
    pub expanded_lines: u32,
    pub statements: u32,
    /// IF, EVALUATE/WHEN, looping PERFORM
    pub decisions: u32,
    pub data_items: u32,
    pub sections: u32,
    pub paragraphs: u32,
    pub edges: u32,
    pub diagnostics: u32,
}

impl Metrics {
    #[must_use]
    pub const fn score(&self) -> u32 {
        self.decisions + self.data_items
    }

    #[must_use]
    pub const fn complexity(&self) -> Complexity {
        Complexity::from_score(self.score())
    }
}
