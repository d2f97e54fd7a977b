//! Source units, lines and source ranges.
//!
//! A [`SourceUnit`] is the copy-expanded text of one program: every line remembers
//! where it came from (the program file itself or a COPY member) so diagnostics and
//! search results can point back at the original member and line.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Last column of the coding area in fixed format
pub const RIGHT_MARGIN: usize = 72;

/// Column of the indicator area (1-based)
pub const INDICATOR_COLUMN: usize = 7;

/// Last column of Area A (1-based)
pub const AREA_A_END: usize = 11;

/// A span inside one unit's expanded text.
///
/// Lines are expanded-line numbers (1-based), columns are 1-based and the end column is
/// exclusive, so a single-line range covers `start_col..end_col`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub unit: Arc<str>,
    pub line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SourceRange {
    #[must_use]
    pub fn new(unit: Arc<str>, line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            unit,
            line,
            start_col,
            end_line: line,
            end_col,
        }
    }

    /// Smallest range covering both `self` and `other`
    #[must_use]
    pub fn to(&self, other: &Self) -> Self {
        let (start_line, start_col) = (self.line, self.start_col).min((other.line, other.start_col));
        let (end_line, end_col) = (self.end_line, self.end_col).max((other.end_line, other.end_col));
        Self {
            unit: Arc::clone(&self.unit),
            line: start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    #[must_use]
    pub const fn is_single_line(&self) -> bool {
        self.line == self.end_line
    }

    /// Stable, reproducible identifier usable as an annotation key
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_line() {
            write!(f, "{}:{}:{}-{}", self.unit, self.line, self.start_col, self.end_col)
        } else {
            write!(
                f,
                "{}:{}:{}-{}:{}",
                self.unit, self.line, self.start_col, self.end_line, self.end_col
            )
        }
    }
}

/// Original location of an expanded line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    /// Program file name or COPY member name
    pub file: String,
    /// Line number inside that file (1-based)
    pub line: u32,
}

/// One physical line of the expanded unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLine {
    /// Expanded line number (1-based)
    pub number: u32,
    /// Line text as the lexer sees it (after COPY expansion and REPLACE)
    pub text: String,
    pub origin: Origin,
    /// COPY nesting depth (0 = the program file itself)
    pub depth: u16,
    /// Text was rewritten by REPLACE / COPY REPLACING
    #[serde(default)]
    pub replaced: bool,
    /// Last code column for this line; widened when a replacement grew the line
    pub right_margin: usize,
}

impl SourceLine {
    /// Character at a 1-based column
    #[must_use]
    pub fn column(&self, col: usize) -> Option<char> {
        col.checked_sub(1).and_then(|idx| self.text.chars().nth(idx))
    }

    /// Text between 1-based columns `[start, end)`
    #[must_use]
    pub fn slice(&self, start_col: u32, end_col: u32) -> String {
        let start = (start_col as usize).saturating_sub(1);
        let len = (end_col as usize).saturating_sub(start_col as usize);
        self.text.chars().skip(start).take(len).collect()
    }
}

/// One ingested program after copy expansion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub id: Arc<str>,
    pub path: Option<PathBuf>,
    pub lines: Vec<SourceLine>,
    /// COPY members expanded into this unit, in first-use order
    pub copybooks: Vec<String>,
    /// SHA-256 (hex) of the expanded text
    pub content_hash: String,
}

impl SourceUnit {
    pub(crate) fn new(
        id: Arc<str>,
        path: Option<PathBuf>,
        lines: Vec<SourceLine>,
        copybooks: Vec<String>,
    ) -> Self {
        let content_hash = hash_lines(&lines);
        Self {
            id,
            path,
            lines,
            copybooks,
            content_hash,
        }
    }

    #[must_use]
    pub fn line(&self, number: u32) -> Option<&SourceLine> {
        number
            .checked_sub(1)
            .and_then(|idx| self.lines.get(idx as usize))
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Text covered by a range; multi-line ranges are joined with `\n`
    #[must_use]
    pub fn slice(&self, range: &SourceRange) -> String {
        if range.is_single_line() {
            return self
                .line(range.line)
                .map(|line| line.slice(range.start_col, range.end_col))
                .unwrap_or_default();
        }

        let mut parts = Vec::new();
        for number in range.line..=range.end_line {
            let Some(line) = self.line(number) else {
                break;
            };
            let width = line.text.chars().count() as u32 + 1;
            let (start, end) = match number {
                n if n == range.line => (range.start_col, width),
                n if n == range.end_line => (1, range.end_col),
                _ => (1, width),
            };
            parts.push(line.slice(start, end));
        }
        parts.join("\n")
    }

    /// Expanded lines that came from COPY members → their original member and line
    #[must_use]
    pub fn provenance(&self) -> BTreeMap<u32, Origin> {
        self.lines
            .iter()
            .filter(|line| line.depth > 0)
            .map(|line| (line.number, line.origin.clone()))
            .collect()
    }

    #[must_use]
    pub fn origin(&self, number: u32) -> Option<&Origin> {
        self.line(number).map(|line| &line.origin)
    }

    /// Expanded text, one line per source line
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }
}

fn hash_lines(lines: &[SourceLine]) -> String {
    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.text.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(number: u32, text: &str, depth: u16) -> SourceLine {
        SourceLine {
            number,
            text: text.to_string(),
            origin: Origin {
                file: if depth == 0 { "MAIN" } else { "BOOK" }.to_string(),
                line: number,
            },
            depth,
            replaced: false,
            right_margin: RIGHT_MARGIN,
        }
    }

    #[test]
    fn range_key_is_stable() {
        let unit: Arc<str> = Arc::from("PAYROLL");
        let single = SourceRange::new(Arc::clone(&unit), 12, 8, 20);
        assert_eq!(single.key(), "PAYROLL:12:8-20");

        let wide = single.to(&SourceRange::new(unit, 14, 12, 30));
        assert_eq!(wide.key(), "PAYROLL:12:8-14:30");
    }

    #[test]
    fn slices_single_and_multi_line_ranges() {
        let unit = SourceUnit::new(
            Arc::from("U"),
            None,
            vec![line(1, "       MOVE A", 0), line(2, "           TO B.", 1)],
            vec!["BOOK".to_string()],
        );

        let single = SourceRange::new(Arc::clone(&unit.id), 1, 8, 12);
        assert_eq!(unit.slice(&single), "MOVE");

        let multi = SourceRange {
            end_line: 2,
            end_col: 17,
            ..single
        };
        assert_eq!(unit.slice(&multi), "MOVE A\n           TO B.");
        assert_eq!(unit.provenance().len(), 1);
        assert_eq!(unit.origin(2).map(|o| o.file.as_str()), Some("BOOK"));
    }

    #[test]
    fn content_hash_tracks_text() {
        let a = SourceUnit::new(Arc::from("U"), None, vec![line(1, "X", 0)], vec![]);
        let b = SourceUnit::new(Arc::from("U"), None, vec![line(1, "X", 0)], vec![]);
        let c = SourceUnit::new(Arc::from("U"), None, vec![line(1, "Y", 0)], vec![]);
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }
}
