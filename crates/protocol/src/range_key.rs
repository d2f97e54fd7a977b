use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable, reproducible identifier of a source span: `UNIT:line:start-end` or
/// `UNIT:line:start-endline:endcol` when the span crosses lines.
///
/// Lines are expanded-line numbers, columns are 1-based with an exclusive end.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct RangeKey {
    pub unit: String,
    pub line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl RangeKey {
    pub fn new(unit: impl Into<String>, line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            unit: unit.into(),
            line,
            start_col,
            end_line,
            end_col,
        }
    }
}

impl fmt::Display for RangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.end_line == self.line {
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeKeyError(String);

impl fmt::Display for RangeKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid range key {:?}", self.0)
    }
}

impl std::error::Error for RangeKeyError {}

impl FromStr for RangeKey {
    type Err = RangeKeyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || RangeKeyError(raw.to_string());
        let number = |part: &str| part.parse::<u32>().map_err(|_| invalid());

        // unit ids may themselves contain ':', so split from the right
        let (head, span) = raw.rsplit_once('-').ok_or_else(invalid)?;
        let (rest, start_col) = head.rsplit_once(':').ok_or_else(invalid)?;
        let (unit, line) = rest.rsplit_once(':').ok_or_else(invalid)?;
        if unit.is_empty() {
            return Err(invalid());
        }
        let line = number(line)?;
        let start_col = number(start_col)?;

        let (end_line, end_col) = match span.split_once(':') {
            Some((end_line, end_col)) => (number(end_line)?, number(end_col)?),
            None => (line, number(span)?),
        };
        if (end_line, end_col) < (line, start_col) {
            return Err(invalid());
        }

        Ok(Self {
            unit: unit.to_string(),
            line,
            start_col,
            end_line,
            end_col,
        })
    }
}
