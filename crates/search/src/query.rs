use std::fmt;

use crate::error::{Result, SearchError};

/// A data or procedure name with optional `OF` / `IN` qualifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub name: String,
    /// Innermost first, upper-cased
    pub qualifiers: Vec<String>,
}

impl QualifiedName {
    /// `balance of customer-rec in cust-file` → BALANCE, [CUSTOMER-REC, CUST-FILE]
    pub fn parse(raw: &str) -> Result<Self> {
        let mut words = raw.split_whitespace();
        let name = words.next().ok_or(SearchError::EmptyQuery)?.to_ascii_uppercase();

        let mut qualifiers = Vec::new();
        while let Some(word) = words.next() {
            let qualifier = if word.eq_ignore_ascii_case("OF") || word.eq_ignore_ascii_case("IN") {
                words.next()
            } else {
                Some(word)
            };
            match qualifier {
                Some(q) => qualifiers.push(q.to_ascii_uppercase()),
                None => {
                    return Err(SearchError::Other(format!("dangling qualifier in {raw:?}")));
                }
            }
        }
        Ok(Self { name, qualifiers })
    }

    #[must_use]
    pub fn is_qualified(&self) -> bool {
        !self.qualifiers.is_empty()
    }
}

/// Names a procedure: `UNIT/KEY`, a bare key (`MAIN::STEP-A`), or a paragraph or
/// section name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureRef {
    pub unit: Option<String>,
    pub target: String,
}

impl ProcedureRef {
    /// Procedure keys never contain `/`, so the unit is everything before the last one
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        match raw.rsplit_once('/') {
            Some((unit, target)) if !unit.is_empty() && !target.is_empty() => Ok(Self {
                unit: Some(unit.to_string()),
                target: target.to_string(),
            }),
            Some(_) => Err(SearchError::Other(format!("malformed procedure reference {raw:?}"))),
            None => Ok(Self {
                unit: None,
                target: raw.to_string(),
            }),
        }
    }

    /// Builder: restrict to a unit unless the reference already names one
    #[must_use]
    pub fn in_unit(mut self, unit: Option<&str>) -> Self {
        if self.unit.is_none() {
            self.unit = unit.map(str::to_string);
        }
        self
    }
}

impl fmt::Display for ProcedureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{unit}/{}", self.target),
            None => f.write_str(&self.target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn qualified_names_accept_of_and_in() {
        let q = QualifiedName::parse("balance of customer-rec IN cust-file").unwrap();
        assert_eq!(q.name, "BALANCE");
        assert_eq!(q.qualifiers, vec!["CUSTOMER-REC", "CUST-FILE"]);
        assert!(!QualifiedName::parse("BALANCE").unwrap().is_qualified());
        assert!(QualifiedName::parse("   ").is_err());
        assert!(QualifiedName::parse("BALANCE OF").is_err());
    }

    #[test]
    fn procedure_refs_split_on_the_last_slash() {
        let r = ProcedureRef::parse("BATCH/PAYROLL/MAIN::STEP-A").unwrap();
        assert_eq!(r.unit.as_deref(), Some("BATCH/PAYROLL"));
        assert_eq!(r.target, "MAIN::STEP-A");
        assert_eq!(r.to_string(), "BATCH/PAYROLL/MAIN::STEP-A");

        let bare = ProcedureRef::parse("STEP-A").unwrap().in_unit(Some("PAY01"));
        assert_eq!(bare.unit.as_deref(), Some("PAY01"));
        assert!(ProcedureRef::parse("PAY01/").is_err());
    }
}
