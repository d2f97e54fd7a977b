use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Configuration shared (read-only) by every unit's preprocess → lex → parse pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Directories searched, in order, for COPY members
    pub copy_paths: Vec<PathBuf>,

    /// File extensions tried for a COPY member name ("" means the bare name)
    pub copy_extensions: Vec<String>,

    /// Maximum nesting of COPY inside COPY before the directive is abandoned
    pub max_include_depth: usize,

    /// Dialect tolerance switches
    pub dialect: DialectConfig,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            copy_paths: Vec::new(),
            copy_extensions: vec![
                String::new(),
                ".cpy".to_string(),
                ".CPY".to_string(),
                ".copy".to_string(),
                ".cbl".to_string(),
                ".cob".to_string(),
            ],
            max_include_depth: 32,
            dialect: DialectConfig::default(),
        }
    }
}

impl FrontendConfig {
    /// Strict fixed-format rules (COBOL-85 behavior for REPLACE scoping only)
    pub fn standard() -> Self {
        Self::default()
    }

    /// Tolerant of the usual vendor relaxations
    pub fn relaxed() -> Self {
        Self {
            dialect: DialectConfig {
                extensions: [
                    DialectExtension::RelaxedAreaA,
                    DialectExtension::ScopedReplace,
                    DialectExtension::InlineComments,
                    DialectExtension::LongLines,
                    DialectExtension::ExecBlocks,
                ]
                .into_iter()
                .collect(),
                vendor_verbs: Vec::new(),
            },
            ..Default::default()
        }
    }

    /// Builder: append a COPY search directory
    #[must_use]
    pub fn with_copy_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.copy_paths.push(dir.into());
        self
    }

    /// Builder: enable a dialect extension
    #[must_use]
    pub fn with_extension(mut self, extension: DialectExtension) -> Self {
        self.dialect.extensions.insert(extension);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_include_depth == 0 {
            return Err("max_include_depth must be > 0".to_string());
        }

        if self.copy_extensions.is_empty() {
            return Err("copy_extensions must list at least one extension".to_string());
        }

        if let Some(verb) = self
            .dialect
            .vendor_verbs
            .iter()
            .find(|verb| verb.trim().is_empty() || verb.contains(char::is_whitespace))
        {
            return Err(format!("vendor verb {verb:?} must be a single word"));
        }

        Ok(())
    }

    #[must_use]
    pub fn allows(&self, extension: DialectExtension) -> bool {
        self.dialect.extensions.contains(&extension)
    }
}

/// Dialect tolerance expressed as a set of recognized extensions over one grammar core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectConfig {
    pub extensions: BTreeSet<DialectExtension>,

    /// Additional statement verbs a vendor compiler accepts (upper-case words)
    pub vendor_verbs: Vec<String>,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            extensions: [DialectExtension::ScopedReplace].into_iter().collect(),
            vendor_verbs: Vec::new(),
        }
    }
}

/// A single non-standard behavior the frontend can be told to accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DialectExtension {
    /// Paragraph names may start in Area B (still reported)
    RelaxedAreaA,

    /// `REPLACE OFF` and a later REPLACE end the active replacement region
    ScopedReplace,

    /// Indicator `D` lines are compiled as code instead of ignored
    DebugLines,

    /// `*>` starts a comment running to the end of the line
    InlineComments,

    /// No right margin: text after column 72 is code
    LongLines,

    /// `EXEC ... END-EXEC` is one opaque vendor statement
    ExecBlocks,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(FrontendConfig::default().validate().is_ok());
        assert!(FrontendConfig::relaxed().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = FrontendConfig {
            max_include_depth: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.max_include_depth = 4;
        config.copy_extensions.clear();
        assert!(config.validate().is_err());

        config.copy_extensions.push(".cpy".to_string());
        config.dialect.vendor_verbs.push("EXHIBIT NAMED".to_string());
        assert!(config.validate().is_err());

        config.dialect.vendor_verbs = vec!["EXHIBIT".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_extensions_roundtrip_through_json() {
        let config = FrontendConfig::relaxed().with_copy_path("copylib");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("relaxed-area-a"));
        let back: FrontendConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        assert!(back.allows(DialectExtension::ExecBlocks));
        assert!(!back.allows(DialectExtension::DebugLines));
    }
}
