use anyhow::{Context, Result};
use lens_frontend::{DialectExtension, FrontendConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "cobol-lens.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    #[default]
    Standard,
    Relaxed,
}

/// Optional `cobol-lens.toml` at the project root.
///
/// ```toml
/// preset = "relaxed"
/// copy_paths = ["copy", "/shared/copylib"]
/// extensions = ["debug-lines"]
/// vendor_verbs = ["XML"]
/// concurrency = 4
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub preset: Preset,
    /// Relative entries are resolved against the project root
    pub copy_paths: Vec<PathBuf>,
    pub copy_extensions: Option<Vec<String>>,
    pub max_include_depth: Option<usize>,
    pub extensions: Vec<DialectExtension>,
    pub vendor_verbs: Vec<String>,
    pub concurrency: Option<usize>,
}

/// Command-line settings that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub relaxed: bool,
    pub copy_paths: Vec<PathBuf>,
    pub concurrency: Option<usize>,
}

impl ProjectConfig {
    /// `explicit` must exist; the default file is optional
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (root.join(CONFIG_FILE_NAME), false),
        };
        if !required && !path.is_file() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&raw).with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded {}", path.display());
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(Into::into)
    }

    pub fn frontend_config(&self, root: &Path, overrides: &Overrides) -> Result<FrontendConfig> {
        let mut config = if overrides.relaxed || self.preset == Preset::Relaxed {
            FrontendConfig::relaxed()
        } else {
            FrontendConfig::standard()
        };

        for dir in self.copy_paths.iter().chain(&overrides.copy_paths) {
            config = config.with_copy_path(if dir.is_absolute() {
                dir.clone()
            } else {
                root.join(dir)
            });
        }
        if let Some(extensions) = &self.copy_extensions {
            config.copy_extensions = extensions.clone();
        }
        if let Some(depth) = self.max_include_depth {
            config.max_include_depth = depth;
        }
        for extension in &self.extensions {
            config = config.with_extension(*extension);
        }
        config.dialect.vendor_verbs.extend(
            self.vendor_verbs
                .iter()
                .map(|verb| verb.to_ascii_uppercase()),
        );

        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn concurrency(&self, overrides: &Overrides) -> Option<usize> {
        overrides.concurrency.or(self.concurrency)
    }
}
