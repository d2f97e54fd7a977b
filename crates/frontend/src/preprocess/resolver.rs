use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::FrontendConfig;

/// A COPY member located by a resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMember {
    /// Normalized member name (upper-case, no extension)
    pub name: String,
    pub path: Option<PathBuf>,
    pub text: String,
}

/// Looks up COPY members by name (and optional library)
pub trait MemberResolver: Send + Sync {
    fn resolve(&self, name: &str, library: Option<&str>) -> Option<ResolvedMember>;
}

/// Normalize a member name the way COPY compares them: unquoted, upper-case, extension dropped
#[must_use]
pub fn member_key(name: &str) -> String {
    let unquoted = name.trim().trim_matches(|c| c == '"' || c == '\'');
    let file_name = Path::new(unquoted)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(unquoted);
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    stem.to_ascii_uppercase()
}

/// Resolves members against the configured search path on disk
#[derive(Debug, Clone)]
pub struct SearchPathResolver {
    paths: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl SearchPathResolver {
    pub fn new(paths: Vec<PathBuf>, extensions: Vec<String>) -> Self {
        Self { paths, extensions }
    }

    pub fn from_config(config: &FrontendConfig) -> Self {
        Self::new(config.copy_paths.clone(), config.copy_extensions.clone())
    }

    fn candidates(&self, name: &str, library: Option<&str>) -> Vec<PathBuf> {
        let unquoted = name.trim().trim_matches(|c| c == '"' || c == '\'');
        let library = library.map(|lib| lib.trim().trim_matches(|c| c == '"' || c == '\''));

        // A quoted name with an explicit extension is tried verbatim first
        let mut spellings = vec![unquoted.to_string()];
        let lower = unquoted.to_ascii_lowercase();
        if lower != unquoted {
            spellings.push(lower);
        }

        let mut out = Vec::new();
        for dir in &self.paths {
            let mut dirs = Vec::new();
            if let Some(lib) = library {
                dirs.push(dir.join(lib));
                dirs.push(dir.join(lib.to_ascii_lowercase()));
            }
            dirs.push(dir.clone());

            for base in dirs {
                for spelling in &spellings {
                    for ext in &self.extensions {
                        out.push(base.join(format!("{spelling}{ext}")));
                    }
                }
            }
        }
        out
    }
}

impl MemberResolver for SearchPathResolver {
    fn resolve(&self, name: &str, library: Option<&str>) -> Option<ResolvedMember> {
        for candidate in self.candidates(name, library) {
            if !candidate.is_file() {
                continue;
            }
            match std::fs::read(&candidate) {
                Ok(bytes) => {
                    log::debug!("Resolved COPY {name} → {}", candidate.display());
                    return Some(ResolvedMember {
                        name: member_key(name),
                        path: Some(candidate),
                        text: String::from_utf8_lossy(&bytes).into_owned(),
                    });
                }
                Err(e) => log::warn!("Failed to read COPY member {}: {e}", candidate.display()),
            }
        }
        None
    }
}

/// Members held in memory (tests, editor buffers, remote libraries)
#[derive(Debug, Clone, Default)]
pub struct InMemoryResolver {
    members: BTreeMap<String, String>,
}

impl InMemoryResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a member
    #[must_use]
    pub fn with_member(mut self, name: &str, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: &str, text: impl Into<String>) {
        self.members.insert(member_key(name), text.into());
    }
}

impl MemberResolver for InMemoryResolver {
    fn resolve(&self, name: &str, _library: Option<&str>) -> Option<ResolvedMember> {
        let key = member_key(name);
        self.members.get(&key).map(|text| ResolvedMember {
            name: key,
            path: None,
            text: text.clone(),
        })
    }
}
