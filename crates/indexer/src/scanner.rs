use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Extensions of compilable source units
pub const UNIT_EXTENSIONS: &[&str] = &["cbl", "cob", "cobol"];

/// Extensions of COPY members; never units on their own
pub const COPY_EXTENSIONS: &[&str] = &["cpy", "copy"];

const MAX_FILE_SIZE_BYTES: u64 = 8 * 1_048_576; // 8 MB

const IGNORED_SCOPES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    ".cobol-lens",
    "node_modules",
    "target",
    "build",
    "dist",
    "tmp",
];

/// What a project directory contains
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Source units, sorted
    pub units: Vec<PathBuf>,
    /// Directories holding at least one COPY member, sorted
    pub copy_dirs: Vec<PathBuf>,
}

/// Finds source units under a project root (.gitignore aware)
pub struct UnitScanner {
    root: PathBuf,
}

impl UnitScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn scan(&self) -> ScanResult {
        let mut units = Vec::new();
        let mut copy_dirs = BTreeSet::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b));
        builder.filter_entry(move |entry| !Self::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > MAX_FILE_SIZE_BYTES {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                MAX_FILE_SIZE_BYTES
                            );
                            continue;
                        }
                    }

                    if has_extension(path, UNIT_EXTENSIONS) {
                        units.push(path.to_path_buf());
                    } else if has_extension(path, COPY_EXTENSIONS) {
                        if let Some(parent) = path.parent() {
                            copy_dirs.insert(parent.to_path_buf());
                        }
                    }
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        units.sort();
        log::info!(
            "Found {} source units and {} copybook directories",
            units.len(),
            copy_dirs.len()
        );
        ScanResult {
            units,
            copy_dirs: copy_dirs.into_iter().collect(),
        }
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(root) {
            for component in relative.components() {
                if let std::path::Component::Normal(name) = component {
                    let lowered = name.to_string_lossy().to_lowercase();
                    if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// Case-insensitive extension check
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| ext.eq_ignore_ascii_case(wanted)))
}

/// Default unit id: the upper-cased file stem
pub fn unit_id_for_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_ascii_uppercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn picks_units_by_extension_and_notes_copybook_dirs() {
        let temp = tempdir().unwrap();
        let copy = temp.path().join("copy");
        fs::create_dir_all(&copy).unwrap();
        fs::write(temp.path().join("PAYROLL.cbl"), b"").unwrap();
        fs::write(temp.path().join("billing.COB"), b"").unwrap();
        fs::write(temp.path().join("notes.txt"), b"").unwrap();
        fs::write(copy.join("CUSTREC.cpy"), b"").unwrap();

        let result = UnitScanner::new(temp.path()).scan();
        let names: Vec<String> = result
            .units
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["PAYROLL.cbl".to_string(), "billing.COB".to_string()]);
        assert_eq!(result.copy_dirs, vec![copy]);
    }

    #[test]
    fn respects_gitignore_and_tool_directories() {
        let temp = tempdir().unwrap();
        let legacy = temp.path().join("legacy");
        let store = temp.path().join(".cobol-lens");
        fs::create_dir_all(&legacy).unwrap();
        fs::create_dir_all(&store).unwrap();
        fs::write(legacy.join("OLD.cbl"), b"").unwrap();
        fs::write(store.join("STALE.cbl"), b"").unwrap();
        fs::write(temp.path().join("MAIN.cbl"), b"").unwrap();
        fs::write(temp.path().join(".gitignore"), b"/legacy").unwrap();

        let result = UnitScanner::new(temp.path()).scan();
        assert_eq!(result.units, vec![temp.path().join("MAIN.cbl")]);
    }

    #[test]
    fn unit_ids_are_upper_cased_stems() {
        assert_eq!(unit_id_for_path(Path::new("src/payroll.cbl")), "PAYROLL");
        assert_eq!(unit_id_for_path(Path::new("BILL-01.cob")), "BILL-01");
    }
}
