use std::path::{Path, PathBuf};
use ignore::WalkBuilder;

use crate::config::{InstrumentConfig, ProjectConfig};
use crate::error::{BracecovError, Result};

/// One file found under the source root.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    /// Path as found during the walk
    pub path: PathBuf,

    /// Path relative to the source root, used to mirror the output tree
    pub rel_path: PathBuf,

    /// Whether the file passes the instrumentation filter; non-matching
    /// files are copied byte-for-byte
    pub instrument: bool,
}

/// Enumerates the source tree and applies the extension/name filter.
///
/// Both the instrumentation and correlation passes must see the same files
/// in the same order: file indices are assigned by encounter order, and the
/// dump carries no stronger identity than those indices. Entries are sorted
/// by path so the two passes agree on one platform.
pub struct SourceWalker {
    source_extensions: Vec<String>,
    exclude_names: Vec<String>,
    ignore_patterns: Vec<String>,
}

impl SourceWalker {
    pub fn new(project: &ProjectConfig, instrument: &InstrumentConfig) -> Self {
        Self {
            source_extensions: instrument.source_extensions.clone(),
            exclude_names: instrument.exclude_names.clone(),
            ignore_patterns: project.ignore_patterns.clone(),
        }
    }

    /// Collect every file under the root in deterministic order.
    pub fn collect(&self, root: &Path) -> Result<Vec<WalkedFile>> {
        let ignore_patterns = self.ignore_patterns.clone();
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .sort_by_file_path(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let name = entry.file_name().to_string_lossy();
                !ignore_patterns.iter().any(|p| p == name.as_ref())
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| BracecovError::FileSystem(e.to_string()))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path().to_path_buf();
            let rel_path = path
                .strip_prefix(root)
                .map_err(|e| BracecovError::FileSystem(e.to_string()))?
                .to_path_buf();
            let instrument = self.matches_filter(&path);
            files.push(WalkedFile {
                path,
                rel_path,
                instrument,
            });
        }
        Ok(files)
    }

    /// Extension must match and the file name must not be excluded.
    fn matches_filter(&self, path: &Path) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };
        if self.exclude_names.iter().any(|e| e == name) {
            return false;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.source_extensions.iter().any(|e| e == ext),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn walker() -> SourceWalker {
        let config = Config::default();
        SourceWalker::new(&config.project, &config.instrument)
    }

    #[test]
    fn test_filter_by_extension() {
        let w = walker();
        assert!(w.matches_filter(Path::new("src/main.cpp")));
        assert!(!w.matches_filter(Path::new("src/main.h")));
        assert!(!w.matches_filter(Path::new("Makefile")));
    }

    #[test]
    fn test_excluded_names_are_copied_not_instrumented() {
        let w = walker();
        assert!(!w.matches_filter(Path::new("cov/coverage.cpp")));
    }

    #[test]
    fn test_collect_is_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("b/two.cpp"), "int x;\n").unwrap();
        std::fs::write(dir.path().join("a.cpp"), "int y;\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();

        let files = walker().collect(dir.path()).unwrap();
        let rels: Vec<_> = files
            .iter()
            .map(|f| f.rel_path.to_string_lossy().to_string())
            .collect();
        // depth-first walk, siblings in path order
        assert_eq!(rels, vec!["a.cpp", "b/two.cpp", "notes.txt"]);
        assert!(files[0].instrument);
        assert!(files[1].instrument);
        assert!(!files[2].instrument);
    }

    #[test]
    fn test_ignored_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target/gen.cpp"), "int x;\n").unwrap();
        std::fs::write(dir.path().join("a.cpp"), "int y;\n").unwrap();

        let files = walker().collect(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, PathBuf::from("a.cpp"));
    }
}
