//! CMD file discovery by filesystem walking.

use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;

/// Whether a file name has the `.cmd` extension.
pub(crate) fn is_cmd_file(file_name: &str) -> bool {
    file_name.ends_with(".cmd")
}

/// Discovers CMD files under a root directory.
pub(crate) struct Scanner {
    root_dir: PathBuf,
    exclude: Vec<Pattern>,
}

impl Scanner {
    /// Create a new Scanner.
    ///
    /// `exclude` patterns are matched against paths relative to `root_dir`.
    pub(crate) fn new(root_dir: PathBuf, exclude: Vec<Pattern>) -> Self {
        Self { root_dir, exclude }
    }

    /// Scan the tree and return CMD file paths sorted by path string.
    ///
    /// Hidden directories are skipped. Returns an empty Vec if the root
    /// directory doesn't exist.
    pub(crate) fn scan(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if self.root_dir.exists() {
            self.scan_directory(&self.root_dir, &mut paths);
        }
        paths.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
        paths
    }

    fn scan_directory(&self, dir_path: &Path, paths: &mut Vec<PathBuf>) {
        let Ok(entries) = fs::read_dir(dir_path) else {
            return;
        };

        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            if is_dir && name.starts_with('.') {
                continue;
            }

            let path = entry.path();
            if self.is_excluded(&path) {
                continue;
            }

            if is_dir {
                self.scan_directory(&path, paths);
            } else if is_cmd_file(&name) {
                paths.push(path);
            }
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root_dir) else {
            return false;
        };
        self.exclude.iter().any(|pattern| pattern.matches_path(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    fn scan(root: &Path, exclude: &[&str]) -> Vec<String> {
        let exclude = exclude.iter().map(|p| Pattern::new(p).unwrap()).collect();
        Scanner::new(root.to_path_buf(), exclude)
            .scan()
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_is_cmd_file() {
        assert!(is_cmd_file("file.cmd"));
        assert!(is_cmd_file(".cmd"));
        assert!(!is_cmd_file("file/cmd"));
        assert!(!is_cmd_file("file."));
        assert!(!is_cmd_file("file"));
    }

    #[test]
    fn test_scan_finds_nested_cmd_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "index.cmd");
        touch(dir.path(), "b/page.cmd");
        touch(dir.path(), "a/deep/er/page.cmd");
        touch(dir.path(), "a/notes.txt");
        touch(dir.path(), "a/page.html");

        assert_eq!(
            scan(dir.path(), &[]),
            vec!["a/deep/er/page.cmd", "b/page.cmd", "index.cmd"]
        );
    }

    #[test]
    fn test_scan_skips_hidden_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), ".git/page.cmd");
        touch(dir.path(), ".draft.cmd");
        touch(dir.path(), ".cmd");
        touch(dir.path(), "page.cmd");

        assert_eq!(scan(dir.path(), &[]), vec![".cmd", ".draft.cmd", "page.cmd"]);
    }

    #[test]
    fn test_scan_sorts_by_path_string() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a/x.cmd");
        touch(dir.path(), "a-b.cmd");

        assert_eq!(scan(dir.path(), &[]), vec!["a-b.cmd", "a/x.cmd"]);
    }

    #[test]
    fn test_scan_skips_excluded_globs() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "node_modules/pkg/readme.cmd");
        touch(dir.path(), "drafts/one.cmd");
        touch(dir.path(), "drafts/keep.txt");
        touch(dir.path(), "page.cmd");

        assert_eq!(
            scan(dir.path(), &["node_modules/**", "drafts/*.cmd"]),
            vec!["page.cmd"]
        );
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan(&dir.path().join("missing"), &[]).is_empty());
    }
}
