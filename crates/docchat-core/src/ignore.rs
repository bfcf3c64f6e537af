//! Ignore rules for folder walks and uploads.
//!
//! Two name sets are kept: directory names whose whole subtree is pruned
//! (version control, dependencies, virtualenvs, build output) and file names
//! that are never uploaded (OS metadata). Matching is on the base name only
//! and is case-sensitive.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::defaults;

static DEFAULT_RULES: Lazy<IgnoreRules> = Lazy::new(|| {
    IgnoreRules::new(
        defaults::IGNORED_DIRS.iter().copied(),
        defaults::IGNORED_FILES.iter().copied(),
    )
});

/// Configurable ignore sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRules {
    dirs: HashSet<String>,
    files: HashSet<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}

impl IgnoreRules {
    pub fn new<D, F>(dirs: D, files: F) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    /// Rules that ignore nothing.
    pub fn none() -> Self {
        Self::new(Vec::<String>::new(), Vec::<String>::new())
    }

    /// Parse comma-separated overrides; `None` keeps the default set.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DOCCHAT_IGNORE_DIRS` | `defaults::IGNORED_DIRS` |
    /// | `DOCCHAT_IGNORE_FILES` | `defaults::IGNORED_FILES` |
    pub fn from_env() -> Self {
        let dirs = std::env::var("DOCCHAT_IGNORE_DIRS").ok();
        let files = std::env::var("DOCCHAT_IGNORE_FILES").ok();
        Self::from_lists(dirs.as_deref(), files.as_deref())
    }

    pub fn from_lists(dirs: Option<&str>, files: Option<&str>) -> Self {
        let base = Self::default();
        Self {
            dirs: dirs.map(split_list).unwrap_or(base.dirs),
            files: files.map(split_list).unwrap_or(base.files),
        }
    }

    /// Whether an entry with this base name must be skipped.
    pub fn is_ignored(&self, name: &str, is_directory: bool) -> bool {
        if is_directory {
            self.dirs.contains(name)
        } else {
            self.files.contains(name)
        }
    }

    pub fn with_dir(mut self, name: impl Into<String>) -> Self {
        self.dirs.insert(name.into());
        self
    }

    pub fn with_file(mut self, name: impl Into<String>) -> Self {
        self.files.insert(name.into());
        self
    }
}

fn split_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dirs_ignored() {
        let rules = IgnoreRules::default();
        for dir in defaults::IGNORED_DIRS {
            assert!(rules.is_ignored(dir, true), "{dir} should be ignored");
        }
    }

    #[test]
    fn test_default_files_ignored() {
        let rules = IgnoreRules::default();
        for file in defaults::IGNORED_FILES {
            assert!(rules.is_ignored(file, false), "{file} should be ignored");
        }
    }

    #[test]
    fn test_kind_matters() {
        let rules = IgnoreRules::default();
        // A regular file called "build" is still uploaded.
        assert!(!rules.is_ignored("build", false));
        assert!(!rules.is_ignored(".DS_Store", true));
    }

    #[test]
    fn test_regular_names_pass() {
        let rules = IgnoreRules::default();
        assert!(!rules.is_ignored("report.pdf", false));
        assert!(!rules.is_ignored("docs", true));
    }

    #[test]
    fn test_from_lists_override() {
        let rules = IgnoreRules::from_lists(Some(" target , .git"), None);
        assert!(rules.is_ignored("target", true));
        assert!(!rules.is_ignored("node_modules", true));
        assert!(rules.is_ignored("Thumbs.db", false));
    }

    #[test]
    fn test_none_ignores_nothing() {
        let rules = IgnoreRules::none();
        assert!(!rules.is_ignored(".git", true));
        assert!(!rules.is_ignored(".DS_Store", false));
    }

    #[test]
    fn test_builders() {
        let rules = IgnoreRules::none().with_dir("tmp").with_file("secret.txt");
        assert!(rules.is_ignored("tmp", true));
        assert!(rules.is_ignored("secret.txt", false));
    }
}
