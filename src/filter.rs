//! Ignore rules applied while collecting source files.
//!
//! Directories are skipped by exact name, files by name suffix. Optional glob
//! patterns are matched against root-relative paths.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::Path;

const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".idea",
    ".vscode",
    ".next",
    "coverage",
];

const DEFAULT_IGNORED_SUFFIXES: &[&str] = &[
    ".lock",
    "-lock.json",
    ".min.js",
    ".map",
    ".pyc",
    ".class",
    ".o",
    ".so",
    ".dll",
    ".exe",
    ".png",
    ".jpg",
    ".jpeg",
    ".gif",
    ".ico",
    ".pdf",
    ".zip",
    ".gz",
    "-report.md",
    ".checkpoint.json",
    ".preliminary.md",
];

/// Configuration of the names, suffixes and globs excluded from collection.
#[derive(Debug, Clone)]
pub struct IgnoreConfig {
    dir_names: Vec<String>,
    suffixes: Vec<String>,
    exclude_globs: Vec<String>,
    respect_gitignore: bool,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            dir_names: DEFAULT_IGNORED_DIRS.iter().map(ToString::to_string).collect(),
            suffixes: DEFAULT_IGNORED_SUFFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            exclude_globs: Vec::new(),
            respect_gitignore: false,
        }
    }
}

impl IgnoreConfig {
    /// Creates a configuration with the default ignore sets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that ignores nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            dir_names: Vec::new(),
            suffixes: Vec::new(),
            exclude_globs: Vec::new(),
            respect_gitignore: false,
        }
    }

    /// Replaces the set of ignored directory names.
    #[must_use]
    pub fn dir_names(mut self, names: Vec<String>) -> Self {
        self.dir_names = names;
        self
    }

    /// Adds directory names to the ignored set.
    #[must_use]
    pub fn add_dir_names(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.dir_names.extend(names);
        self
    }

    /// Replaces the set of ignored file-name suffixes.
    #[must_use]
    pub fn suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.suffixes = suffixes;
        self
    }

    /// Adds file-name suffixes to the ignored set.
    #[must_use]
    pub fn add_suffixes(mut self, suffixes: impl IntoIterator<Item = String>) -> Self {
        self.suffixes.extend(suffixes);
        self
    }

    /// Sets glob patterns excluded in addition to names and suffixes.
    #[must_use]
    pub fn exclude_globs(mut self, patterns: Vec<String>) -> Self {
        self.exclude_globs = patterns;
        self
    }

    /// Enables or disables `.gitignore` handling.
    #[must_use]
    pub const fn respect_gitignore(mut self, enabled: bool) -> Self {
        self.respect_gitignore = enabled;
        self
    }

    /// Returns whether `.gitignore` files are honoured.
    #[must_use]
    pub const fn gitignore_enabled(&self) -> bool {
        self.respect_gitignore
    }
}

/// Compiled form of [`IgnoreConfig`].
#[derive(Debug, Clone)]
pub(crate) struct IgnoreRules {
    dir_names: HashSet<String>,
    suffixes: Vec<String>,
    exclude_globs: GlobSet,
}

impl IgnoreRules {
    /// Compiles the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a glob pattern is invalid.
    pub(crate) fn new(config: &IgnoreConfig) -> Result<Self> {
        Ok(Self {
            dir_names: config.dir_names.iter().cloned().collect(),
            suffixes: config.suffixes.clone(),
            exclude_globs: Self::build_globset(&config.exclude_globs)?,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                Error::config(format!("Invalid glob pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))
    }

    /// Returns true if a directory with this name must not be visited.
    pub(crate) fn is_ignored_dir(&self, name: &str) -> bool {
        self.dir_names.contains(name)
    }

    /// Returns true if a file with this name is excluded by suffix.
    ///
    /// Backups and temporary files left by the report writer are matched by
    /// the name of the file they were made for.
    pub(crate) fn is_ignored_file(&self, name: &str) -> bool {
        let base = written_artifact_base(name);
        self.suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()) || base.ends_with(suffix.as_str()))
    }

    /// Returns true if the root-relative path matches an exclude glob.
    pub(crate) fn is_excluded_path(&self, relative: &Path) -> bool {
        !self.exclude_globs.is_empty() && self.exclude_globs.is_match(relative)
    }
}

/// Strips the `.tmp` and `.backup.<nanos>` suffixes the report writer adds.
///
/// Returns `name` unchanged when it carries neither.
pub(crate) fn written_artifact_base(name: &str) -> &str {
    let name = name.strip_suffix(".tmp").unwrap_or(name);
    match name.rsplit_once(".backup.") {
        Some((base, stamp))
            if !base.is_empty()
                && !stamp.is_empty()
                && stamp.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_skip_vcs_and_dependencies() {
        let rules = IgnoreRules::new(&IgnoreConfig::default()).unwrap();

        assert!(rules.is_ignored_dir(".git"));
        assert!(rules.is_ignored_dir("node_modules"));
        assert!(rules.is_ignored_dir("target"));
        assert!(!rules.is_ignored_dir("src"));
    }

    #[test]
    fn test_suffix_matching() {
        let rules = IgnoreRules::new(&IgnoreConfig::default()).unwrap();

        assert!(rules.is_ignored_file("Cargo.lock"));
        assert!(rules.is_ignored_file("package-lock.json"));
        assert!(rules.is_ignored_file("app.min.js"));
        assert!(rules.is_ignored_file("project-report.md"));
        assert!(!rules.is_ignored_file("main.rs"));
        assert!(!rules.is_ignored_file("README.md"));
    }

    #[test]
    fn test_writer_artifacts_follow_their_base_name() {
        let rules = IgnoreRules::new(&IgnoreConfig::default()).unwrap();

        assert!(rules.is_ignored_file("demo-report.md.backup.1760000000000000000"));
        assert!(rules.is_ignored_file("demo-report.md.tmp"));
        assert!(rules.is_ignored_file("report.md.checkpoint.json.tmp"));
        assert!(rules.is_ignored_file("Cargo.lock.backup.42"));
        assert!(!rules.is_ignored_file("notes.backup.rs"));
        assert!(!rules.is_ignored_file("main.rs.backup.old"));
    }

    #[test]
    fn test_written_artifact_base() {
        assert_eq!(written_artifact_base("a.md.backup.123"), "a.md");
        assert_eq!(written_artifact_base("a.md.tmp"), "a.md");
        assert_eq!(written_artifact_base("a.md.backup.123.tmp"), "a.md");
        assert_eq!(written_artifact_base("a.md.backup."), "a.md.backup.");
        assert_eq!(written_artifact_base("main.rs"), "main.rs");
    }

    #[test]
    fn test_dir_names_match_exactly() {
        let rules = IgnoreRules::new(&IgnoreConfig::default()).unwrap();

        assert!(!rules.is_ignored_dir("targets"));
        assert!(!rules.is_ignored_dir("my_build"));
    }

    #[test]
    fn test_exclude_globs() {
        let config = IgnoreConfig::empty().exclude_globs(vec!["docs/**".to_string()]);
        let rules = IgnoreRules::new(&config).unwrap();

        assert!(rules.is_excluded_path(Path::new("docs/guide.md")));
        assert!(!rules.is_excluded_path(Path::new("src/docs.rs")));
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let config = IgnoreConfig::empty().exclude_globs(vec!["src/[".to_string()]);
        let err = IgnoreRules::new(&config).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_empty_config_ignores_nothing() {
        let rules = IgnoreRules::new(&IgnoreConfig::empty()).unwrap();

        assert!(!rules.is_ignored_dir(".git"));
        assert!(!rules.is_ignored_file("Cargo.lock"));
        assert!(!rules.is_excluded_path(Path::new("any/path.rs")));
    }

    #[test]
    fn test_additions_extend_defaults() {
        let config = IgnoreConfig::default()
            .add_dir_names(vec!["vendor".to_string()])
            .add_suffixes(vec![".snap".to_string()]);
        let rules = IgnoreRules::new(&config).unwrap();

        assert!(rules.is_ignored_dir("vendor"));
        assert!(rules.is_ignored_dir(".git"));
        assert!(rules.is_ignored_file("test.snap"));
    }
}
