use crate::{
    config::Config,
    error::{Error, Result},
    file::{has_binary_extension, is_likely_binary},
    filter::{IgnoreConfig, IgnoreRules, written_artifact_base},
};
use ignore::{DirEntry, WalkBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Statistics collected during a walk.
#[derive(Debug, Default, Clone)]
pub(crate) struct CollectStats {
    /// Files accepted for analysis
    pub accepted: usize,

    /// Files skipped by suffix or glob
    pub ignored: usize,

    /// Binary files skipped
    pub binary: usize,

    /// Files over the size limit
    pub oversized: usize,

    /// Walk or metadata errors
    pub errors: usize,
}

/// Recursively enumerates eligible files under a root directory.
pub struct FileCollector {
    rules: Arc<IgnoreRules>,
    respect_gitignore: bool,
    max_file_size: u64,
    artifacts: Vec<PathBuf>,
}

impl FileCollector {
    /// Creates a collector from configuration.
    ///
    /// The report, checkpoint and preliminary files this configuration
    /// writes are never collected, nor are their backups.
    ///
    /// # Errors
    ///
    /// Returns an error if an exclude glob is invalid.
    pub fn new(config: &Config) -> Result<Self> {
        let mut collector = Self::with_rules(&config.ignore, config.max_file_size)?;
        collector.artifacts = [
            config.output_path.clone(),
            config.checkpoint_file(),
            config.preliminary_file(),
        ]
        .into_iter()
        .flatten()
        .collect();
        Ok(collector)
    }

    /// Creates a collector from explicit ignore rules and a size limit in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if an exclude glob is invalid.
    pub fn with_rules(ignore: &IgnoreConfig, max_file_size: u64) -> Result<Self> {
        Ok(Self {
            rules: Arc::new(IgnoreRules::new(ignore)?),
            respect_gitignore: ignore.gitignore_enabled(),
            max_file_size,
            artifacts: Vec::new(),
        })
    }

    /// Walks `root` and returns every eligible file path.
    ///
    /// Ignored directories are pruned before their contents are visited.
    /// Siblings are visited in file-name order, so the result is stable for a
    /// given filesystem snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryNotFound`] if `root` does not exist or is not
    /// a directory. Problems with individual entries are logged and skipped.
    pub fn collect(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(Error::directory_not_found(root));
        }

        debug!("Collecting files under {}", root.display());

        let rules = Arc::clone(&self.rules);
        let gitignore = self.respect_gitignore;

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .hidden(false)
            .git_ignore(gitignore)
            .git_exclude(gitignore)
            .ignore(gitignore)
            .require_git(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| !Self::is_pruned_dir(entry, &rules))
            .build();

        let artifacts = self.resolve_artifacts();
        let mut stats = CollectStats::default();
        let mut files = Vec::new();

        for result in walker {
            match result {
                Ok(entry) if entry.file_type().is_some_and(|ft| ft.is_file()) => {
                    if let Some(path) = self.accept(&entry, root, &artifacts, &mut stats) {
                        files.push(path);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Walk error: {}", e);
                    stats.errors += 1;
                }
            }
        }

        debug!(
            "Collection complete: {} accepted, {} ignored, {} binary, {} oversized, {} errors",
            stats.accepted, stats.ignored, stats.binary, stats.oversized, stats.errors
        );

        Ok(files)
    }

    /// Returns true for directories below the root whose name is ignored.
    fn is_pruned_dir(entry: &DirEntry, rules: &IgnoreRules) -> bool {
        entry.depth() > 0
            && entry.file_type().is_some_and(|ft| ft.is_dir())
            && rules.is_ignored_dir(&entry.file_name().to_string_lossy())
    }

    /// Canonical paths of the files this run writes.
    ///
    /// Artifacts whose directory does not exist yet cannot be inside the tree
    /// and are dropped.
    fn resolve_artifacts(&self) -> Vec<PathBuf> {
        self.artifacts
            .iter()
            .filter_map(|path| {
                let name = path.file_name()?;
                let dir = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent,
                    _ => Path::new("."),
                };
                dir.canonicalize().ok().map(|dir| dir.join(name))
            })
            .collect()
    }

    /// Returns true if `path` is one of `artifacts` or a writer backup of one.
    fn is_artifact(path: &Path, name: &str, artifacts: &[PathBuf]) -> bool {
        if artifacts.is_empty() {
            return false;
        }
        let Some(dir) = path.parent().and_then(|dir| dir.canonicalize().ok()) else {
            return false;
        };
        artifacts.contains(&dir.join(written_artifact_base(name)))
    }

    /// Applies file-level rules to a walked entry.
    fn accept(
        &self,
        entry: &DirEntry,
        root: &Path,
        artifacts: &[PathBuf],
        stats: &mut CollectStats,
    ) -> Option<PathBuf> {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();

        if Self::is_artifact(path, &name, artifacts) {
            trace!("Ignoring generated output: {}", path.display());
            stats.ignored += 1;
            return None;
        }

        if self.rules.is_ignored_file(&name) {
            trace!("Ignoring by suffix: {}", path.display());
            stats.ignored += 1;
            return None;
        }

        let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
        if self.rules.is_excluded_path(&relative) {
            trace!("Ignoring by glob: {}", relative.display());
            stats.ignored += 1;
            return None;
        }

        if has_binary_extension(path) {
            debug!("Skipping binary file (by extension): {}", relative.display());
            stats.binary += 1;
            return None;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                warn!("Failed to read metadata for {}: {}", path.display(), e);
                stats.errors += 1;
                return None;
            }
        };

        if size > self.max_file_size {
            warn!(
                "Skipping {} ({} bytes exceeds limit of {} bytes)",
                relative.display(),
                size,
                self.max_file_size
            );
            stats.oversized += 1;
            return None;
        }

        match is_likely_binary(path) {
            Ok(true) => {
                debug!("Skipping binary file (by content): {}", relative.display());
                stats.binary += 1;
                None
            }
            Ok(false) => {
                stats.accepted += 1;
                Some(path.to_path_buf())
            }
            Err(e) => {
                warn!("Failed to inspect {}: {}", path.display(), e);
                stats.errors += 1;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::relative_label;
    use assert_fs::prelude::*;

    const LIMIT: u64 = 64 * 1024;

    fn collect_labels(collector: &FileCollector, root: &Path) -> Vec<String> {
        collector
            .collect(root)
            .unwrap()
            .iter()
            .map(|p| relative_label(p, root))
            .collect()
    }

    #[test]
    fn test_collector_finds_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("file1.rs").write_str("fn main() {}").unwrap();
        temp.child("file2.rs").write_str("pub fn test() {}").unwrap();

        let collector = FileCollector::with_rules(&IgnoreConfig::default(), LIMIT).unwrap();
        let files = collect_labels(&collector, temp.path());

        assert_eq!(files, vec!["file1.rs", "file2.rs"]);
    }

    #[test]
    fn test_collector_skips_ignored_directories_entirely() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/lib.rs").write_str("pub fn lib() {}").unwrap();
        temp.child(".git/config").write_str("[core]").unwrap();
        temp.child("node_modules/pkg/index.js").write_str("module.exports = 1;").unwrap();
        temp.child("target/debug/out.rs").write_str("fn x() {}").unwrap();

        let collector = FileCollector::with_rules(&IgnoreConfig::default(), LIMIT).unwrap();
        let files = collect_labels(&collector, temp.path());

        assert_eq!(files, vec!["src/lib.rs"]);
    }

    #[test]
    fn test_collector_skips_ignored_suffixes() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.rs").write_str("fn main() {}").unwrap();
        temp.child("Cargo.lock").write_str("# lock").unwrap();
        temp.child("bundle.min.js").write_str("var a=1;").unwrap();
        temp.child("demo-report.md").write_str("# old report").unwrap();

        let collector = FileCollector::with_rules(&IgnoreConfig::default(), LIMIT).unwrap();
        let files = collect_labels(&collector, temp.path());

        assert_eq!(files, vec!["main.rs"]);
    }

    #[test]
    fn test_collector_skips_report_backups() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.rs").write_str("fn main() {}").unwrap();
        temp.child("demo-report.md").write_str("# report").unwrap();
        temp.child("demo-report.md.backup.1760000000000000000")
            .write_str("# older report")
            .unwrap();

        let config = Config::builder().root_dir(temp.path()).build().unwrap();
        let collector = FileCollector::new(&config).unwrap();
        let files = collect_labels(&collector, temp.path());

        assert_eq!(files, vec!["main.rs"]);
    }

    #[test]
    fn test_collector_skips_configured_outputs() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.rs").write_str("fn main() {}").unwrap();
        temp.child("notes.md").write_str("# report").unwrap();
        temp.child("notes.md.backup.123").write_str("# older").unwrap();
        temp.child("notes.md.tmp").write_str("# partial").unwrap();
        temp.child("notes.md.checkpoint.json").write_str("{}").unwrap();
        temp.child("other.md").write_str("# Other").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .output_path(temp.path().join("notes.md"))
            .ignore(IgnoreConfig::empty())
            .build()
            .unwrap();
        let collector = FileCollector::new(&config).unwrap();
        let files = collect_labels(&collector, temp.path());

        assert_eq!(files, vec!["main.rs", "other.md"]);
    }

    #[test]
    fn test_collector_skips_binary_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("text.rs").write_str("fn main() {}").unwrap();
        temp.child("blob.dat").write_binary(&[0u8; 100]).unwrap();
        temp.child("icon.png").write_binary(&[0x89, 0x50, 0x4e, 0x47]).unwrap();

        let collector = FileCollector::with_rules(&IgnoreConfig::empty(), LIMIT).unwrap();
        let files = collect_labels(&collector, temp.path());

        assert_eq!(files, vec!["text.rs"]);
    }

    #[test]
    fn test_collector_skips_oversized_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("small.rs").write_str("fn a() {}").unwrap();
        temp.child("big.rs").write_str(&"x".repeat(200)).unwrap();

        let collector = FileCollector::with_rules(&IgnoreConfig::empty(), 100).unwrap();
        let files = collect_labels(&collector, temp.path());

        assert_eq!(files, vec!["small.rs"]);
    }

    #[test]
    fn test_collector_applies_exclude_globs() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/main.rs").write_str("fn main() {}").unwrap();
        temp.child("docs/guide.md").write_str("# Guide").unwrap();

        let ignore = IgnoreConfig::default().exclude_globs(vec!["docs/**".to_string()]);
        let collector = FileCollector::with_rules(&ignore, LIMIT).unwrap();
        let files = collect_labels(&collector, temp.path());

        assert_eq!(files, vec!["src/main.rs"]);
    }

    #[test]
    fn test_collector_respects_gitignore_when_enabled() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".gitignore").write_str("generated.rs\n").unwrap();
        temp.child("kept.rs").write_str("fn main() {}").unwrap();
        temp.child("generated.rs").write_str("fn gen() {}").unwrap();

        let plain = FileCollector::with_rules(&IgnoreConfig::default(), LIMIT).unwrap();
        assert_eq!(
            collect_labels(&plain, temp.path()),
            vec![".gitignore", "generated.rs", "kept.rs"]
        );

        let ignore = IgnoreConfig::default().respect_gitignore(true);
        let aware = FileCollector::with_rules(&ignore, LIMIT).unwrap();
        assert_eq!(
            collect_labels(&aware, temp.path()),
            vec![".gitignore", "kept.rs"]
        );
    }

    #[test]
    fn test_collector_order_is_deterministic() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("b/two.rs").write_str("fn two() {}").unwrap();
        temp.child("a/one.rs").write_str("fn one() {}").unwrap();
        temp.child("c.rs").write_str("fn c() {}").unwrap();

        let collector = FileCollector::with_rules(&IgnoreConfig::default(), LIMIT).unwrap();
        let first = collect_labels(&collector, temp.path());
        let second = collect_labels(&collector, temp.path());

        assert_eq!(first, vec!["a/one.rs", "b/two.rs", "c.rs"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_collector_empty_directory() {
        let temp = assert_fs::TempDir::new().unwrap();

        let collector = FileCollector::with_rules(&IgnoreConfig::default(), LIMIT).unwrap();
        assert!(collector.collect(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_collector_missing_root_is_fatal() {
        let collector = FileCollector::with_rules(&IgnoreConfig::default(), LIMIT).unwrap();
        let err = collector
            .collect(Path::new("/nonexistent/path/that/should/not/exist"))
            .unwrap_err();

        assert!(matches!(err, Error::DirectoryNotFound { .. }));
    }

    #[test]
    fn test_collector_root_must_be_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("file.rs");
        file.write_str("fn main() {}").unwrap();

        let collector = FileCollector::with_rules(&IgnoreConfig::default(), LIMIT).unwrap();
        let err = collector.collect(file.path()).unwrap_err();

        assert!(matches!(err, Error::DirectoryNotFound { .. }));
    }

    #[test]
    fn test_collector_root_named_like_ignored_dir_is_walked() {
        let temp = assert_fs::TempDir::new().unwrap();
        let build = temp.child("build");
        build.child("main.rs").write_str("fn main() {}").unwrap();

        let collector = FileCollector::with_rules(&IgnoreConfig::default(), LIMIT).unwrap();
        assert_eq!(collect_labels(&collector, build.path()), vec!["main.rs"]);
    }
}
