use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "so", "dylib", "a", "o", "obj", "png", "jpg", "jpeg", "gif", "bmp", "ico",
        "webp", "mp3", "mp4", "avi", "mkv", "mov", "wav", "flac", "pdf", "doc", "docx", "xls",
        "xlsx", "ppt", "pptx", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "wasm", "pyc",
        "class", "woff", "woff2", "ttf", "eot",
    ]
    .into_iter()
    .collect()
});

/// A source file read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Path relative to the collection root, `/`-separated
    pub path: String,

    /// File content
    pub content: String,
}

impl SourceUnit {
    /// Creates a new source unit.
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Returns the number of lines in the content.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

/// Result of analyzing one [`SourceUnit`].
///
/// `analysis_text` is never empty: failures are replaced by a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitAnalysis {
    /// Path of the analyzed unit
    pub path: String,

    /// Analysis produced by the text-generation service, or a placeholder
    pub analysis_text: String,

    /// Whether `analysis_text` is a failure placeholder
    pub failed: bool,
}

impl UnitAnalysis {
    /// Creates a successful analysis.
    #[must_use]
    pub fn new(path: impl Into<String>, analysis_text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            analysis_text: analysis_text.into(),
            failed: false,
        }
    }

    /// Creates a placeholder analysis describing why the unit could not be analyzed.
    #[must_use]
    pub fn placeholder(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        let path = path.into();
        let analysis_text = format!("_Analysis unavailable for `{path}`: {reason}_");
        Self {
            path,
            analysis_text,
            failed: true,
        }
    }
}

/// Returns `path` relative to `root` with `/` separators.
#[must_use]
pub(crate) fn relative_label(path: &Path, root: &Path) -> String {
    let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reads a file under `root` into a [`SourceUnit`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid UTF-8.
pub fn read_source_unit(root: &Path, path: &Path) -> Result<SourceUnit> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            Error::invalid_utf8(path)
        } else {
            Error::io(path, e)
        }
    })?;

    Ok(SourceUnit::new(relative_label(path, root), content))
}

/// Determines if a file is likely binary by analyzing its content.
///
/// # Algorithm
///
/// 1. Reads the first 8KB of the file
/// 2. Checks for null bytes (binary indicator)
/// 3. Calculates the ratio of ASCII characters
/// 4. Files with null bytes or low ASCII ratio are considered binary
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub(crate) fn is_likely_binary(path: &Path) -> Result<bool> {
    const BUFFER_SIZE: usize = 8192;
    const ASCII_THRESHOLD: f64 = 0.85;

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = [0u8; BUFFER_SIZE];

    let bytes_read = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;

    if bytes_read == 0 {
        return Ok(false);
    }

    let sample = &buffer[..bytes_read];

    if memchr::memchr(0, sample).is_some() {
        return Ok(true);
    }

    // UTF-8 text in other scripts is mostly non-ASCII, so only count ASCII
    // for samples that are not valid UTF-8.
    match std::str::from_utf8(sample) {
        Ok(_) => return Ok(false),
        // Sequence cut off by the end of the sample.
        Err(e) if e.error_len().is_none() => return Ok(false),
        Err(_) => {}
    }

    let ascii_count = sample.iter().filter(|&&b| b < 128).count();
    let ascii_ratio = ascii_count as f64 / bytes_read as f64;

    Ok(ascii_ratio < ASCII_THRESHOLD)
}

/// Checks if a file extension suggests a binary file.
#[must_use]
pub(crate) fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::io::Write;

    #[test]
    fn test_read_source_unit() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("src/main.rs");
        file.write_str("fn main() {}\n").unwrap();

        let unit = read_source_unit(temp.path(), file.path()).unwrap();

        assert_eq!(unit.path, "src/main.rs");
        assert_eq!(unit.content, "fn main() {}\n");
        assert_eq!(unit.line_count(), 1);
    }

    #[test]
    fn test_read_source_unit_invalid_utf8() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("latin1.txt");
        file.write_binary(&[0x66, 0x6f, 0xff, 0xfe, 0x6f]).unwrap();

        let err = read_source_unit(temp.path(), file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidUtf8 { .. }));
    }

    #[test]
    fn test_read_source_unit_missing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let err = read_source_unit(temp.path(), &temp.path().join("gone.rs")).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_placeholder_is_never_empty() {
        let analysis = UnitAnalysis::placeholder("lib.rs", "service unavailable");

        assert!(analysis.failed);
        assert_eq!(analysis.path, "lib.rs");
        assert!(analysis.analysis_text.contains("lib.rs"));
        assert!(analysis.analysis_text.contains("service unavailable"));
    }

    #[test]
    fn test_relative_label_uses_forward_slashes() {
        let root = Path::new("/repo");
        let path = Path::new("/repo/src/nested/mod.rs");
        assert_eq!(relative_label(path, root), "src/nested/mod.rs");
    }

    #[test]
    fn test_is_likely_binary_text_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("test.txt");
        file.write_str("Hello, world!").unwrap();

        assert!(!is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_is_likely_binary_non_ascii_utf8_text() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("notes.md");
        file.write_str("Привет, мир! Это обычный текст.").unwrap();

        assert!(!is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_is_likely_binary_binary_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("test.bin");

        let mut f = File::create(file.path()).unwrap();
        f.write_all(&[0u8; 100]).unwrap();

        assert!(is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_is_likely_binary_empty_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("empty.txt");
        file.touch().unwrap();

        assert!(!is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_has_binary_extension() {
        assert!(has_binary_extension(Path::new("app.exe")));
        assert!(has_binary_extension(Path::new("image.PNG")));
        assert!(has_binary_extension(Path::new("archive.zip")));
        assert!(!has_binary_extension(Path::new("code.rs")));
        assert!(!has_binary_extension(Path::new("Makefile")));
    }
}
