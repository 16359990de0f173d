//! Concatenation of per-file analyses into the preliminary document.

use crate::file::UnitAnalysis;
use std::fmt::Write;

const FILE_MARKER: &str = "## File: ";
const SEPARATOR: &str = "---";

/// Builds the preliminary document from analyses, in input order.
///
/// Pure formatting: the output depends only on the arguments.
#[must_use]
pub fn aggregate(analyses: &[UnitAnalysis], root_label: &str) -> String {
    let mut doc = format!("# Preliminary Analysis: {root_label}\n\n");

    for analysis in analyses {
        // Writing to a String never fails.
        let _ = write!(
            doc,
            "{FILE_MARKER}{}\n\n{}\n\n{SEPARATOR}\n\n",
            analysis.path,
            analysis.analysis_text.trim_end()
        );
    }

    doc
}

/// Counts the file sections of a preliminary document.
#[must_use]
pub fn file_section_count(document: &str) -> usize {
    document
        .lines()
        .filter(|line| line.starts_with(FILE_MARKER))
        .count()
}
