//! Extraction of pipe-delimited case rows from a finished transcript.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

// The case-insensitive flag has no letters to act on; kept for fidelity with
// the upstream pattern.
static CASE_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\|.+\|)").expect("case row regex"));

/// Scan the transcript for lines shaped like `| ... |` and return them
/// deduplicated, preserving the order of first appearance.
///
/// `.` does not cross newlines, so each line is tested independently; a line
/// qualifies when it has non-empty content between its first and last bar.
pub fn extract_rows(transcript: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for capture in CASE_ROW_RE.captures_iter(transcript) {
        if let Some(m) = capture.get(1) {
            let row = m.as_str();
            if seen.insert(row.to_owned()) {
                rows.push(row.to_owned());
            }
        }
    }
    rows
}
