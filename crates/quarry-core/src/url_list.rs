use std::collections::HashSet;

use quarry_index::Source;

/// Parse newline-separated URLs into sources.
///
/// Lines are trimmed; blank lines and `#` comments are skipped and repeats
/// keep their first position.
#[must_use]
pub fn parse_url_list(text: &str) -> Vec<Source> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(*line))
        .map(Source::new)
        .collect()
}
