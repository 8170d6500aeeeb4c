pub mod csv;
pub mod directory;
pub mod spreadsheet;

use std::collections::HashSet;

/// Normalizes header names: trims them, names blank headers by position and
/// suffixes repeated names so every column stays addressable.
pub(crate) fn unique_headers<S: AsRef<str>>(raw: impl Iterator<Item = S>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.enumerate()
        .map(|(idx, name)| {
            let name = name.as_ref().trim();
            let base = if name.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                name.to_string()
            };
            let mut candidate = base.clone();
            let mut n = 1;
            while !seen.insert(candidate.clone()) {
                n += 1;
                candidate = format!("{base}_{n}");
            }
            candidate
        })
        .collect()
}
