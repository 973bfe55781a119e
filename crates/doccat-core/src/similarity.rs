//! Similar-name heuristic.
//!
//! An existing entry is "similar" to a new file when its title contains the
//! file's base name (extension stripped, case-insensitive) as a substring.
//! Both sides are folded the same way before comparing: `_` and `-` count as
//! spaces and runs of whitespace collapse, so `report-final.pdf` matches the
//! title "Report final" that [`title_from_file_name`] derives from it.
//! Renamed files are missed and coincidental substrings are reported; the
//! check only surfaces likely duplicates. File size and edit distance are
//! not considered.

/// Default maximum number of similar entries returned per check.
pub const DEFAULT_SIMILAR_LIMIT: usize = 10;

/// Folded file name with its last extension removed. A leading dot (`.env`)
/// is not treated as an extension.
pub fn normalized_base_name(file_name: &str) -> String {
    fold(stem_of(file_name))
}

/// Whether `title` contains the normalized base name of `file_name`.
/// An empty base name never matches.
pub fn title_matches(title: &str, file_name: &str) -> bool {
    let needle = normalized_base_name(file_name);
    title_contains_normalized(title, &needle)
}

/// Same as [`title_matches`] with an already-normalized needle.
pub fn title_contains_normalized(title: &str, needle: &str) -> bool {
    !needle.is_empty() && fold(title).contains(needle)
}

/// Human title derived from a file name: stem with `_`/`-` turned into spaces.
pub fn title_from_file_name(file_name: &str) -> String {
    let collapsed = spaced(stem_of(file_name));
    if collapsed.is_empty() {
        last_segment(file_name).to_string()
    } else {
        collapsed
    }
}

fn last_segment(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name)
}

fn stem_of(file_name: &str) -> &str {
    let name = last_segment(file_name);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// `_`/`-` as spaces, whitespace collapsed.
fn spaced(s: &str) -> String {
    s.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn fold(s: &str) -> String {
    spaced(s).to_lowercase()
}
