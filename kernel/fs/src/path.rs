//! Path parsing helpers.

/// Splits a path into its components, skipping empty segments.
///
/// Leading, trailing and repeated slashes are ignored, so `"/dev//sda/"`
/// yields `["dev", "sda"]`.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Returns `true` if the path starts with `/`.
#[must_use]
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}
