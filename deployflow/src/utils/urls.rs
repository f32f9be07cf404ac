//! URL concatenation helpers.
//!
//! Service URLs come back from the platform with or without a trailing
//! slash; paths are written with or without a leading one. Joining them
//! naively doubles or drops slashes, which downstream services reject.

/// Joins a base URL and a path with exactly one slash between them.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}
