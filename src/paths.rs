//! Remote key derivation for local paths.

const SEPARATOR: char = '/';

/// Derive the remote object key for a local path.
///
/// When `strip_components` is set, that many leading path segments are
/// dropped first. The destination prefix is then prepended verbatim; callers
/// wanting a directory-style prefix must include the trailing slash
/// themselves.
pub fn remote_key(local: &str, dest: &str, strip_components: Option<usize>) -> String {
    let remote = match strip_components {
        Some(count) => strip_leading(local, count),
        None => local.to_string(),
    };
    format!("{dest}{remote}")
}

/// Drop `count` leading segments. A path with `count` or fewer segments
/// collapses to its last segment, so the key is never empty.
fn strip_leading(path: &str, count: usize) -> String {
    let segments: Vec<&str> = path.split(SEPARATOR).collect();
    if segments.len() <= count {
        segments.last().copied().unwrap_or_default().to_string()
    } else {
        segments[count..].join(&SEPARATOR.to_string())
    }
}
