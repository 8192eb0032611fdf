//! Namespace codec: maps a hierarchical path to a storage key
//!
//! A path is stored as `<level>#<path>`, where level is the number of '/'
//! (a trailing '/' does not count). All direct children of a directory share
//! the prefix `<level + 1>#<dir>/`, so they are contiguous in key order and a
//! node's own record never falls inside its children's range.
//!
//! Empty and non-normalized (`//`) paths are the caller's problem.

/// Storage key of `path`
pub fn encode(path: &str) -> String {
    let mut level = path.matches('/').count();
    if path.ends_with('/') {
        level = level.saturating_sub(1);
    }
    format!("{}#{}", level, path)
}

/// Common prefix of the storage keys of all direct children of `path`
pub fn list_prefix(path: &str) -> String {
    let mut dir = path.to_string();
    if !dir.ends_with('/') {
        dir.push('/');
    }
    let level = dir.matches('/').count();
    format!("{}#{}", level, dir)
}

/// Parent directory of `path`, or "" when `path` sits at the root level
pub fn parent(path: &str) -> &str {
    // a trailing '/' belongs to the last segment
    let end = path.char_indices().last().map_or(0, |(i, _)| i);
    match path[..end].rfind('/') {
        Some(sep) => &path[..sep],
        None => "",
    }
}

/// Path part of a storage key
pub fn decode(structured: &[u8]) -> &[u8] {
    match structured.iter().position(|&b| b == b'#') {
        Some(sep) => &structured[sep + 1..],
        None => structured,
    }
}
