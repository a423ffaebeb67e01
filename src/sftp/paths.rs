//! Helpers for `/`-delimited remote paths. Remote paths are never run through
//! `std::path`, which would apply local platform rules.

pub const ROOT: &str = "/";

/// Parent of `path` with the last segment removed; an empty parent is the root
pub fn parent_path(path: &str) -> String {
    let parent = match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    };
    if parent.is_empty() {
        ROOT.to_string()
    } else {
        parent.to_string()
    }
}

/// Last segment of `path`, `None` for the root or a trailing separator
pub fn last_segment(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|s| !s.is_empty())
}

/// Base name of an entry, ignoring trailing separators
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Append `name` to `dir`, adding a separator only when `dir` lacks one
pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Path equality that ignores trailing separators
pub fn is_same_path(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}
