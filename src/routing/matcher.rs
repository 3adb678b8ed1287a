//! Path prefix matching.
//!
//! # Design Decisions
//! - Case-sensitive
//! - A prefix only matches at a segment boundary: `/api` matches `/api`
//!   and `/api/v1`, never `/apis`
//! - `/` and the empty prefix match every path

/// Whether `path` lies under `base`.
pub fn path_matches(path: &str, base: &str) -> bool {
    if base.is_empty() || base == "/" {
        return true;
    }
    match path.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || base.ends_with('/'),
        None => false,
    }
}
