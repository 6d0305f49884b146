//! Conditional GET support for static files.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Quoted `ETag` for a file's bytes, e.g. `"9f86d081884c7d65"`
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}\"", hasher.finish())
}

/// True when `If-None-Match` lists `etag` (or `*`), meaning 304 applies
pub fn is_not_modified(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|header| {
        header
            .split(',')
            .map(str::trim)
            .any(|candidate| candidate == etag || candidate == "*")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etag_is_quoted_and_stable() {
        let etag = generate_etag(b"<h1>Concert</h1>");
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(etag, generate_etag(b"<h1>Concert</h1>"));
        assert_ne!(etag, generate_etag(b"<h1>Fashion</h1>"));
    }

    #[test]
    fn test_is_not_modified() {
        let etag = "\"abc123\"";
        assert!(is_not_modified(Some("\"abc123\""), etag));
        assert!(is_not_modified(Some("\"xyz\", \"abc123\""), etag));
        assert!(is_not_modified(Some("*"), etag));
        assert!(!is_not_modified(Some("\"different\""), etag));
        assert!(!is_not_modified(None, etag));
    }
}
