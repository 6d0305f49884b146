//! Static page serving
//!
//! Fixed page routes map to files in the views directory; `/images/*` and
//! the public asset directory are served with traversal protection.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::SiteConfig;
use crate::http::{self, cache, mime};
use crate::logger;

const IMAGES_PREFIX: &str = "/images/";
const DIRECTORY_INDEX: &str = "index.html";

/// Route path (normalized) to file in the views directory
const PAGES: &[(&str, &str)] = &[
    ("/", "login.html"),
    ("/index", "index.html"),
    ("/registration", "registration.html"),
    ("/concert", "concert.html"),
    ("/about", "about.html"),
    ("/contact", "contact.html"),
    ("/organiser", "organiser.html"),
    ("/sponsor", "sponsor.html"),
    ("/fashion", "fashion.html"),
    ("/marketing", "marketing.html"),
    ("/forget-password", "forget-password.html"),
];

/// A GET/HEAD request for something static
pub struct PageRequest<'a> {
    /// Path as sent, used for file lookups
    pub path: &'a str,
    /// Lowercased path without trailing slash, used for route lookups
    pub route: &'a str,
    pub if_none_match: Option<&'a str>,
}

pub fn page_file(route: &str) -> Option<&'static str> {
    PAGES
        .iter()
        .find(|(path, _)| *path == route)
        .map(|(_, file)| *file)
}

pub async fn serve(req: &PageRequest<'_>, site: &SiteConfig) -> Response<Full<Bytes>> {
    let loaded = if let Some(file) = page_file(req.route) {
        load_file(&Path::new(&site.views_dir).join(file)).await
    } else if let Some(rest) = strip_images_prefix(req.path) {
        load_from_directory(&site.images_dir, rest).await
    } else {
        load_from_directory(&site.public_dir, req.path.trim_start_matches('/')).await
    };

    match loaded {
        Some((content, content_type)) => build_response(content, content_type, req.if_none_match),
        None => http::build_404_response(),
    }
}

fn strip_images_prefix(path: &str) -> Option<&str> {
    let head = path.get(..IMAGES_PREFIX.len())?;
    head.eq_ignore_ascii_case(IMAGES_PREFIX)
        .then(|| &path[IMAGES_PREFIX.len()..])
}

fn build_response(
    content: Vec<u8>,
    content_type: &'static str,
    if_none_match: Option<&str>,
) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(&content);
    if cache::is_not_modified(if_none_match, &etag) {
        return http::build_304_response(&etag);
    }
    http::build_file_response(content, content_type, &etag)
}

async fn load_file(path: &Path) -> Option<(Vec<u8>, &'static str)> {
    match fs::read(path).await {
        Ok(content) => Some((content, content_type_of(path))),
        Err(e) => {
            logger::log_debug(&format!("Page '{}' not served: {e}", path.display()));
            None
        }
    }
}

/// Load the percent-encoded `relative` path from inside `dir`, refusing
/// anything that resolves outside it
async fn load_from_directory(dir: &str, relative: &str) -> Option<(Vec<u8>, &'static str)> {
    // decoded before the traversal guard so `%2e%2e/` is caught too
    let Ok(relative) = percent_decode_str(relative).decode_utf8() else {
        logger::log_debug(&format!("Path '{relative}' is not valid UTF-8 once decoded"));
        return None;
    };
    let relative: &str = &relative;
    if relative.is_empty() {
        return None;
    }

    let Ok(dir_canonical) = Path::new(dir).canonicalize() else {
        logger::log_debug(&format!("Static directory '{dir}' not found"));
        return None;
    };

    let mut file_path: PathBuf = dir_canonical.join(relative);
    if file_path.is_dir() {
        file_path = file_path.join(DIRECTORY_INDEX);
    }

    // missing files are ordinary 404s
    let file_canonical = file_path.canonicalize().ok()?;
    if !file_canonical.starts_with(&dir_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {relative} -> {}",
            file_canonical.display()
        ));
        return None;
    }

    load_file(&file_canonical).await
}

fn content_type_of(path: &Path) -> &'static str {
    mime::get_content_type(path.extension().and_then(|e| e.to_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_file_mapping() {
        assert_eq!(page_file("/"), Some("login.html"));
        assert_eq!(page_file("/index"), Some("index.html"));
        assert_eq!(page_file("/forget-password"), Some("forget-password.html"));
        assert_eq!(page_file("/forgot-password"), None);
        assert_eq!(page_file("/unknown"), None);
    }

    #[test]
    fn test_strip_images_prefix() {
        assert_eq!(strip_images_prefix("/images/stage.png"), Some("stage.png"));
        assert_eq!(strip_images_prefix("/Images/a/b.jpg"), Some("a/b.jpg"));
        assert_eq!(strip_images_prefix("/imagesx/a.png"), None);
        assert_eq!(strip_images_prefix("/img"), None);
    }

    #[tokio::test]
    async fn test_load_from_directory_blocks_traversal() {
        let root = tempfile::tempdir().unwrap();
        let images = root.path().join("images");
        std::fs::create_dir(&images).unwrap();
        std::fs::write(images.join("stage.png"), b"png").unwrap();
        std::fs::write(root.path().join("secret.txt"), b"secret").unwrap();

        let dir = images.to_str().unwrap();
        let (content, content_type) = load_from_directory(dir, "stage.png").await.unwrap();
        assert_eq!(content, b"png");
        assert_eq!(content_type, "image/png");

        assert!(load_from_directory(dir, "../secret.txt").await.is_none());
        assert!(load_from_directory(dir, "%2e%2e/secret.txt").await.is_none());
        assert!(load_from_directory(dir, "..%2Fsecret.txt").await.is_none());
        assert!(load_from_directory(dir, "missing.png").await.is_none());
        assert!(load_from_directory(dir, "").await.is_none());
    }

    #[tokio::test]
    async fn test_directory_serves_index() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("docs")).unwrap();
        std::fs::write(root.path().join("docs/index.html"), b"<p>docs</p>").unwrap();

        let (content, content_type) = load_from_directory(root.path().to_str().unwrap(), "docs")
            .await
            .unwrap();
        assert_eq!(content, b"<p>docs</p>");
        assert_eq!(content_type, "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn test_encoded_names_are_decoded() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("my stage.png"), b"png").unwrap();
        let dir = root.path().to_str().unwrap();

        let (content, _) = load_from_directory(dir, "my%20stage.png").await.unwrap();
        assert_eq!(content, b"png");
        assert!(load_from_directory(dir, "%FF.png").await.is_none());
    }
}
