//! Static asset gateway
//!
//! Maps request paths onto the mount root and builds file responses with
//! MIME inference, cache validators, and Range support. Resolution never
//! follows a path outside the root.

use crate::config::StaticConfig;
use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime, range::RangeParseResult};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

/// Outcome of mapping a request path onto the mount root
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    /// An existing regular file inside the root
    File(PathBuf),
    /// An existing directory requested without a trailing slash
    RedirectWithSlash(String),
    /// Nothing to serve
    NotFound,
}

/// Serve a request path from the static mount
pub async fn serve(ctx: &RequestContext<'_>, mount: &StaticConfig) -> Response<Full<Bytes>> {
    match resolve(Path::new(&mount.root), ctx.path, &mount.index_files) {
        Resolution::File(file_path) => serve_resolved_file(ctx, &file_path).await,
        Resolution::RedirectWithSlash(target) => http::build_redirect_response(&target, 307),
        Resolution::NotFound => not_found_response(ctx, mount).await,
    }
}

/// Map a URL path to a file under the mount root.
///
/// Escapes are rejected twice: parent-directory segments never enter the
/// joined path, and the canonicalized result must still sit under the
/// canonicalized root (symlinks pointing elsewhere fail here). Directory
/// paths resolve to the first matching index document.
pub fn resolve(root: &Path, request_path: &str, index_files: &[String]) -> Resolution {
    let Some(relative) = sanitize_path(request_path) else {
        logger::log_warning(&format!("Path traversal attempt blocked: {request_path}"));
        return Resolution::NotFound;
    };

    let mut file_path = root.join(&relative);

    if file_path.is_dir() {
        // Directory URLs get a trailing slash so relative asset links resolve
        if !request_path.ends_with('/') && !relative.as_os_str().is_empty() {
            return Resolution::RedirectWithSlash(format!("{request_path}/"));
        }
        let Some(index_path) = index_files
            .iter()
            .map(|name| file_path.join(name))
            .find(|p| p.is_file())
        else {
            return Resolution::NotFound;
        };
        file_path = index_path;
    }

    let root_canonical = match root.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static root '{}' not accessible: {e}",
                root.display()
            ));
            return Resolution::NotFound;
        }
    };

    // File not found is common (404), no need to log
    let Ok(file_canonical) = file_path.canonicalize() else {
        return Resolution::NotFound;
    };
    if !file_canonical.starts_with(&root_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            request_path,
            file_canonical.display()
        ));
        return Resolution::NotFound;
    }
    if !file_canonical.is_file() {
        return Resolution::NotFound;
    }

    Resolution::File(file_canonical)
}

/// Strip the leading slash and reject escaping or non-normal segments
fn sanitize_path(request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    let mut clean = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(segment) => clean.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(clean)
}

/// Read a resolved file and build its response
async fn serve_resolved_file(
    ctx: &RequestContext<'_>,
    file_path: &Path,
) -> Response<Full<Bytes>> {
    let content = match fs::read(file_path).await {
        Ok(c) => c,
        Err(e) => {
            // The path resolved to an existing file, so a failed read is a
            // server-side problem, not a missing resource
            logger::log_error(&format!(
                "Failed to read file '{}': {}",
                file_path.display(),
                e
            ));
            return http::build_500_response();
        }
    };

    let mtime = fs::metadata(file_path)
        .await
        .ok()
        .and_then(|m| m.modified().ok());
    let content_type = mime::get_content_type(file_path.extension().and_then(|e| e.to_str()));

    build_file_response(&content, content_type, mtime, ctx)
}

/// Build the response for file content: 304 for fresh caches, 206/416 for
/// Range requests, 200 otherwise
fn build_file_response(
    data: &[u8],
    content_type: &'static str,
    mtime: Option<SystemTime>,
    ctx: &RequestContext<'_>,
) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(data);
    let last_modified = mtime.map(cache::format_http_date);
    let total_size = data.len();

    // ETag wins over If-Modified-Since when the client sends both
    if cache::check_etag_match(ctx.if_none_match.as_deref(), &etag) {
        return http::build_304_response(&etag);
    }
    if ctx.if_none_match.is_none() {
        if let Some(modified) = mtime {
            if cache::check_modified_since(ctx.if_modified_since.as_deref(), modified) {
                return http::build_304_response(&etag);
            }
        }
    }

    match http::parse_range_header(ctx.range_header.as_deref(), total_size) {
        RangeParseResult::Valid(range) => {
            let start = range.start;
            let end = range.end_position(total_size);

            http::response::build_partial_response(
                Bytes::from(data[start..=end].to_vec()),
                content_type,
                &etag,
                last_modified.as_deref(),
                start,
                end,
                total_size,
                ctx.is_head,
            )
        }
        RangeParseResult::NotSatisfiable => http::build_416_response(total_size),
        RangeParseResult::None => http::response::build_cached_response(
            Bytes::from(data.to_owned()),
            content_type,
            &etag,
            last_modified.as_deref(),
            ctx.is_head,
        ),
    }
}

/// Build the 404 response, preferring the mount's not-found page when present
async fn not_found_response(
    ctx: &RequestContext<'_>,
    mount: &StaticConfig,
) -> Response<Full<Bytes>> {
    let page = Path::new(&mount.root).join(&mount.not_found_file);
    match fs::read(&page).await {
        Ok(content) => http::response::build_not_found_page_response(content.into(), ctx.is_head),
        Err(_) => http::build_404_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tempfile::TempDir;

    fn mount_for(root: &TempDir) -> StaticConfig {
        StaticConfig {
            root: root.path().to_string_lossy().into_owned(),
            index_files: vec!["index.html".to_string()],
            not_found_file: "404.html".to_string(),
        }
    }

    fn ctx(path: &str) -> RequestContext<'_> {
        RequestContext {
            path,
            is_head: false,
            if_none_match: None,
            if_modified_since: None,
            range_header: None,
            access_log: false,
        }
    }

    async fn body_bytes(resp: Response<Full<Bytes>>) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    #[test]
    fn resolve_finds_existing_file() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("timer.js"), "console.log('tick')").unwrap();

        match resolve(root.path(), "/timer.js", &["index.html".to_string()]) {
            Resolution::File(p) => assert!(p.ends_with("timer.js")),
            other => panic!("Expected File, got {other:?}"),
        }
    }

    #[test]
    fn resolve_root_uses_index_document() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("index.html"), "<html></html>").unwrap();

        match resolve(root.path(), "/", &["index.html".to_string()]) {
            Resolution::File(p) => assert!(p.ends_with("index.html")),
            other => panic!("Expected File, got {other:?}"),
        }
    }

    #[test]
    fn resolve_tries_index_names_in_order() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("index.htm"), "fallback").unwrap();

        let names = vec!["index.html".to_string(), "index.htm".to_string()];
        match resolve(root.path(), "/", &names) {
            Resolution::File(p) => assert!(p.ends_with("index.htm")),
            other => panic!("Expected File, got {other:?}"),
        }
    }

    #[test]
    fn resolve_rejects_parent_dir_segments() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("index.html"), "x").unwrap();

        let names = vec!["index.html".to_string()];
        assert_eq!(
            resolve(root.path(), "/../../etc/passwd", &names),
            Resolution::NotFound
        );
        assert_eq!(
            resolve(root.path(), "/sub/../../secret", &names),
            Resolution::NotFound
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_symlink_escape() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "leak").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            root.path().join("link.txt"),
        )
        .unwrap();

        assert_eq!(
            resolve(root.path(), "/link.txt", &["index.html".to_string()]),
            Resolution::NotFound
        );
    }

    #[test]
    fn resolve_missing_file_is_not_found() {
        let root = TempDir::new().unwrap();
        assert_eq!(
            resolve(root.path(), "/nope.xyz", &["index.html".to_string()]),
            Resolution::NotFound
        );
    }

    #[test]
    fn resolve_directory_without_slash_redirects() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("guides")).unwrap();
        std::fs::write(root.path().join("guides/index.html"), "guide").unwrap();

        let names = vec!["index.html".to_string()];
        assert_eq!(
            resolve(root.path(), "/guides", &names),
            Resolution::RedirectWithSlash("/guides/".to_string())
        );
        match resolve(root.path(), "/guides/", &names) {
            Resolution::File(p) => assert!(p.ends_with("guides/index.html")),
            other => panic!("Expected File, got {other:?}"),
        }
    }

    #[test]
    fn resolve_directory_without_index_is_not_found() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("empty")).unwrap();

        assert_eq!(
            resolve(root.path(), "/empty/", &["index.html".to_string()]),
            Resolution::NotFound
        );
    }

    #[tokio::test]
    async fn serve_returns_file_bytes_and_content_type() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("style.css"), "body { color: red }").unwrap();
        let mount = mount_for(&root);

        let resp = serve(&ctx("/style.css"), &mount).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["Content-Type"], "text/css");
        assert!(resp.headers().contains_key("ETag"));
        assert!(resp.headers().contains_key("Last-Modified"));
        assert_eq!(body_bytes(resp).await.as_ref(), b"body { color: red }");
    }

    #[tokio::test]
    async fn serve_root_returns_index_bytes() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("index.html"), "<h1>Timer</h1>").unwrap();
        let mount = mount_for(&root);

        let resp = serve(&ctx("/"), &mount).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["Content-Type"], "text/html; charset=utf-8");
        assert_eq!(body_bytes(resp).await.as_ref(), b"<h1>Timer</h1>");
    }

    #[tokio::test]
    async fn serve_missing_path_is_plain_404() {
        let root = TempDir::new().unwrap();
        let mount = mount_for(&root);

        let resp = serve(&ctx("/does-not-exist.xyz"), &mount).await;
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.headers()["Content-Type"], "text/plain");
    }

    #[tokio::test]
    async fn serve_missing_path_uses_not_found_page() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("404.html"), "<h1>lost?</h1>").unwrap();
        let mount = mount_for(&root);

        let resp = serve(&ctx("/does-not-exist.xyz"), &mount).await;
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.headers()["Content-Type"], "text/html; charset=utf-8");
        assert_eq!(body_bytes(resp).await.as_ref(), b"<h1>lost?</h1>");
    }

    #[tokio::test]
    async fn serve_traversal_never_leaves_root() {
        let root = TempDir::new().unwrap();
        let mount = mount_for(&root);

        let resp = serve(&ctx("/../../../etc/passwd"), &mount).await;
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn serve_matching_etag_returns_304() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("app.js"), "let n = 1;").unwrap();
        let mount = mount_for(&root);

        let first = serve(&ctx("/app.js"), &mount).await;
        let etag = first.headers()["ETag"].to_str().unwrap().to_string();

        let mut revalidate = ctx("/app.js");
        revalidate.if_none_match = Some(etag);
        let resp = serve(&revalidate, &mount).await;
        assert_eq!(resp.status(), 304);
        assert!(body_bytes(resp).await.is_empty());
    }

    #[tokio::test]
    async fn serve_unmodified_since_returns_304() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("app.js"), "let n = 1;").unwrap();
        let mount = mount_for(&root);

        let first = serve(&ctx("/app.js"), &mount).await;
        let modified = first.headers()["Last-Modified"]
            .to_str()
            .unwrap()
            .to_string();

        let mut revalidate = ctx("/app.js");
        revalidate.if_modified_since = Some(modified);
        let resp = serve(&revalidate, &mount).await;
        assert_eq!(resp.status(), 304);
    }

    #[tokio::test]
    async fn serve_range_returns_partial_content() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("chime.wav"), b"0123456789").unwrap();
        let mount = mount_for(&root);

        let mut partial = ctx("/chime.wav");
        partial.range_header = Some("bytes=2-5".to_string());
        let resp = serve(&partial, &mount).await;
        assert_eq!(resp.status(), 206);
        assert_eq!(resp.headers()["Content-Range"], "bytes 2-5/10");
        assert_eq!(body_bytes(resp).await.as_ref(), b"2345");
    }

    #[tokio::test]
    async fn serve_unsatisfiable_range_returns_416() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("chime.wav"), b"0123456789").unwrap();
        let mount = mount_for(&root);

        let mut partial = ctx("/chime.wav");
        partial.range_header = Some("bytes=50-".to_string());
        let resp = serve(&partial, &mount).await;
        assert_eq!(resp.status(), 416);
        assert_eq!(resp.headers()["Content-Range"], "bytes */10");
    }

    #[tokio::test]
    async fn serve_head_has_headers_but_no_body() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("index.html"), "<h1>Timer</h1>").unwrap();
        let mount = mount_for(&root);

        let mut head = ctx("/");
        head.is_head = true;
        let resp = serve(&head, &mount).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["Content-Length"], "14");
        assert!(body_bytes(resp).await.is_empty());
    }
}
