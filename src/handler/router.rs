//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, header
//! extraction, hand-off to the static asset gateway, and access logging.

use crate::config::AppState;
use crate::handler::static_files;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{HeaderMap, Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub range_header: Option<String>,
    pub access_log: bool,
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let http_version = version_label(req.version());
    let is_head = method == Method::HEAD;
    let access_log = state.access_log_enabled();

    let referer = header_string(req.headers(), "referer");
    let user_agent = header_string(req.headers(), "user-agent");

    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    // Method gate first, then body size, then the filesystem
    let response = if let Some(resp) = check_http_method(&method, state.config.http.enable_cors) {
        resp
    } else if let Some(resp) = check_body_size(req.headers(), state.config.http.max_body_size) {
        resp
    } else {
        let ctx = RequestContext {
            path: uri.path(),
            is_head,
            if_none_match: header_string(req.headers(), "if-none-match"),
            if_modified_since: header_string(req.headers(), "if-modified-since"),
            range_header: header_string(req.headers(), "range"),
            access_log,
        };
        static_files::serve(&ctx, &state.config.static_files).await
    };

    if access_log {
        let mut entry = AccessLogEntry::new(
            peer_addr.ip().to_string(),
            method.to_string(),
            uri.path().to_string(),
        );
        entry.query = uri.query().map(ToString::to_string);
        entry.http_version = http_version;
        entry.status = response.status().as_u16();
        entry.body_bytes = content_length_of(&response);
        entry.referer = referer;
        entry.user_agent = user_agent;
        entry.request_time_us =
            u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method, enable_cors: bool) -> Option<Response<Full<Bytes>>> {
    match method {
        &Method::GET | &Method::HEAD => None,
        &Method::OPTIONS => Some(http::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = headers.get("content-length")?;
    let Ok(size_str) = content_length.to_str() else {
        logger::log_warning("Content-Length header contains non-ASCII characters");
        return None;
    };
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Some(http::build_413_response())
        }
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            None
        }
        _ => None,
    }
}

/// Extract a header as an owned string, ignoring non-UTF8 values
fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Version label for access logs ("1.0", "1.1", "2")
fn version_label(version: hyper::Version) -> String {
    format!("{version:?}")
        .trim_start_matches("HTTP/")
        .to_string()
}

/// Response body size as reported by Content-Length, 0 when absent
fn content_length_of(response: &Response<Full<Bytes>>) -> usize {
    response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn get_and_head_pass_the_method_gate() {
        assert!(check_http_method(&Method::GET, false).is_none());
        assert!(check_http_method(&Method::HEAD, false).is_none());
    }

    #[test]
    fn options_gets_204() {
        let resp = check_http_method(&Method::OPTIONS, false).expect("should short-circuit");
        assert_eq!(resp.status(), 204);
    }

    #[test]
    fn mutating_methods_get_405() {
        for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
            let resp = check_http_method(&method, false).expect("should short-circuit");
            assert_eq!(resp.status(), 405);
        }
    }

    #[test]
    fn oversized_body_gets_413() {
        let mut headers = HeaderMap::new();
        headers.insert("content-length", HeaderValue::from_static("2048"));
        let resp = check_body_size(&headers, 1024).expect("should short-circuit");
        assert_eq!(resp.status(), 413);
    }

    #[test]
    fn small_or_missing_body_passes() {
        let mut headers = HeaderMap::new();
        assert!(check_body_size(&headers, 1024).is_none());
        headers.insert("content-length", HeaderValue::from_static("10"));
        assert!(check_body_size(&headers, 1024).is_none());
    }

    #[test]
    fn unparseable_content_length_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("content-length", HeaderValue::from_static("banana"));
        assert!(check_body_size(&headers, 1024).is_none());
    }

    #[test]
    fn version_labels() {
        assert_eq!(version_label(hyper::Version::HTTP_10), "1.0");
        assert_eq!(version_label(hyper::Version::HTTP_11), "1.1");
        assert_eq!(version_label(hyper::Version::HTTP_2), "2.0");
    }
}
