//! HTTP cache control module
//!
//! `ETag` generation, HTTP date handling, and conditional request checks.

use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::SystemTime;

/// Generate `ETag` using fast hashing
///
/// Returns a quoted `ETag` string, e.g., `"abc123def"`
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    let v = hasher.finish();
    format!("\"{v:x}\"")
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports:
/// - Single `ETag`: `"abc123"`
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Wildcard: `*`
///
/// Returns true if matched (should return 304), false otherwise
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        // Handle multiple ETags separated by comma
        client_etag
            .split(',')
            .any(|e| e.trim() == etag || e.trim() == "*")
    })
}

/// Format a filesystem timestamp as an HTTP date (IMF-fixdate, RFC 7231)
pub fn format_http_date(mtime: SystemTime) -> String {
    let dt: DateTime<Utc> = mtime.into();
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Check the client's `If-Modified-Since` header against the file mtime
///
/// HTTP dates carry second resolution, so the comparison truncates the
/// mtime to whole seconds. An unparseable header is treated as absent.
///
/// Returns true if the resource is unchanged (should return 304)
pub fn check_modified_since(if_modified_since: Option<&str>, mtime: SystemTime) -> bool {
    let Some(header) = if_modified_since else {
        return false;
    };
    let Ok(since) = DateTime::parse_from_rfc2822(header) else {
        return false;
    };
    let modified: DateTime<Utc> = mtime.into();
    modified.timestamp() <= since.timestamp()
}
