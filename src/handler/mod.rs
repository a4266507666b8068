//! Request handler module
//!
//! Request dispatch and the static asset gateway. Every path on the server
//! resolves against the single static mount.

pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
