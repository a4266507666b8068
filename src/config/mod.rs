// Configuration module entry point
// Loads, validates, and shares the application configuration

mod state;
mod types;

use std::net::SocketAddr;
use std::path::Path;

// Re-export public types
pub use state::AppState;
pub use types::{Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig, StaticConfig};

impl Config {
    /// Load configuration from "config.toml" in the working directory.
    /// The file is optional; every key has a built-in default.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from specified file path (without extension)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("SERVER"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("static.root", "app/static")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .build()?;

        settings.try_deserialize()
    }

    /// Check invariants that must hold before the server starts.
    /// A missing or unreadable static root is fatal at startup, never a
    /// per-request surprise.
    pub fn validate(&self) -> Result<(), String> {
        let root = Path::new(&self.static_files.root);
        if !root.is_dir() {
            return Err(format!(
                "Static root '{}' does not exist or is not a directory",
                self.static_files.root
            ));
        }
        root.canonicalize().map_err(|e| {
            format!(
                "Static root '{}' is not readable: {e}",
                self.static_files.root
            )
        })?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
