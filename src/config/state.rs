// Application state module
// Shares the loaded configuration across connection tasks

use super::types::Config;

/// Application state
///
/// The mount configuration is fixed for the process lifetime, so shared
/// state is nothing more than the configuration itself.
pub struct AppState {
    pub config: Config,
}

impl AppState {
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Whether per-request access logging is enabled
    pub const fn access_log_enabled(&self) -> bool {
        self.config.logging.access_log
    }
}
