//! Server configuration loaded from environment variables.
//!
//! CLI flags take precedence over the environment; the environment
//! takes precedence over defaults.

use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Port for the HTTP API (from PULSEBOARD_PORT)
    pub port: u16,
    /// Database file path (from PULSEBOARD_DB); `None` means the
    /// platform data directory.
    pub database: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let port = std::env::var("PULSEBOARD_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(3000);

        let database = std::env::var("PULSEBOARD_DB").ok().map(PathBuf::from);

        Self { port, database }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
