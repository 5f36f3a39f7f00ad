//! Command-line and environment configuration for the server

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

/// mqweb - browse and publish to a message broker over HTTP
#[derive(Debug, Clone, Parser)]
#[command(name = "mqweb", version, about)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    #[arg(long, env = "MQWEB_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// TOML file holding the named connection profiles
    #[arg(long, env = "MQWEB_CONFIG", default_value = "mqweb.toml")]
    pub config: PathBuf,
}

impl ServerConfig {
    pub fn log_config(&self) {
        info!(bind = %self.bind, config = %self.config.display(), "Server configuration");
    }
}
