use crate::services::{
    graph_client::DEFAULT_GRAPH_BASE_URL, metadata_store::DEFAULT_URL_TTL_SECS,
    share_service::DEFAULT_SHARE_BASE_URL,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub graph_base_url: String,
    pub share_base_url: String,
    pub url_ttl_secs: i64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Video metadata service for drive-hosted screen recordings")]
pub struct Args {
    /// Host to bind to (overrides DRIVECLIP_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DRIVECLIP_PORT / PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Metadata store URL: sqlite://, postgres:// or document:<path> (overrides DRIVECLIP_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Drive API base URL (overrides DRIVECLIP_GRAPH_BASE_URL)
    #[arg(long)]
    pub graph_base_url: Option<String>,

    /// Public share link prefix (overrides DRIVECLIP_SHARE_BASE_URL)
    #[arg(long)]
    pub share_base_url: Option<String>,

    /// Download URL validity in seconds (overrides DRIVECLIP_URL_TTL_SECS)
    #[arg(long)]
    pub url_ttl_secs: Option<i64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::merge(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// CLI values win over `lookup`, which wins over defaults.
    pub fn merge(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_host = lookup("DRIVECLIP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match lookup("DRIVECLIP_PORT").or_else(|| lookup("PORT")) {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing port value `{}`", value))?,
            None => 3000,
        };
        let env_db = lookup("DRIVECLIP_DATABASE_URL")
            .unwrap_or_else(|| "sqlite://./data/driveclip.db".into());
        let env_graph =
            lookup("DRIVECLIP_GRAPH_BASE_URL").unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.into());
        let env_share =
            lookup("DRIVECLIP_SHARE_BASE_URL").unwrap_or_else(|| DEFAULT_SHARE_BASE_URL.into());
        let env_ttl = match lookup("DRIVECLIP_URL_TTL_SECS") {
            Some(value) => value
                .parse::<i64>()
                .with_context(|| format!("parsing DRIVECLIP_URL_TTL_SECS value `{}`", value))?,
            None => DEFAULT_URL_TTL_SECS,
        };

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            graph_base_url: args.graph_base_url.unwrap_or(env_graph),
            share_base_url: args.share_base_url.unwrap_or(env_share),
            url_ttl_secs: args.url_ttl_secs.unwrap_or(env_ttl),
        };

        if cfg.url_ttl_secs <= 0 {
            anyhow::bail!("url ttl must be positive, got {}", cfg.url_ttl_secs);
        }
        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.url_ttl_secs)
    }
}
