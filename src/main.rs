use anyhow::{Context, Result};
use driveclip::{
    config::AppConfig,
    routes::routes::build_router,
    services::{
        graph_client::GraphClient,
        metadata_store::{self, StoreBackend},
        refresh_service::UrlRefreshGateway,
        share_service::ShareResolver,
    },
    state::AppState,
};
use std::{io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- .env, then logging ---
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;
    tracing::info!("Starting driveclip with config: {:?}", cfg);

    // --- Make room for file-backed stores ---
    ensure_parent_dir(&cfg.database_url)?;

    let store = metadata_store::connect(&cfg.database_url, cfg.url_ttl())
        .await
        .with_context(|| format!("opening metadata store at {}", cfg.database_url))?;

    // --- Handle migration mode ---
    store.migrate().await.context("running migrations")?;
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Initialize core services ---
    let remote = Arc::new(GraphClient::new(cfg.graph_base_url.clone())?);
    let shares = ShareResolver::new(remote.clone(), cfg.share_base_url.clone());
    let gateway = UrlRefreshGateway::new(store, remote, shares);

    let app = build_router(AppState::new(gateway));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the directory holding a SQLite or document store file.
fn ensure_parent_dir(database_url: &str) -> Result<()> {
    let path = match StoreBackend::from_url(database_url)? {
        StoreBackend::Sqlite => database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:"),
        StoreBackend::Document => database_url
            .trim_start_matches("document://")
            .trim_start_matches("document:"),
        StoreBackend::Postgres => return Ok(()),
    };
    if path.starts_with(":memory:") {
        return Ok(());
    }
    let path = path.split('?').next().unwrap_or(path);

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    Ok(())
}
