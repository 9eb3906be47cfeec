//! Credential provider seam. The pipeline only ever asks for a bearer token;
//! how that token was obtained (popup, redirect, device code) is not its concern.

use crate::errors::ClipResult;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current access token, or `None` when signed out or the token could not be acquired.
    async fn get_access_token(&self) -> Option<String>;

    async fn is_authenticated(&self) -> bool;

    async fn login(&self) -> ClipResult<()>;

    async fn logout(&self) -> ClipResult<()>;
}

/// Serves a token handed in from configuration (e.g. `DRIVECLIP_ACCESS_TOKEN`).
pub struct StaticTokenProvider {
    configured: Option<String>,
    current: RwLock<Option<String>>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        let token = token.filter(|t| !t.trim().is_empty());
        Self {
            configured: token.clone(),
            current: RwLock::new(token),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("DRIVECLIP_ACCESS_TOKEN").ok())
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn get_access_token(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    async fn login(&self) -> ClipResult<()> {
        *self.current.write().await = self.configured.clone();
        info!(authenticated = self.configured.is_some(), "login");
        Ok(())
    }

    async fn logout(&self) -> ClipResult<()> {
        *self.current.write().await = None;
        info!("logout");
        Ok(())
    }
}
