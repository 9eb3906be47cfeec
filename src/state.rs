use crate::services::{metadata_store::MetadataStore, refresh_service::UrlRefreshGateway};
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetadataStore>,
    pub gateway: Arc<UrlRefreshGateway>,
}

impl AppState {
    pub fn new(gateway: UrlRefreshGateway) -> Self {
        Self {
            store: gateway.store().clone(),
            gateway: Arc::new(gateway),
        }
    }
}
