pub mod api_client;
pub mod credentials;
pub mod graph_client;
pub mod metadata_store;
pub mod publish_service;
pub mod refresh_service;
pub mod share_service;
pub mod upload_service;
