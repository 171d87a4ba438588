//! Server configuration.

use lorekeep_protocol::METADATA_COLLECTION;
use std::time::Duration;

/// Configuration for the reference backend.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path of the RPC endpoint.
    pub rpc_path: String,
    /// Whether to require a valid token on every call.
    pub require_auth: bool,
    /// Secret key for token signing and validation (if auth enabled).
    pub auth_secret: Option<Vec<u8>>,
    /// Token lifetime.
    pub token_expiry: Duration,
    /// Name of the table holding per-collection stamps.
    pub metadata_collection: String,
}

impl ServerConfig {
    /// Creates a configuration without authentication.
    pub fn new() -> Self {
        Self {
            rpc_path: "/rpc".into(),
            require_auth: false,
            auth_secret: None,
            token_expiry: Duration::from_secs(24 * 60 * 60),
            metadata_collection: METADATA_COLLECTION.into(),
        }
    }

    /// Sets the RPC path.
    pub fn with_rpc_path(mut self, path: impl Into<String>) -> Self {
        self.rpc_path = path.into();
        self
    }

    /// Enables authentication with the given secret.
    pub fn with_auth(mut self, secret: Vec<u8>) -> Self {
        self.require_auth = true;
        self.auth_secret = Some(secret);
        self
    }

    /// Sets the token lifetime.
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Sets the metadata table name.
    pub fn with_metadata_collection(mut self, name: impl Into<String>) -> Self {
        self.metadata_collection = name.into();
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
