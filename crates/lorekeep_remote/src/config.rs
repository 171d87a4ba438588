//! Configuration for the remote gateway.

use std::time::Duration;

/// Configuration for reaching the backend's RPC endpoint.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the backend (e.g., "https://tables.example.com").
    pub base_url: String,
    /// Path of the RPC endpoint.
    pub rpc_path: String,
    /// Request timeout, enforced by the HTTP client.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl GatewayConfig {
    /// Creates a new gateway configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            rpc_path: "/rpc".into(),
            timeout: Duration::from_secs(30),
            user_agent: format!("lorekeep/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the RPC endpoint path.
    pub fn with_rpc_path(mut self, path: impl Into<String>) -> Self {
        self.rpc_path = path.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the full endpoint URL.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.rpc_path.trim_start_matches('/')
        )
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8080")
    }
}
