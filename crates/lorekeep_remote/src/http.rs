//! HTTP transport for the gateway.
//!
//! The actual HTTP client is abstracted via a trait so the gateway can run
//! over `reqwest` in production and over an in-process loopback in tests.

use crate::config::GatewayConfig;
use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use lorekeep_protocol::PROTOCOL_VERSION;
use std::sync::Arc;

/// Header carrying the wire protocol version.
pub const PROTOCOL_HEADER: &str = "x-lorekeep-protocol";

/// An outgoing POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Full endpoint URL.
    pub url: String,
    /// Bearer credential, also present in the body.
    pub bearer: Option<String>,
    /// JSON body.
    pub body: Vec<u8>,
}

/// A response as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a 200 response.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true for statuses that signal an expired or missing credential.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. An `Err` means
/// no response was received at all; any received status, successful or
/// not, is an `Ok`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response.
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// HTTP client backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Builds a client honoring the configured timeout and user agent.
    pub fn new(config: &GatewayConfig) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let mut builder = self
            .client
            .post(&request.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(PROTOCOL_HEADER, PROTOCOL_VERSION.to_string())
            .body(request.body);

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| e.to_string())?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a POST to `path` and returns the response.
    fn handle_post(&self, path: &str, request: &HttpRequest) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: Arc<S>,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: Arc<S>) -> Self {
        Self { server }
    }

    /// Returns the server this client talks to.
    pub fn server(&self) -> &Arc<S> {
        &self.server
    }
}

#[async_trait]
impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let path = url_path(&request.url);
        Ok(self.server.handle_post(path, &request))
    }
}

/// Extracts the path of a URL ("https://host:1/rpc" -> "/rpc").
fn url_path(url: &str) -> &str {
    let rest = url.find("://").map_or(url, |i| &url[i + 3..]);
    rest.find('/').map_or("/", |i| &rest[i..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct EchoServer {
        seen: Mutex<Vec<String>>,
    }

    impl LoopbackServer for EchoServer {
        fn handle_post(&self, path: &str, request: &HttpRequest) -> HttpResponse {
            self.seen.lock().push(path.to_string());
            HttpResponse::ok(request.body.clone())
        }
    }

    #[test]
    fn url_path_extraction() {
        assert_eq!(url_path("https://tables.example.com/rpc"), "/rpc");
        assert_eq!(url_path("http://127.0.0.1:8080/v1/exec?x=1"), "/v1/exec?x=1");
        assert_eq!(url_path("memory://"), "/");
        assert_eq!(url_path("/rpc"), "/rpc");
    }

    #[test]
    fn response_classification() {
        assert!(HttpResponse::ok("{}").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(HttpResponse::new(401, "").is_auth_failure());
        assert!(HttpResponse::new(403, "").is_auth_failure());
        assert!(!HttpResponse::new(500, "").is_auth_failure());
        assert!(!HttpResponse::new(500, "").is_success());
    }

    #[tokio::test]
    async fn loopback_routes_by_path() {
        let server = Arc::new(EchoServer {
            seen: Mutex::new(Vec::new()),
        });
        let client = LoopbackClient::new(Arc::clone(&server));

        let response = client
            .post(HttpRequest {
                url: "memory://backend/rpc".into(),
                bearer: None,
                body: b"ping".to_vec(),
            })
            .await
            .unwrap();

        assert_eq!(response.body, b"ping");
        assert_eq!(*server.seen.lock(), vec!["/rpc".to_string()]);
    }

    #[test]
    fn reqwest_client_builds() {
        assert!(ReqwestClient::new(&GatewayConfig::default()).is_ok());
    }
}
