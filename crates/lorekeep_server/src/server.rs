//! The in-process tabular backend.

use crate::auth::{AuthConfig, TokenValidator};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::RequestHandler;
use crate::tables::Tables;
use lorekeep_protocol::Record;
use lorekeep_remote::{HttpRequest, HttpResponse, LoopbackServer};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

/// The reference backend.
///
/// This server answers the gateway's RPC wire format from in-memory
/// tables. It is reached through a
/// [`LoopbackClient`](lorekeep_remote::LoopbackClient), which makes it the
/// backend of choice for tests and demos.
///
/// # Example
///
/// ```
/// use lorekeep_server::{ServerConfig, TableServer};
/// use lorekeep_remote::{GatewayConfig, LoopbackClient, RpcGateway, StaticCredential};
/// use std::sync::Arc;
///
/// let server = Arc::new(TableServer::new(ServerConfig::default()).unwrap());
/// let gateway = RpcGateway::new(
///     GatewayConfig::new("memory://backend"),
///     LoopbackClient::new(Arc::clone(&server)),
///     StaticCredential::new("unused"),
/// );
/// # let _ = gateway;
/// ```
pub struct TableServer {
    config: ServerConfig,
    tables: Arc<Tables>,
    validator: Option<Arc<TokenValidator>>,
    handler: RequestHandler,
    requests: AtomicUsize,
    faults: Mutex<Vec<HttpResponse>>,
}

impl TableServer {
    /// Creates a server with empty tables.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let tables = Arc::new(Tables::new(config.metadata_collection.clone()));

        let validator = if config.require_auth {
            let secret = config.auth_secret.clone().ok_or_else(|| {
                ServerError::Internal("authentication required but no secret configured".into())
            })?;
            let auth = AuthConfig::new(secret).with_expiry(config.token_expiry);
            Some(Arc::new(TokenValidator::new(auth)?))
        } else {
            None
        };

        let handler = RequestHandler::new(Arc::clone(&tables), validator.clone());

        Ok(Self {
            config,
            tables,
            validator,
            handler,
            requests: AtomicUsize::new(0),
            faults: Mutex::new(Vec::new()),
        })
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the server's tables.
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Inserts rows as another client would.
    pub fn seed(&self, collection: &str, records: Vec<Record>) {
        self.tables.seed(collection, records);
    }

    /// Issues a token for `subject`.
    ///
    /// Fails if the server was configured without authentication.
    pub fn issue_token(&self, subject: [u8; 16]) -> ServerResult<String> {
        self.validator
            .as_ref()
            .map(|v| v.issue(subject))
            .ok_or_else(|| ServerError::Internal("authentication is disabled".into()))
    }

    /// Invalidates every token issued so far.
    pub fn revoke_all(&self) {
        if let Some(validator) = &self.validator {
            validator.revoke_all();
        }
    }

    /// Returns the number of requests received, including failed ones.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Answers the next request with `response` instead of handling it.
    ///
    /// Queued faults are served in order, one per request.
    pub fn fail_next(&self, response: HttpResponse) {
        self.faults.lock().push(response);
    }

    fn take_fault(&self) -> Option<HttpResponse> {
        let mut faults = self.faults.lock();
        (!faults.is_empty()).then(|| faults.remove(0))
    }
}

impl LoopbackServer for TableServer {
    fn handle_post(&self, path: &str, request: &HttpRequest) -> HttpResponse {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if let Some(fault) = self.take_fault() {
            return fault;
        }

        let outcome = if path == self.config.rpc_path {
            self.handler.handle(&request.body, request.bearer.as_deref())
        } else {
            Err(ServerError::NotFound(path.to_string()))
        };

        match outcome {
            Ok(body) => HttpResponse::ok(body),
            Err(err) => {
                warn!(status = err.status(), error = %err, "request failed");
                HttpResponse::new(err.status(), err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorekeep_protocol::{RpcAction, RpcRequest};

    fn post(server: &TableServer, path: &str, action: RpcAction, token: Option<&str>) -> HttpResponse {
        let mut request = RpcRequest::new(action);
        request.credential = token.map(String::from);
        server.handle_post(
            path,
            &HttpRequest {
                url: format!("memory://backend{path}"),
                bearer: None,
                body: request.encode().unwrap(),
            },
        )
    }

    fn scan() -> RpcAction {
        RpcAction::GetAll {
            collections: vec!["Notes".into()],
        }
    }

    #[test]
    fn server_lifecycle() {
        let server = TableServer::new(ServerConfig::default()).unwrap();
        assert_eq!(server.request_count(), 0);

        let response = post(&server, "/rpc", scan(), None);
        assert!(response.is_success());
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn unknown_path_is_404() {
        let server = TableServer::new(ServerConfig::default()).unwrap();
        assert_eq!(post(&server, "/other", scan(), None).status, 404);
    }

    #[test]
    fn faults_are_served_once_in_order() {
        let server = TableServer::new(ServerConfig::default()).unwrap();
        server.fail_next(HttpResponse::new(503, "maintenance"));
        server.fail_next(HttpResponse::ok("garbage"));

        assert_eq!(post(&server, "/rpc", scan(), None).status, 503);
        assert_eq!(post(&server, "/rpc", scan(), None).body, b"garbage");
        assert!(post(&server, "/rpc", scan(), None).is_success());
        assert_eq!(server.request_count(), 3);
    }

    #[test]
    fn auth_requires_secret() {
        let mut config = ServerConfig::default();
        config.require_auth = true;
        assert!(TableServer::new(config).is_err());
    }

    #[test]
    fn tokens_and_revocation() {
        let server =
            TableServer::new(ServerConfig::default().with_auth(b"secret".to_vec())).unwrap();
        let token = server.issue_token([1u8; 16]).unwrap();

        assert!(post(&server, "/rpc", scan(), Some(&token)).is_success());
        assert_eq!(post(&server, "/rpc", scan(), None).status, 401);

        server.revoke_all();
        assert_eq!(post(&server, "/rpc", scan(), Some(&token)).status, 401);
    }

    #[test]
    fn issuing_without_auth_fails() {
        let server = TableServer::new(ServerConfig::default()).unwrap();
        assert!(server.issue_token([0u8; 16]).is_err());
    }
}
