//! Request handling for the RPC endpoint.

use crate::auth::TokenValidator;
use crate::error::{ServerError, ServerResult};
use crate::tables::Tables;
use lorekeep_protocol::{RpcAction, RpcRequest};
use std::sync::Arc;
use tracing::debug;

/// Decodes, authenticates and dispatches RPC bodies.
pub struct RequestHandler {
    tables: Arc<Tables>,
    validator: Option<Arc<TokenValidator>>,
}

impl RequestHandler {
    /// Creates a handler. Without a validator every call is accepted.
    pub fn new(tables: Arc<Tables>, validator: Option<Arc<TokenValidator>>) -> Self {
        Self { tables, validator }
    }

    /// Handles one RPC body and returns the JSON answer.
    ///
    /// The credential is read from the body, falling back to the bearer
    /// header.
    pub fn handle(&self, body: &[u8], bearer: Option<&str>) -> ServerResult<Vec<u8>> {
        let request = RpcRequest::decode(body)?;
        self.authenticate(request.credential.as_deref().or(bearer))?;

        debug!(action = request.action.name(), "handling rpc");

        let answer = match request.action {
            RpcAction::GetAll { collections } => {
                serde_json::to_vec(&self.tables.get_all(&collections))
            }
            RpcAction::GetById { ids } => serde_json::to_vec(&self.tables.get_by_id(&ids)),
            RpcAction::Mutate(envelope) => serde_json::to_vec(&self.tables.apply(envelope)),
        };
        answer.map_err(|e| ServerError::Internal(e.to_string()))
    }

    fn authenticate(&self, credential: Option<&str>) -> ServerResult<()> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let token =
            credential.ok_or_else(|| ServerError::NotAuthorized("missing credential".into()))?;
        validator.validate(token).map(|_| ())
    }
}
