//! Gateway abstraction and the RPC implementation.

use crate::auth::AuthProvider;
use crate::config::GatewayConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use async_trait::async_trait;
use lorekeep_protocol::{
    decode_collections, BatchEnvelope, BatchResult, Collections, Record, RpcAction, RpcRequest,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The network boundary to the backend.
///
/// This trait abstracts the remote, allowing the repository layer to run
/// against the RPC gateway, an in-process backend, or a test double.
/// Every method accepts one or more collections and costs one round trip.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Full scan of the given collections.
    ///
    /// Collections unknown to the backend may be absent from the answer.
    async fn get_all(&self, collections: &[String]) -> RemoteResult<Collections>;

    /// Point fetch of ids, per collection.
    async fn get_by_id(&self, ids: BTreeMap<String, Vec<String>>) -> RemoteResult<Collections>;

    /// Creates, updates and deletes across collections in one round trip.
    async fn batch(&self, envelope: BatchEnvelope) -> RemoteResult<BatchResult>;

    /// Creates records, per collection.
    async fn create(&self, records: BTreeMap<String, Vec<Record>>) -> RemoteResult<BatchResult> {
        self.batch(BatchEnvelope {
            create: records,
            ..BatchEnvelope::default()
        })
        .await
    }

    /// Updates records by their id, per collection.
    async fn update_by_id(
        &self,
        records: BTreeMap<String, Vec<Record>>,
    ) -> RemoteResult<BatchResult> {
        self.batch(BatchEnvelope {
            update_by_id: records,
            ..BatchEnvelope::default()
        })
        .await
    }

    /// Deletes ids, per collection.
    async fn delete_by_id(&self, ids: BTreeMap<String, Vec<String>>) -> RemoteResult<BatchResult> {
        self.batch(BatchEnvelope {
            delete_by_id: ids,
            ..BatchEnvelope::default()
        })
        .await
    }
}

/// Gateway speaking the JSON RPC wire format over an [`HttpClient`].
pub struct RpcGateway<C: HttpClient, A: AuthProvider> {
    config: GatewayConfig,
    client: C,
    auth: A,
}

impl<C: HttpClient, A: AuthProvider> RpcGateway<C, A> {
    /// Creates a new RPC gateway.
    pub fn new(config: GatewayConfig, client: C, auth: A) -> Self {
        Self {
            config,
            client,
            auth,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Performs one call, refreshing the credential and retrying at most once.
    async fn call(&self, action: RpcAction) -> RemoteResult<Vec<u8>> {
        let mut refreshed = false;
        let mut token = match self.auth.credential().await {
            Some(token) if self.auth.is_valid(&token) => token,
            _ => {
                refreshed = true;
                self.refresh().await?
            }
        };

        loop {
            let response = self.send(&action, &token).await?;

            if response.is_success() {
                return Ok(response.body);
            }

            if !response.is_auth_failure() {
                return Err(RemoteError::transport(response.status, &response.body));
            }

            if refreshed {
                return Err(RemoteError::AuthRequired(format!(
                    "credential rejected with status {} after refresh",
                    response.status
                )));
            }

            warn!(
                action = action.name(),
                status = response.status,
                "credential rejected, refreshing once"
            );
            refreshed = true;
            token = self.refresh().await?;
        }
    }

    async fn refresh(&self) -> RemoteResult<String> {
        self.auth
            .refresh_credential()
            .await
            .filter(|token| self.auth.is_valid(token))
            .ok_or_else(|| {
                RemoteError::AuthRequired("credential refresh yielded no usable token".into())
            })
    }

    async fn send(&self, action: &RpcAction, token: &str) -> RemoteResult<HttpResponse> {
        let body = RpcRequest::new(action.clone())
            .with_credential(token)
            .encode()
            .map_err(|e| RemoteError::Encode(e.to_string()))?;

        debug!(action = action.name(), bytes = body.len(), "rpc call");

        self.client
            .post(HttpRequest {
                url: self.config.endpoint(),
                bearer: Some(token.to_string()),
                body,
            })
            .await
            .map_err(RemoteError::Network)
    }
}

#[async_trait]
impl<C: HttpClient, A: AuthProvider> Gateway for RpcGateway<C, A> {
    async fn get_all(&self, collections: &[String]) -> RemoteResult<Collections> {
        let body = self
            .call(RpcAction::GetAll {
                collections: collections.to_vec(),
            })
            .await?;
        decode_collections(&body).map_err(|e| RemoteError::MalformedResponse(e.to_string()))
    }

    async fn get_by_id(&self, ids: BTreeMap<String, Vec<String>>) -> RemoteResult<Collections> {
        let body = self.call(RpcAction::GetById { ids }).await?;
        decode_collections(&body).map_err(|e| RemoteError::MalformedResponse(e.to_string()))
    }

    async fn batch(&self, envelope: BatchEnvelope) -> RemoteResult<BatchResult> {
        let body = self.call(RpcAction::Mutate(envelope)).await?;
        let result =
            BatchResult::decode(&body).map_err(|e| RemoteError::MalformedResponse(e.to_string()))?;

        let failures = result.failure_count();
        if failures > 0 {
            warn!(failures, "batch items rejected by remote");
        }
        Ok(result)
    }
}
