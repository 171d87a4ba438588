//! Pull command implementation.

use lorekeep_core::{Repository, SyncConfig, SyncContext};
use lorekeep_remote::{GatewayConfig, ReqwestClient, RpcGateway, StaticCredential};
use lorekeep_storage::StoreLocation;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Options for a pull.
pub struct PullOptions<'a> {
    /// Backend base URL.
    pub url: &'a str,
    /// RPC endpoint path.
    pub rpc_path: &'a str,
    /// Bearer token.
    pub token: &'a str,
    /// Collections to pull.
    pub collections: &'a [String],
    /// Refresh even when the stamps agree.
    pub force: bool,
}

/// Refreshes collections of the store at `path` from the backend.
pub async fn run(path: &Path, options: PullOptions<'_>) -> Result<(), Box<dyn std::error::Error>> {
    if options.collections.is_empty() {
        return Err("At least one --collection is required".into());
    }

    let gateway_config = GatewayConfig::new(options.url).with_rpc_path(options.rpc_path);
    let client = ReqwestClient::new(&gateway_config)?;
    let gateway = Arc::new(RpcGateway::new(
        gateway_config,
        client,
        StaticCredential::new(options.token),
    ));

    let config = SyncConfig::new()
        .with_store(StoreLocation::Directory(path.to_path_buf()))
        .with_collections(options.collections.iter().cloned())
        .with_background_revalidation(false);
    let context = SyncContext::open(config, gateway).await?;

    for name in options.collections {
        let repository: Repository<Value> = Repository::new(Arc::clone(&context), name.as_str());
        if options.force {
            let records = repository.force_fetch().await?;
            println!("{:<24} refreshed ({} records)", name, records.len());
        } else if repository.sync().await? {
            let count = repository.get_local().await?.len();
            println!("{:<24} refreshed ({} records)", name, count);
        } else {
            println!("{:<24} up to date", name);
        }
    }

    info!(collections = options.collections.len(), "pull finished");
    Ok(())
}
