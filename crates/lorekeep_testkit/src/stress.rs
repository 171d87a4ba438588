//! Stress tests for the sync layer.
//!
//! These runs drive many concurrent repository operations against a
//! reference backend and verify that the local copy converges.

use crate::fixtures::TestBackend;
use lorekeep_core::{normalize_record_id, Repository};
use lorekeep_protocol::Record;
use lorekeep_storage::LocalStore;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per task.
    pub operations: usize,
    /// Number of concurrent tasks.
    pub tasks: usize,
    /// Collection the run works on.
    pub collection: String,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 50,
            tasks: 4,
            collection: "Stress".to_string(),
        }
    }
}

/// Runs concurrent full refreshes of one collection.
pub async fn stress_concurrent_refreshes(backend: &TestBackend, config: &StressConfig) -> StressResult {
    let repository: Repository<Value> = backend.repository(&config.collection);
    run(config, move |_, i| {
        let repository = repository.clone();
        async move {
            if i % 2 == 0 {
                repository.force_fetch().await.map(|_| ())
            } else {
                repository.sync().await.map(|_| ())
            }
        }
    })
    .await
}

/// Runs concurrent creates with distinct ids.
pub async fn stress_concurrent_creates(backend: &TestBackend, config: &StressConfig) -> StressResult {
    let repository: Repository<Value> = backend.repository(&config.collection);
    run(config, move |task, i| {
        let repository = repository.clone();
        async move {
            let entity = json!({ "id": format!("t{task}-{i}"), "task": task, "seq": i });
            repository.create(&entity).await.map(|_| ())
        }
    })
    .await
}

/// Interleaves writes with refreshes and point reads.
pub async fn stress_mixed_operations(backend: &TestBackend, config: &StressConfig) -> StressResult {
    let repository: Repository<Value> = backend.repository(&config.collection);
    run(config, move |task, i| {
        let repository = repository.clone();
        async move {
            let id = format!("t{task}-{}", i / 3);
            match i % 3 {
                0 => repository
                    .create(&json!({ "id": id, "seq": i }))
                    .await
                    .map(|_| ()),
                1 => repository
                    .update(&json!({ "id": id, "seq": i, "touched": true }))
                    .await
                    .map(|_| ()),
                _ => repository.sync().await.map(|_| ()),
            }
        }
    })
    .await
}

async fn run<F, Fut>(config: &StressConfig, op: F) -> StressResult
where
    F: Fn(usize, usize) -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<Output = lorekeep_core::CoreResult<()>> + Send + 'static,
{
    let start = Instant::now();
    let mut tasks = JoinSet::new();

    for task in 0..config.tasks {
        let op = op.clone();
        let operations = config.operations;
        tasks.spawn(async move {
            let mut successful = 0usize;
            let mut failed = 0usize;
            for i in 0..operations {
                match op(task, i).await {
                    Ok(()) => successful += 1,
                    Err(_) => failed += 1,
                }
            }
            (successful, failed)
        });
    }

    let mut successful = 0usize;
    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((s, f)) => {
                successful += s;
                failed += f;
            }
            Err(_) => failed += config.operations,
        }
    }

    StressResult::new(successful, failed, start.elapsed())
}

/// Returns the local and remote rows of `collection`, keyed by id.
pub async fn snapshot(
    backend: &TestBackend,
    collection: &str,
) -> (BTreeMap<String, Record>, BTreeMap<String, Record>) {
    let local = backend
        .store()
        .await
        .get_all(collection)
        .await
        .expect("Failed to read local collection");
    let remote = backend.remote_rows(collection);
    (keyed(local), keyed(remote))
}

/// Returns true if the local copy equals the remote collection.
pub async fn converged(backend: &TestBackend, collection: &str) -> bool {
    let (local, remote) = snapshot(backend, collection).await;
    local == remote
}

fn keyed(rows: Vec<Record>) -> BTreeMap<String, Record> {
    rows.into_iter()
        .filter_map(|mut row| {
            normalize_record_id(&mut row);
            let id = row.get("id")?.as_str()?.to_string();
            Some((id, row))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> StressConfig {
        StressConfig {
            operations: 20,
            tasks: 4,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refreshes_converge() {
        let backend = TestBackend::memory(&["Stress"]).await;
        backend.seed(
            "Stress",
            (0..30).map(|i| json!({ "id": format!("s{i}"), "n": i })).collect(),
        );

        let result = stress_concurrent_refreshes(&backend, &small()).await;
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.total_ops, 80);
        assert!(converged(&backend, "Stress").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_all_land() {
        let backend = TestBackend::memory(&["Stress"]).await;
        let result = stress_concurrent_creates(&backend, &small()).await;
        assert_eq!(result.failed_ops, 0);

        let (local, remote) = snapshot(&backend, "Stress").await;
        assert_eq!(local.len(), 80);
        assert_eq!(local, remote);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn mixed_operations_converge_after_refresh() {
        let backend = TestBackend::memory(&["Stress"]).await;
        let result = stress_mixed_operations(&backend, &small()).await;
        assert_eq!(result.failed_ops, 0);

        let repository: Repository<Value> = backend.repository("Stress");
        repository.force_fetch().await.unwrap();
        assert!(converged(&backend, "Stress").await);
        assert!(!repository.sync().await.unwrap());
    }
}
