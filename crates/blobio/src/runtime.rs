//! Tokio runtime shared by every blocking blob operation

use std::sync::Arc;
use std::sync::OnceLock;
use tokio::runtime::Runtime;

/// Get or create the shared runtime that drives transport futures.
///
/// Ranged downloads fan out into several requests, so the pool is sized by
/// the host's parallelism rather than a fixed count.
pub(crate) fn get_runtime() -> Arc<Runtime> {
    static RUNTIME: OnceLock<Arc<Runtime>> = OnceLock::new();

    RUNTIME
        .get_or_init(|| {
            let workers = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
                .clamp(2, 16);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(workers)
                .enable_all()
                .thread_name("blobio-worker")
                .build()
                .expect("Failed to create Tokio runtime");

            Arc::new(runtime)
        })
        .clone()
}
