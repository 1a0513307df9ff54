//! Ambient per-call configuration.
//!
//! A [`Context`] travels with every blocking operation. It selects the
//! [`ClientCache`] and [`ConcurrencyPolicy`] to use and carries an optional
//! deadline and [`CancelToken`] that in-flight transport calls are raced
//! against.

use crate::cache::ClientCache;
use crate::concurrency::ConcurrencyPolicy;
use crate::error::TransportError;
use crate::runtime::get_runtime;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Cooperative cancellation signal shared between a caller and its
/// in-flight operations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    /// Create a token that is not canceled yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every operation observing this token, now and later
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Per-call configuration: client cache, concurrency policy, deadline and
/// cancellation.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cache: Option<Arc<ClientCache>>,
    concurrency: Option<ConcurrencyPolicy>,
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl Context {
    /// A context using the global client cache and default policy, with no
    /// deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Use `cache` instead of the global one
    pub fn with_client_cache(mut self, cache: Arc<ClientCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Override the ranged-read fan-out policy
    pub fn with_concurrency(mut self, policy: ConcurrencyPolicy) -> Self {
        self.concurrency = Some(policy);
        self
    }

    /// Fail in-flight calls once `deadline` passes
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fail in-flight calls after `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Fail in-flight calls once `token` is canceled
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Copy the client cache and concurrency policy of `src` into this
    /// context, keeping this context's deadline and cancel token.
    pub fn with_config_from(mut self, src: &Context) -> Self {
        self.cache = Some(src.client_cache());
        self.concurrency = Some(src.concurrency());
        self
    }

    /// The client cache selected by this context, or the global one
    pub fn client_cache(&self) -> Arc<ClientCache> {
        self.cache.clone().unwrap_or_else(ClientCache::global)
    }

    /// The concurrency policy selected by this context, or the default
    pub fn concurrency(&self) -> ConcurrencyPolicy {
        self.concurrency.unwrap_or_default()
    }

    /// The deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive a transport future to completion on the shared runtime, racing
    /// it against the deadline and cancel token.
    ///
    /// Must not be called from within an async runtime.
    pub(crate) fn block_on<F, T, E>(&self, fut: F) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: From<TransportError>,
    {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(TransportError::Cancelled.into());
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(TransportError::DeadlineExceeded.into());
        }

        let runtime = get_runtime();
        runtime.block_on(async {
            let deadline = async {
                match self.deadline {
                    Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
                    None => std::future::pending::<()>().await,
                }
            };
            let cancelled = async {
                match &self.cancel {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                result = fut => result,
                _ = deadline => Err(TransportError::DeadlineExceeded.into()),
                _ = cancelled => Err(TransportError::Cancelled.into()),
            }
        })
    }
}
