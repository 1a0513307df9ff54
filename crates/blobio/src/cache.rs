//! Account-to-client cache.

use crate::azure::AzureClientFactory;
use crate::client::{BlobClient, ClientFactory, ClientOptions};
use crate::error::TransportError;
use crate::{BlobError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::{debug, trace};
use url::Url;

/// Manages one blob client per storage account.
///
/// Clients are created on first use and kept for the cache's lifetime.
pub struct ClientCache {
    clients: RwLock<HashMap<String, Arc<dyn BlobClient>>>,
    factory: Arc<dyn ClientFactory>,
    options: ClientOptions,
}

impl ClientCache {
    /// Create an empty cache that builds clients with `factory` and `options`.
    pub fn new(factory: Arc<dyn ClientFactory>, options: ClientOptions) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            factory,
            options,
        }
    }

    /// Create an empty cache for Azure storage with the default options.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(AzureClientFactory::new()), ClientOptions::default())
    }

    /// The process-wide cache used when a [`Context`](crate::Context) does
    /// not select one.
    pub fn global() -> Arc<ClientCache> {
        static GLOBAL: OnceLock<Arc<ClientCache>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(ClientCache::with_defaults()))
            .clone()
    }

    /// Options applied to every client this cache builds
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Number of accounts with a cached client
    pub fn len(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no client has been created yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create or reuse the client for `account`.
    pub fn get_client(&self, account: &str) -> Result<Arc<dyn BlobClient>> {
        {
            let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(client) = clients.get(account) {
                trace!("Client cache hit for account {}", account);
                return Ok(client.clone());
            }
        }

        // Every cold start waits here, whatever the account, so a race never
        // authenticates twice.
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(account) {
            // Another caller won the race.
            return Ok(client.clone());
        }

        debug!("Creating blob client for account {}", account);
        let client = self
            .build(account)
            .map_err(|source| BlobError::ClientCreation {
                account: account.to_string(),
                source,
            })?;
        clients.insert(account.to_string(), client.clone());
        Ok(client)
    }

    fn build(&self, account: &str) -> std::result::Result<Arc<dyn BlobClient>, TransportError> {
        let account_url = Url::parse(&format!(
            "https://{}.{}",
            account,
            crate::address::STORAGE_DOMAIN
        ))
        .map_err(|e| TransportError::Other(format!("invalid account name: {}", e)))?;
        let credential = self.factory.resolve_credential()?;
        self.factory
            .build_client(account, &account_url, credential, &self.options)
    }
}

impl fmt::Debug for ClientCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCache")
            .field("accounts", &self.len())
            .field("factory", &self.factory)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClientFactory;
    use std::sync::Barrier;
    use std::thread;

    fn cache_with(factory: &Arc<MemoryClientFactory>) -> ClientCache {
        ClientCache::new(factory.clone(), ClientOptions::default())
    }

    #[test]
    fn test_reuses_client() {
        let factory = Arc::new(MemoryClientFactory::new());
        let cache = cache_with(&factory);

        let first = cache.get_client("acct").unwrap();
        let second = cache.get_client("acct").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.constructions(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_one_client_per_account() {
        let factory = Arc::new(MemoryClientFactory::new());
        let cache = cache_with(&factory);

        let a = cache.get_client("a").unwrap();
        let b = cache.get_client("b").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(factory.constructions(), 2);
    }

    #[test]
    fn test_concurrent_first_use_constructs_once() {
        const THREADS: usize = 16;
        let factory = Arc::new(MemoryClientFactory::new());
        let cache = Arc::new(cache_with(&factory));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_client("shared").unwrap()
                })
            })
            .collect();
        let clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(factory.constructions(), 1);
        assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let factory = Arc::new(MemoryClientFactory::new());
        factory.fail_next_constructions(1);
        let cache = cache_with(&factory);

        let err = cache.get_client("acct").unwrap_err();
        match err {
            BlobError::ClientCreation { account, .. } => assert_eq!(account, "acct"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(cache.is_empty());

        cache.get_client("acct").unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalid_account_name() {
        let factory = Arc::new(MemoryClientFactory::new());
        let cache = cache_with(&factory);
        let err = cache.get_client("bad account").unwrap_err();
        assert!(matches!(err, BlobError::ClientCreation { .. }));
        assert_eq!(factory.constructions(), 0);
    }
}
