//! In-process storage accounts backed by `object_store`'s `InMemory` store.
//!
//! Useful for tests: the factory counts client constructions and can be told
//! to fail the next few of them.

use crate::client::{BlobClient, ClientFactory, ClientOptions, Credential};
use crate::error::TransportError;
use crate::runtime::get_runtime;
use crate::store::{location, ContainerConnector, StoreClient};
use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::{DynObjectStore, ObjectStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

type Containers = Arc<Mutex<HashMap<String, Arc<InMemory>>>>;

/// Builds clients over in-memory accounts shared by every client of the
/// same account.
#[derive(Debug, Default)]
pub struct MemoryClientFactory {
    accounts: Mutex<HashMap<String, Containers>>,
    constructions: AtomicUsize,
    failures: AtomicUsize,
}

impl MemoryClientFactory {
    /// Create a factory with no accounts
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times [`build_client`](ClientFactory::build_client) was called
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    /// Make the next `count` constructions fail
    pub fn fail_next_constructions(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Store of `container` in `account`, created on first use
    pub fn container(&self, account: &str, container: &str) -> Arc<InMemory> {
        let containers = self.account(account);
        let mut containers = containers.lock().unwrap_or_else(PoisonError::into_inner);
        containers
            .entry(container.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone()
    }

    /// Write `data` to `account/container/path` directly, bypassing clients.
    ///
    /// Must not be called from within an async runtime.
    pub fn put(
        &self,
        account: &str,
        container: &str,
        path: &str,
        data: impl Into<Bytes>,
    ) -> Result<(), TransportError> {
        let store = self.container(account, container);
        let location = location(path)?;
        let payload = data.into();
        get_runtime().block_on(async move {
            store.put(&location, payload.into()).await?;
            Ok(())
        })
    }

    fn account(&self, account: &str) -> Containers {
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        accounts.entry(account.to_string()).or_default().clone()
    }
}

#[derive(Debug)]
struct MemoryConnector {
    containers: Containers,
}

impl ContainerConnector for MemoryConnector {
    fn connect(&self, container: &str) -> Result<Arc<DynObjectStore>, TransportError> {
        let mut containers = self
            .containers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let store: Arc<DynObjectStore> = containers
            .entry(container.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone();
        Ok(store)
    }
}

impl ClientFactory for MemoryClientFactory {
    fn resolve_credential(&self) -> Result<Credential, TransportError> {
        Ok(Credential::Anonymous)
    }

    fn build_client(
        &self,
        account: &str,
        _account_url: &Url,
        _credential: Credential,
        options: &ClientOptions,
    ) -> Result<Arc<dyn BlobClient>, TransportError> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(TransportError::Credential(format!(
                "injected construction failure for {}",
                account
            )));
        }

        let connector = MemoryConnector {
            containers: self.account(account),
        };
        Ok(Arc::new(StoreClient::new(connector, options)))
    }
}
