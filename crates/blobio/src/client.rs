//! Capabilities consumed from a blob storage transport.
//!
//! The core only talks to storage through [`BlobClient`] and builds clients
//! through [`ClientFactory`]. [`AzureClientFactory`](crate::AzureClientFactory)
//! targets real storage accounts and
//! [`MemoryClientFactory`](crate::memory::MemoryClientFactory) keeps
//! everything in process.

use crate::error::{PartialDownload, TransportError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default number of retries a client performs per request.
pub const DEFAULT_MAX_RETRIES: usize = 50;

/// One blob returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Full blob name within the container
    pub name: String,
    /// Content length in bytes
    pub size: u64,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
}

/// One page of a prefix listing, in lexicographic name order.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Entries on this page
    pub entries: Vec<BlobEntry>,
    /// Continuation marker for the next page, `None` on the last page
    pub next_marker: Option<String>,
}

/// An authenticated handle to one storage account.
#[async_trait]
pub trait BlobClient: Send + Sync + fmt::Debug {
    /// List blobs of `container` whose names start with `prefix`.
    ///
    /// `marker` is the `next_marker` of the previous page.
    async fn list_blobs(
        &self,
        container: &str,
        prefix: &str,
        marker: Option<&str>,
    ) -> Result<ListPage, TransportError>;

    /// Download up to `out.len()` bytes starting at `offset` using at most
    /// `concurrency` parallel requests.
    ///
    /// Returns fewer bytes than requested when the blob ends first, and 0
    /// when `offset` is at or past the end.
    async fn download_range(
        &self,
        container: &str,
        path: &str,
        offset: u64,
        out: &mut [u8],
        concurrency: u16,
    ) -> Result<usize, PartialDownload>;

    /// Replace the content of `path` with everything read from `source`.
    ///
    /// Returns the number of bytes uploaded.
    async fn upload_stream(
        &self,
        container: &str,
        path: &str,
        source: &mut (dyn Read + Send),
    ) -> Result<u64, TransportError>;
}

/// How a client authenticates against a storage account.
///
/// [`Credential::Ambient`] defers to whatever the environment configures.
/// The other variants are explicit overrides.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credential {
    /// Sources configured in the environment: account key, SAS token,
    /// service principal, workload identity, Azure CLI, storage emulator,
    /// falling back to the managed identity of the host
    #[default]
    Ambient,
    /// Shared account key
    AccessKey(String),
    /// Shared access signature, as decoded query pairs
    SasToken(Vec<(String, String)>),
    /// Service principal with a client secret
    ClientSecret {
        client_id: String,
        client_secret: String,
        tenant_id: String,
    },
    /// Pre-acquired OAuth bearer token
    BearerToken(String),
    /// Tokens fetched through the Azure CLI
    AzureCli,
    /// No signature at all, for public containers
    Anonymous,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secrets.
        let name = match self {
            Credential::Ambient => "Ambient",
            Credential::AccessKey(_) => "AccessKey",
            Credential::SasToken(_) => "SasToken",
            Credential::ClientSecret { .. } => "ClientSecret",
            Credential::BearerToken(_) => "BearerToken",
            Credential::AzureCli => "AzureCli",
            Credential::Anonymous => "Anonymous",
        };
        f.write_str(name)
    }
}

impl Credential {
    /// Build a SAS credential from a token query string, with or without
    /// the leading `?`.
    pub fn sas_token(token: &str) -> Result<Self, TransportError> {
        let query = token.trim().trim_start_matches('?');
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        if pairs.is_empty() {
            return Err(TransportError::Credential(
                "SAS token holds no query parameters".to_string(),
            ));
        }
        Ok(Credential::SasToken(pairs))
    }
}

/// Options applied to every client a cache constructs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Retries per request before giving up
    pub max_retries: usize,
    /// Upper bound on the total time spent retrying one request
    pub retry_timeout: Duration,
    /// Size of each uploaded part; sources shorter than this use a single put
    pub upload_chunk_size: usize,
    /// Maximum number of parts uploaded concurrently
    pub upload_concurrency: usize,
    /// Alternative endpoint, e.g. a local storage emulator
    pub endpoint: Option<String>,
    /// Allow plain HTTP endpoints
    pub allow_http: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_timeout: Duration::from_secs(180),
            upload_chunk_size: 8 * 1024 * 1024, // 8MB
            upload_concurrency: 4,
            endpoint: None,
            allow_http: false,
        }
    }
}

/// Resolves credentials and constructs authenticated clients.
pub trait ClientFactory: Send + Sync + fmt::Debug {
    /// Produce a credential for the ambient identity.
    fn resolve_credential(&self) -> Result<Credential, TransportError>;

    /// Construct a client for `account` reachable at `account_url`.
    fn build_client(
        &self,
        account: &str,
        account_url: &Url,
        credential: Credential,
        options: &ClientOptions,
    ) -> Result<Arc<dyn BlobClient>, TransportError>;
}
