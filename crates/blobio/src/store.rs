//! [`BlobClient`] on top of `object_store`.
//!
//! An `ObjectStore` is scoped to a single container, so [`StoreClient`] keeps
//! one store per container and opens new ones through a
//! [`ContainerConnector`].

use crate::client::{BlobClient, BlobEntry, ClientOptions, ListPage};
use crate::error::{PartialDownload, TransportError};
use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::{DynObjectStore, ObjectMeta, WriteMultipart};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Maximum number of entries per listing page.
pub const LIST_PAGE_SIZE: usize = 5000;

/// Opens the object store of one container.
pub trait ContainerConnector: Send + Sync + fmt::Debug {
    /// Open a store for `container`.
    fn connect(&self, container: &str) -> Result<Arc<DynObjectStore>, TransportError>;
}

/// A blob client for one account, backed by per-container object stores.
#[derive(Debug)]
pub struct StoreClient<C> {
    connector: C,
    containers: Mutex<HashMap<String, Arc<DynObjectStore>>>,
    upload_chunk_size: usize,
    upload_concurrency: usize,
}

impl<C: ContainerConnector> StoreClient<C> {
    /// Create a client that opens containers through `connector`.
    pub fn new(connector: C, options: &ClientOptions) -> Self {
        Self {
            connector,
            containers: Mutex::new(HashMap::new()),
            upload_chunk_size: options.upload_chunk_size.max(1),
            upload_concurrency: options.upload_concurrency.max(1),
        }
    }

    fn store(&self, container: &str) -> Result<Arc<DynObjectStore>, TransportError> {
        let mut containers = self
            .containers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = containers.get(container) {
            return Ok(store.clone());
        }
        let store = self.connector.connect(container)?;
        containers.insert(container.to_string(), store.clone());
        Ok(store)
    }
}

impl From<ObjectMeta> for BlobEntry {
    fn from(meta: ObjectMeta) -> Self {
        BlobEntry {
            name: meta.location.to_string(),
            size: meta.size as u64,
            last_modified: meta.last_modified,
        }
    }
}

/// Location of the blob named `name`, kept byte-for-byte.
///
/// Names with empty or relative segments (`a//b`, `./a`) cannot be
/// represented and are rejected instead of being rewritten.
pub(crate) fn location(name: &str) -> Result<Path, TransportError> {
    Path::parse(name).map_err(|e| TransportError::ObjectStore(e.into()))
}

/// Directory to list recursively so that every name starting with `prefix`
/// is visited.
fn list_root(prefix: &str) -> Result<Option<Path>, TransportError> {
    match prefix.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => location(dir).map(Some),
        _ => Ok(None),
    }
}

/// Collect up to `limit` entries starting with `prefix` from a listing in
/// lexicographic order. Returns whether more matching entries follow.
///
/// Matching names are contiguous in such a listing, so the stream is not
/// polled past the first name that sorts after all of them.
async fn collect_page<S>(
    mut listing: S,
    prefix: &str,
    limit: usize,
) -> Result<(Vec<BlobEntry>, bool), TransportError>
where
    S: Stream<Item = object_store::Result<ObjectMeta>> + Unpin,
{
    let mut entries = Vec::new();
    while let Some(meta) = listing.try_next().await? {
        let entry = BlobEntry::from(meta);
        if entry.name.starts_with(prefix) {
            if entries.len() == limit {
                return Ok((entries, true));
            }
            entries.push(entry);
        } else if entry.name.as_str() > prefix {
            break;
        }
    }
    Ok((entries, false))
}

/// Fill `buf` from `source` until it is full or the source ends.
fn read_chunk(source: &mut (dyn Read + Send), buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[async_trait]
impl<C: ContainerConnector> BlobClient for StoreClient<C> {
    async fn list_blobs(
        &self,
        container: &str,
        prefix: &str,
        marker: Option<&str>,
    ) -> Result<ListPage, TransportError> {
        let store = self.store(container)?;
        let root = list_root(prefix)?;

        // Object store listings match whole path segments; blob listings
        // match raw name prefixes, so scan the enclosing directory.
        let listing = match marker {
            Some(marker) => store.list_with_offset(root.as_ref(), &location(marker)?),
            None => store.list(root.as_ref()),
        };
        let (entries, more) = collect_page(listing, prefix, LIST_PAGE_SIZE).await?;
        let next_marker = if more {
            entries.last().map(|e| e.name.clone())
        } else {
            None
        };
        trace!(
            "Listed {} entries under {}/{}",
            entries.len(),
            container,
            prefix
        );
        Ok(ListPage {
            entries,
            next_marker,
        })
    }

    async fn download_range(
        &self,
        container: &str,
        path: &str,
        offset: u64,
        out: &mut [u8],
        concurrency: u16,
    ) -> Result<usize, PartialDownload> {
        if out.is_empty() {
            return Ok(0);
        }
        let store = self.store(container)?;
        let location = location(path)?;

        let size = store.head(&location).await?.size as u64;
        if offset >= size {
            return Ok(0);
        }
        let len = out.len().min((size - offset) as usize);
        let start = usize::try_from(offset)
            .map_err(|_| TransportError::Other(format!("offset {} out of range", offset)))?;
        let workers = usize::from(concurrency.max(1));
        let chunk_len = len.div_ceil(workers);

        trace!(
            "Downloading {}/{} range {:?} with {} workers",
            container,
            path,
            start..start + len,
            workers
        );

        let store = &store;
        let location = &location;
        let fetches: Vec<_> = out[..len]
            .chunks_mut(chunk_len)
            .enumerate()
            .map(|(i, part)| async move {
                let part_start = start + i * chunk_len;
                let data = store
                    .get_range(location, part_start..part_start + part.len())
                    .await?;
                let n = data.len().min(part.len());
                part[..n].copy_from_slice(&data[..n]);
                Ok::<_, object_store::Error>((n, part.len()))
            })
            .collect();
        let mut parts = stream::iter(fetches).buffered(workers);

        // Parts complete in order, so the count is always a contiguous prefix.
        let mut bytes_read = 0;
        while let Some(part) = parts.next().await {
            match part {
                Ok((n, wanted)) => {
                    bytes_read += n;
                    if n < wanted {
                        break;
                    }
                }
                Err(e) => {
                    return Err(PartialDownload {
                        bytes_read,
                        source: e.into(),
                    })
                }
            }
        }
        Ok(bytes_read)
    }

    async fn upload_stream(
        &self,
        container: &str,
        path: &str,
        source: &mut (dyn Read + Send),
    ) -> Result<u64, TransportError> {
        let store = self.store(container)?;
        let location = location(path)?;
        let mut chunk = vec![0u8; self.upload_chunk_size];

        let first = read_chunk(source, &mut chunk)?;
        if first < chunk.len() {
            debug!("Uploading {} bytes to {}/{}", first, container, path);
            chunk.truncate(first);
            store.put(&location, chunk.into()).await?;
            return Ok(first as u64);
        }

        debug!("Starting multipart upload for {}/{}", container, path);
        let upload = store.put_multipart(&location).await?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.upload_chunk_size);
        writer.write(&chunk);
        let mut total = first as u64;

        loop {
            let n = match read_chunk(source, &mut chunk) {
                Ok(n) => n,
                Err(e) => {
                    writer.abort().await?;
                    return Err(e.into());
                }
            };
            if n == 0 {
                break;
            }
            writer.wait_for_capacity(self.upload_concurrency).await?;
            writer.write(&chunk[..n]);
            total += n as u64;
        }

        writer.finish().await?;
        debug!(
            "Completed multipart upload of {} bytes to {}/{}",
            total, container, path
        );
        Ok(total)
    }
}
