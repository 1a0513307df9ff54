//! Blob metadata through prefix listings.

use crate::{BlobAddress, BlobError, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Size, kind and modification time of a blob or blob prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    /// Final segment of the address
    pub name: String,
    /// Content length in bytes, 0 for prefixes
    pub size: u64,
    /// Whether the address only names a prefix of other blobs
    pub is_dir: bool,
    /// Last modification time, `None` for prefixes
    pub last_modified: Option<DateTime<Utc>>,
}

/// Returns information about the blob or prefix at `address`.
///
/// Only the first listed entry is inspected. If its name equals the path the
/// address is a blob; any other entry means the address is a prefix. A
/// prefix whose first child is named exactly like the prefix is therefore
/// reported as a blob.
pub fn stat(ctx: &Context, address: &BlobAddress) -> Result<ObjectInfo> {
    let client = ctx.client_cache().get_client(&address.account)?;

    let mut marker: Option<String> = None;
    loop {
        let page = ctx
            .block_on(client.list_blobs(&address.container, &address.path, marker.as_deref()))
            .map_err(|source| BlobError::Stat {
                path: address.to_string(),
                source,
            })?;

        if let Some(entry) = page.entries.first() {
            if entry.name == address.path {
                return Ok(ObjectInfo {
                    name: address.base().to_string(),
                    size: entry.size,
                    is_dir: false,
                    last_modified: Some(entry.last_modified),
                });
            }
            // Some blob lives under this prefix.
            return Ok(ObjectInfo {
                name: address.base().to_string(),
                size: 0,
                is_dir: true,
                last_modified: None,
            });
        }

        match page.next_marker {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    Err(BlobError::NotFound {
        path: address.to_string(),
    })
}
