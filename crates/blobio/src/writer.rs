//! Streaming uploads

use crate::{BlobAddress, BlobError, Context, Result};
use std::io::Read;
use tracing::debug;

/// Upload everything `source` yields to `address`, replacing any existing
/// blob. Returns the number of bytes written.
///
/// The source is consumed in chunks, so its full length need not be known
/// in advance. If the source or the upload fails no blob is committed.
pub fn write_blob(
    ctx: &Context,
    address: &BlobAddress,
    mut source: impl Read + Send,
) -> Result<u64> {
    let client = ctx.client_cache().get_client(&address.account)?;
    debug!("Uploading to {}", address);

    let written = ctx
        .block_on(client.upload_stream(&address.container, &address.path, &mut source))
        .map_err(|source| BlobError::Write {
            path: address.to_string(),
            source,
        })?;

    debug!("Uploaded {} bytes to {}", written, address);
    Ok(written)
}
