//! Ranged and whole-blob reads.

use crate::client::BlobClient;
use crate::stat::stat;
use crate::{BlobAddress, BlobError, Context, Result};
use tracing::trace;

/// Read a range of bytes starting at `start` into `out`.
///
/// May return fewer bytes than `out.len()` when the range runs past the end
/// of the blob.
pub fn read_range(
    ctx: &Context,
    address: &BlobAddress,
    start: u64,
    out: &mut [u8],
) -> Result<usize> {
    if out.is_empty() {
        return Ok(0);
    }
    let client = ctx.client_cache().get_client(&address.account)?;
    download(ctx, client.as_ref(), address, start, out)
}

/// One logical ranged download through an already resolved client.
pub(crate) fn download(
    ctx: &Context,
    client: &dyn BlobClient,
    address: &BlobAddress,
    start: u64,
    out: &mut [u8],
) -> Result<usize> {
    if out.is_empty() {
        return Ok(0);
    }
    let workers = ctx.concurrency().worker_count(out.len() as u64);
    trace!(
        "Reading {} bytes at offset {} from {} ({} workers)",
        out.len(),
        start,
        address,
        workers
    );

    ctx.block_on(client.download_range(&address.container, &address.path, start, out, workers))
        .map_err(|e| BlobError::RangeRead {
            path: address.to_string(),
            bytes_read: e.bytes_read,
            source: e.source,
        })
}

/// Read an entire blob into memory.
pub fn read_blob(ctx: &Context, address: &BlobAddress) -> Result<Vec<u8>> {
    let info = stat(ctx, address)?;
    let size = usize::try_from(info.size).map_err(|_| BlobError::TooLarge {
        path: address.to_string(),
        size: info.size,
    })?;

    let mut results = vec![0u8; size];
    let n = read_range(ctx, address, 0, &mut results)?;
    if n != size {
        return Err(BlobError::ShortRead {
            path: address.to_string(),
            expected: info.size,
            actual: n,
        });
    }
    Ok(results)
}
