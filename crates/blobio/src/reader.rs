//! Seekable buffered reads over a blob.

use crate::client::BlobClient;
use crate::range::download;
use crate::stat::stat;
use crate::{BlobAddress, BlobError, Context, Result};
use std::fmt;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::debug;

/// Buffer size used when a reader is opened with a size of 0 (8MB).
pub const DEFAULT_BUFFER_SIZE: usize = 1 << 23;

/// A reader over a blob implementing `std::io::Read` and `Seek`.
///
/// Sequential reads are served from a buffer filled by ranged downloads.
/// Seeking to a different offset drops the buffer, so it should not be
/// excessively large if a lot of seeking is intended.
pub struct BlobReader {
    ctx: Context,
    client: Arc<dyn BlobClient>,
    address: BlobAddress,
    /// Current position in the blob
    offset: u64,
    /// Total size of the blob
    size: u64,
    buffer_size: usize,
    /// Buffered source anchored at the offset current when it was created
    buffered: Option<BufReader<RangeSource>>,
}

/// Open a blob for buffered random access.
pub fn open_blob(ctx: &Context, address: &BlobAddress, buffer_size: usize) -> Result<BlobReader> {
    BlobReader::open(ctx, address, buffer_size)
}

impl BlobReader {
    /// Open `address`, fetching its size up front.
    ///
    /// A `buffer_size` of 0 selects [`DEFAULT_BUFFER_SIZE`].
    pub fn open(ctx: &Context, address: &BlobAddress, buffer_size: usize) -> Result<Self> {
        let client = ctx.client_cache().get_client(&address.account)?;
        let info = stat(ctx, address)?;
        debug!("Opened {} ({} bytes)", address, info.size);

        Ok(BlobReader {
            ctx: ctx.clone(),
            client,
            address: address.clone(),
            offset: 0,
            size: info.size,
            buffer_size: if buffer_size == 0 {
                DEFAULT_BUFFER_SIZE
            } else {
                buffer_size
            },
            buffered: None,
        })
    }

    /// Get the size of the blob
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the current position
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Get the address being read
    pub fn address(&self) -> &BlobAddress {
        &self.address
    }

    /// Whether a buffered source is currently active
    pub fn is_buffered(&self) -> bool {
        self.buffered.is_some()
    }

    fn open_buffer(&self) -> BufReader<RangeSource> {
        let source = RangeSource {
            ctx: self.ctx.clone(),
            client: self.client.clone(),
            address: self.address.clone(),
            offset: self.offset,
            size: self.size,
            pending: None,
        };
        BufReader::with_capacity(self.buffer_size, source)
    }
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.buffered.is_none() {
            self.buffered = Some(self.open_buffer());
        }
        let n = match self.buffered.as_mut() {
            Some(buffered) => buffered.read(buf)?,
            None => 0,
        };
        self.offset += n as u64;
        Ok(n)
    }
}

impl Seek for BlobReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::End(delta) => i128::from(self.size) + i128::from(delta),
            SeekFrom::Current(delta) => i128::from(self.offset) + i128::from(delta),
        };
        if target < 0 {
            return Err(BlobError::Seek {
                path: self.address.to_string(),
                offset: target,
            }
            .into());
        }

        // Clamped to the size, which fits in u64.
        let new_offset = target.min(i128::from(self.size)) as u64;
        if new_offset != self.offset {
            self.buffered = None;
            self.offset = new_offset;
        }
        Ok(self.offset)
    }

    fn stream_position(&mut self) -> std::io::Result<u64> {
        Ok(self.offset)
    }
}

impl fmt::Debug for BlobReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobReader")
            .field("address", &self.address)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("buffer_size", &self.buffer_size)
            .field("buffered", &self.buffered.is_some())
            .finish()
    }
}

/// Unbuffered reads of consecutive ranges, starting at a fixed offset.
struct RangeSource {
    ctx: Context,
    client: Arc<dyn BlobClient>,
    address: BlobAddress,
    offset: u64,
    size: u64,
    /// Failure held back so the bytes delivered before it are returned first
    pending: Option<BlobError>,
}

impl Read for RangeSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if let Some(err) = self.pending.take() {
            return Err(err.into());
        }
        if self.offset >= self.size {
            return Ok(0);
        }

        let remaining = self.size - self.offset;
        let len = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        match download(
            &self.ctx,
            self.client.as_ref(),
            &self.address,
            self.offset,
            &mut buf[..len],
        ) {
            Ok(n) => {
                self.offset += n as u64;
                Ok(n)
            }
            Err(BlobError::RangeRead {
                path,
                bytes_read,
                source,
            }) if bytes_read > 0 => {
                self.offset += bytes_read as u64;
                self.pending = Some(BlobError::RangeRead {
                    path,
                    bytes_read: 0,
                    source,
                });
                Ok(bytes_read)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientOptions;
    use crate::memory::MemoryClientFactory;
    use crate::ClientCache;

    fn setup(data: &[u8]) -> (Context, BlobAddress) {
        let factory = Arc::new(MemoryClientFactory::new());
        factory.put("acct", "cont", "blob.bin", data.to_vec()).unwrap();
        let cache = Arc::new(ClientCache::new(factory, ClientOptions::default()));
        let ctx = Context::background().with_client_cache(cache);
        (ctx, BlobAddress::parse("az://acct/cont/blob.bin").unwrap())
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_sequential_read() {
        let data = pattern(1000);
        let (ctx, addr) = setup(&data);
        let mut reader = open_blob(&ctx, &addr, 64).unwrap();
        assert_eq!(reader.size(), 1000);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(reader.position(), 1000);
    }

    #[test]
    fn test_negative_seek_keeps_position() {
        let (ctx, addr) = setup(&pattern(100));
        let mut reader = open_blob(&ctx, &addr, 0).unwrap();
        reader.seek(SeekFrom::Start(40)).unwrap();

        let err = reader.seek(SeekFrom::Current(-41)).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        assert_eq!(reader.position(), 40);

        assert!(reader.seek(SeekFrom::End(-101)).is_err());
        assert_eq!(reader.position(), 40);
    }

    #[test]
    fn test_seek_past_end_clamps() {
        let (ctx, addr) = setup(&pattern(100));
        let mut reader = open_blob(&ctx, &addr, 0).unwrap();
        assert_eq!(reader.seek(SeekFrom::Start(500)).unwrap(), 100);
        assert_eq!(reader.seek(SeekFrom::End(10)).unwrap(), 100);
        assert_eq!(reader.seek(SeekFrom::Current(1)).unwrap(), 100);

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_seek_drops_buffer_only_when_moving() {
        let data = pattern(300);
        let (ctx, addr) = setup(&data);
        let mut reader = open_blob(&ctx, &addr, 128).unwrap();

        let mut buf = [0u8; 10];
        reader.read_exact(&mut buf).unwrap();
        assert!(reader.is_buffered());

        reader.seek(SeekFrom::Current(0)).unwrap();
        assert!(reader.is_buffered());

        reader.seek(SeekFrom::Start(200)).unwrap();
        assert!(!reader.is_buffered());
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, &data[200..210]);
    }
}
