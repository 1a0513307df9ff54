use thiserror::Error;

/// Failure reported by a storage transport: credential resolution, client
/// construction, listing, download or upload.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The underlying object store rejected or failed the request
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// No usable credential could be resolved for the ambient identity
    #[error("credential error: {0}")]
    Credential(String),

    /// Reading the upload source or another local I/O step failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The call was canceled through its context
    #[error("operation canceled")]
    Cancelled,

    /// The context deadline elapsed before the call finished
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Any other transport failure
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether the transport reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TransportError::ObjectStore(object_store::Error::NotFound { .. })
        )
    }
}

/// A ranged download that failed after writing `bytes_read` bytes into the
/// caller's buffer.
#[derive(Error, Debug)]
#[error("{source} (after {bytes_read} bytes)")]
pub struct PartialDownload {
    /// Contiguous bytes already written at the start of the output buffer
    pub bytes_read: usize,
    /// Why the download stopped
    #[source]
    pub source: TransportError,
}

impl From<TransportError> for PartialDownload {
    fn from(source: TransportError) -> Self {
        PartialDownload {
            bytes_read: 0,
            source,
        }
    }
}

impl From<object_store::Error> for PartialDownload {
    fn from(err: object_store::Error) -> Self {
        TransportError::from(err).into()
    }
}

/// Errors returned by every public blob operation.
///
/// Each variant names the operation and the address it failed on.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum BlobError {
    /// The location string matched neither accepted address form
    #[error("invalid blob path: \"{0}\"")]
    Parse(String),

    /// Credential resolution or client construction failed
    #[error("create blob client for account: {account}: {source}")]
    ClientCreation {
        account: String,
        #[source]
        source: TransportError,
    },

    /// Listing found nothing at or under the address
    #[error("could not find stats for {path}: not found")]
    NotFound { path: String },

    /// The listing request failed
    #[error("stat {path}: {source}")]
    Stat {
        path: String,
        #[source]
        source: TransportError,
    },

    /// A ranged download failed
    #[error("read blob {path}: {source}")]
    RangeRead {
        path: String,
        bytes_read: usize,
        #[source]
        source: TransportError,
    },

    /// The streaming upload failed
    #[error("write blob {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: TransportError,
    },

    /// A seek resolved to a position before the start of the blob
    #[error("seek blob {path}: offset {offset} is before the beginning of the blob")]
    Seek { path: String, offset: i128 },

    /// A whole-blob read delivered fewer bytes than the blob size
    #[error("read blob {path}: unexpected EOF after {actual} of {expected} bytes")]
    ShortRead {
        path: String,
        expected: u64,
        actual: usize,
    },

    /// The blob cannot be held in memory on this architecture
    #[error("read blob {path}: size {size} not fit for this machine architecture")]
    TooLarge { path: String, size: u64 },

    /// A concurrency policy with a zero threshold or worker count
    #[error("invalid concurrency policy: {0}")]
    InvalidPolicy(String),

    /// Configuration file or override error
    #[error("configuration error: {0}")]
    Config(String),

    /// Local I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlobError {
    /// Whether this error means the blob or prefix does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            BlobError::NotFound { .. } => true,
            BlobError::RangeRead { source, .. } | BlobError::Stat { source, .. } => {
                source.is_not_found()
            }
            _ => false,
        }
    }

    fn transport(&self) -> Option<&TransportError> {
        match self {
            BlobError::ClientCreation { source, .. }
            | BlobError::Stat { source, .. }
            | BlobError::RangeRead { source, .. }
            | BlobError::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for blob operations
pub type Result<T> = std::result::Result<T, BlobError>;

impl From<BlobError> for std::io::Error {
    fn from(err: BlobError) -> Self {
        use std::io::ErrorKind;

        let kind = if err.is_not_found() {
            ErrorKind::NotFound
        } else {
            match (&err, err.transport()) {
                (BlobError::Io(io_err), _) => io_err.kind(),
                (BlobError::Parse(_) | BlobError::Seek { .. } | BlobError::InvalidPolicy(_), _) => {
                    ErrorKind::InvalidInput
                }
                (BlobError::ShortRead { .. }, _) => ErrorKind::UnexpectedEof,
                (_, Some(TransportError::DeadlineExceeded)) => ErrorKind::TimedOut,
                _ => ErrorKind::Other,
            }
        };
        std::io::Error::new(kind, err)
    }
}
