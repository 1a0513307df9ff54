//! # blobio
//!
//! Random-access I/O for Azure Blob Storage. This crate provides synchronous `Read` and `Seek`
//! access to blobs, parallel ranged reads and streaming uploads, addressed by
//! `az://account/container/path` strings.
//!
//! ## Architecture
//!
//! The main abstractions are:
//! - `BlobAddress`: parsed account, container and path of a blob
//! - `ClientCache`: one authenticated client per storage account, created on first use
//! - `BlobReader`: implements `std::io::Read` and `std::io::Seek` over a blob
//! - `read_range`, `read_blob`, `stat`, `write_blob`: one-shot operations
//!
//! Every operation takes a `Context` selecting the client cache, the concurrency policy and an
//! optional deadline or cancel token. Transport calls go through the async `object_store` API,
//! driven by an internal Tokio runtime.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod address;
mod azure;
mod cache;
mod client;
mod concurrency;
mod config;
mod context;
mod error;
pub mod memory;
mod range;
mod reader;
mod runtime;
mod stat;
pub mod store;
mod writer;

pub use address::{BlobAddress, SCHEME, STORAGE_DOMAIN};
pub use azure::AzureClientFactory;
pub use cache::ClientCache;
pub use client::{
    BlobClient, BlobEntry, ClientFactory, ClientOptions, Credential, ListPage, DEFAULT_MAX_RETRIES,
};
pub use concurrency::{ConcurrencyPolicy, DEFAULT_MAX_WORKERS, DEFAULT_MIN_BYTES_PER_WORKER};
pub use config::{parse_size, ClientConfig, Config, TransferConfig};
pub use context::{CancelToken, Context};
pub use error::{BlobError, PartialDownload, Result, TransportError};
pub use range::{read_blob, read_range};
pub use reader::{open_blob, BlobReader, DEFAULT_BUFFER_SIZE};
pub use stat::{stat, ObjectInfo};
pub use writer::write_blob;
