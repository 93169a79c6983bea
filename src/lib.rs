//! A dual-backend object storage façade.
//!
//! `dualstore` presents one storage interface backed by two independent remote
//! object stores with configurable read and write priority ordering.  Reads go
//! to the primary backend and fail over to the secondary on `NotFound` or
//! transport errors; writes replicate to every configured write target.
//!
//! The façade is [`DualStorage`]; the backend contract is the [`Storage`]
//! trait, implemented by the [`adapters`] (S3, GCS, in-memory).
//!
//! ```no_run
//! # #[cfg(feature = "memory")]
//! # async fn example() -> dualstore::Result<()> {
//! use dualstore::{Backend, BackendKey, DualStorage, MemoryStorage, Storage, StorageExt};
//! use bytes::Bytes;
//!
//! let store = DualStorage::builder()
//!     .backend(BackendKey::S3, Backend::Memory(MemoryStorage::new()))
//!     .backend(BackendKey::Gcs, Backend::Memory(MemoryStorage::new()))
//!     .read_order([BackendKey::S3, BackendKey::Gcs])
//!     .write_order([BackendKey::S3, BackendKey::Gcs])
//!     .build()?;
//!
//! store.save("greeting.txt", Bytes::from_static(b"hello")).await?;
//! let content = store.get_bytes("greeting.txt").await?;
//! assert_eq!(&content[..], b"hello");
//! # Ok(())
//! # }
//! ```

use std::fmt::Debug;

use bytes::Bytes;

#[cfg(not(any(feature = "memory", feature = "s3", feature = "gcs")))]
compile_error!("dualstore requires at least one backend feature: memory, s3, or gcs");

pub use adapters::dual::{Backend, BackendKey, DualStorage, DualStorageBuilder, PriorityList};
#[cfg(feature = "gcs")]
pub use adapters::gcs::{GcsOptions, GcsStorage, TokenProvider};
#[cfg(feature = "memory")]
pub use adapters::memory::{Fault, MemoryStorage};
#[cfg(feature = "s3")]
pub use adapters::s3::{S3Options, S3Storage};
#[cfg(all(feature = "s3", feature = "gcs"))]
pub use config::DualConfig;
pub use object::ObjectStream;

/// A specialized Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A unified Error type for storage operations.
///
/// This is a closed taxonomy: failover decisions in [`DualStorage`] are driven
/// only by [`is_backend_failure`](Error::is_backend_failure); every other
/// variant propagates unwrapped so misconfiguration and caller misuse are
/// never misread as "try the fallback".
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid priority lists or missing backend mapping. Fatal at
    /// construction, never recovered.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Empty or malformed object name. Caller misuse; never failover-eligible.
    #[error("Invalid object name: {0:?}")]
    InvalidName(String),

    /// Object absent from a specific backend. Failover-eligible on read.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Network, authentication, or quota failure from a backend client.
    /// Failover-eligible on read; aborts the call on write.
    #[error("Backend transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// All eligible backends exhausted for a read, or a required write failed.
    /// Wraps the last backend error for diagnostics.
    #[error("Storage unavailable for {name:?}")]
    StorageUnavailable {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// Operation deliberately unsupported by the façade.
    #[error("Operation not supported: {0}")]
    NotImplemented(&'static str),
}

impl Error {
    /// True for the error classes that drive read failover and write aborts:
    /// [`NotFound`](Error::NotFound) and [`Transport`](Error::Transport).
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Transport { .. })
    }

    /// A transport error wrapping an underlying client error.
    pub fn transport<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// A transport error with no underlying error object (e.g. an HTTP status
    /// whose body has already been consumed into the context message).
    pub fn transport_msg(context: impl Into<String>) -> Self {
        Error::Transport {
            context: context.into(),
            source: None,
        }
    }
}

/// Object names must be non-empty. Shared by the façade and the adapters.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

mod object;

#[cfg(all(feature = "s3", feature = "gcs"))]
pub mod config;

/// Adapter modules, gated behind Cargo features.
pub mod adapters {
    pub mod dual;
    #[cfg(feature = "gcs")]
    pub mod gcs;
    #[cfg(feature = "memory")]
    pub mod memory;
    #[cfg(feature = "s3")]
    pub mod s3;
}

/// The core storage trait.
///
/// Each backend exposes the same four operations over path-like object names.
/// Content flows out as an [`ObjectStream`] and in as a fully materialized
/// [`Bytes`] value; the façade does not stream writes incrementally across
/// backends.
///
/// ## Failure classification
/// Implementations must classify failures using the closed [`Error`] taxonomy:
/// an absent object is [`Error::NotFound`]; network, authentication, and quota
/// failures are [`Error::Transport`]. [`DualStorage`] relies on this
/// classification for its failover decisions.
pub trait Storage: Send + Sync + Debug {
    /// Open an object for reading.
    ///
    /// The returned stream may be lazy; callers that need the object proven
    /// retrievable before use should call [`ObjectStream::probe`].
    fn open(&self, name: &str) -> impl std::future::Future<Output = Result<ObjectStream>> + Send;

    /// Store an object, overwriting any existing content under `name`.
    ///
    /// Returns the name the backend reports for the stored object, which may
    /// be a normalized form of the input.
    fn save(
        &self,
        name: &str,
        content: Bytes,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Check whether an object exists.
    fn exists(&self, name: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Delete an object. Idempotent (returns `Ok(())` if already absent).
    fn delete(&self, name: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Convenience methods built on [`Storage`].
pub trait StorageExt: Storage {
    /// Open an object and collect its full content into one [`Bytes`].
    fn get_bytes(&self, name: &str) -> impl std::future::Future<Output = Result<Bytes>> + Send {
        async move {
            let stream = self.open(name).await?;
            stream.bytes().await
        }
    }
}

impl<T: Storage + ?Sized> StorageExt for T {}
