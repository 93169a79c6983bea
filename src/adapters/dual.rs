//! The dual-backend storage façade.
//!
//! [`DualStorage`] presents a single [`Storage`] interface over two
//! independently reachable backends. Reads follow a priority order with one
//! automatic failover on a backend failure; writes replicate to every
//! configured write target in order. There is no reconciliation between the
//! backends after a missed write and no repair of a backend that was down.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use bytes::Bytes;

use crate::{Error, ObjectStream, Result, Storage, validate_name};

#[cfg(feature = "gcs")]
use crate::adapters::gcs::GcsStorage;
#[cfg(feature = "memory")]
use crate::adapters::memory::MemoryStorage;
#[cfg(feature = "s3")]
use crate::adapters::s3::S3Storage;

/// Identifies one of the two configured stores.
///
/// The key set is closed: the façade coordinates exactly two remote stores and
/// offers no open-ended plugin mechanism. Keys deserialize from their
/// lowercase names (`"s3"`, `"gcs"`).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKey {
    S3 = 0,
    Gcs = 1,
}

impl BackendKey {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => BackendKey::S3,
            _ => BackendKey::Gcs,
        }
    }
}

impl fmt::Display for BackendKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKey::S3 => f.write_str("s3"),
            BackendKey::Gcs => f.write_str("gcs"),
        }
    }
}

/// A concrete backend instance, dispatched behind the [`Storage`] trait.
#[derive(Debug)]
pub enum Backend {
    #[cfg(feature = "s3")]
    S3(S3Storage),
    #[cfg(feature = "gcs")]
    Gcs(GcsStorage),
    #[cfg(feature = "memory")]
    Memory(MemoryStorage),
}

#[cfg(feature = "s3")]
impl From<S3Storage> for Backend {
    fn from(storage: S3Storage) -> Self {
        Backend::S3(storage)
    }
}

#[cfg(feature = "gcs")]
impl From<GcsStorage> for Backend {
    fn from(storage: GcsStorage) -> Self {
        Backend::Gcs(storage)
    }
}

#[cfg(feature = "memory")]
impl From<MemoryStorage> for Backend {
    fn from(storage: MemoryStorage) -> Self {
        Backend::Memory(storage)
    }
}

impl Storage for Backend {
    async fn open(&self, name: &str) -> Result<ObjectStream> {
        match self {
            #[cfg(feature = "s3")]
            Backend::S3(s) => s.open(name).await,
            #[cfg(feature = "gcs")]
            Backend::Gcs(s) => s.open(name).await,
            #[cfg(feature = "memory")]
            Backend::Memory(s) => s.open(name).await,
        }
    }

    async fn save(&self, name: &str, content: Bytes) -> Result<String> {
        match self {
            #[cfg(feature = "s3")]
            Backend::S3(s) => s.save(name, content).await,
            #[cfg(feature = "gcs")]
            Backend::Gcs(s) => s.save(name, content).await,
            #[cfg(feature = "memory")]
            Backend::Memory(s) => s.save(name, content).await,
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        match self {
            #[cfg(feature = "s3")]
            Backend::S3(s) => s.exists(name).await,
            #[cfg(feature = "gcs")]
            Backend::Gcs(s) => s.exists(name).await,
            #[cfg(feature = "memory")]
            Backend::Memory(s) => s.exists(name).await,
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        match self {
            #[cfg(feature = "s3")]
            Backend::S3(s) => s.delete(name).await,
            #[cfg(feature = "gcs")]
            Backend::Gcs(s) => s.delete(name).await,
            #[cfg(feature = "memory")]
            Backend::Memory(s) => s.delete(name).await,
        }
    }
}

/// An ordered sequence of one or two distinct backend keys.
///
/// Position 0 is the primary; position 1, if present, is the secondary.
/// Built and validated once at configuration time, immutable thereafter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriorityList {
    primary: BackendKey,
    secondary: Option<BackendKey>,
}

impl PriorityList {
    /// Validate a key sequence: non-empty, no duplicates, at most two entries.
    pub fn new(keys: &[BackendKey]) -> Result<Self> {
        match keys {
            [] => Err(Error::Configuration(
                "priority list must name at least one backend".to_string(),
            )),
            [primary] => Ok(Self {
                primary: *primary,
                secondary: None,
            }),
            [primary, secondary] if primary == secondary => Err(Error::Configuration(format!(
                "priority list repeats backend {primary}"
            ))),
            [primary, secondary] => Ok(Self {
                primary: *primary,
                secondary: Some(*secondary),
            }),
            _ => Err(Error::Configuration(format!(
                "priority list has {} entries, at most 2 are supported",
                keys.len()
            ))),
        }
    }

    pub fn primary(&self) -> BackendKey {
        self.primary
    }

    pub fn secondary(&self) -> Option<BackendKey> {
        self.secondary
    }

    fn keys(&self) -> impl Iterator<Item = BackendKey> {
        [Some(self.primary), self.secondary].into_iter().flatten()
    }
}

/// A storage façade over two prioritized backends.
///
/// Reads go to `read_order`'s primary and fail over once to the secondary on a
/// backend failure; every `open` starts from the primary again (no sticky
/// failover). Writes go to every backend in `write_order`, in order, and any
/// failure surfaces as an error with no rollback of completed writes.
///
/// `delete` is deliberately unsupported: deleting from only one backend would
/// desynchronize replicas.
#[derive(Debug)]
pub struct DualStorage {
    backends: HashMap<BackendKey, Backend>,
    read_order: PriorityList,
    write_order: PriorityList,
    /// Best-effort record of the backend that served the most recent
    /// successful `open`; consulted by `exists`, carries no correctness
    /// weight.
    last_read: AtomicU8,
}

impl DualStorage {
    /// Create a builder that assembles backends and priority orders explicitly.
    pub fn builder() -> DualStorageBuilder {
        DualStorageBuilder::default()
    }

    /// Construct the façade from a full configuration, building both backend
    /// clients eagerly.
    #[cfg(all(feature = "s3", feature = "gcs"))]
    pub async fn new(config: crate::config::DualConfig) -> Result<Self> {
        let mut backends = HashMap::new();
        if let Some(options) = &config.s3 {
            let storage = S3Storage::from_options(options).await?;
            backends.insert(BackendKey::S3, Backend::S3(storage));
        }
        if let Some(options) = &config.gcs {
            let storage = GcsStorage::from_options(options)?;
            backends.insert(BackendKey::Gcs, Backend::Gcs(storage));
        }

        let read_order = PriorityList::new(&config.read_order)?;
        let write_order = PriorityList::new(&config.write_order)?;
        Self::from_parts(backends, read_order, write_order)
    }

    fn from_parts(
        backends: HashMap<BackendKey, Backend>,
        read_order: PriorityList,
        write_order: PriorityList,
    ) -> Result<Self> {
        for key in read_order.keys().chain(write_order.keys()) {
            if !backends.contains_key(&key) {
                return Err(Error::Configuration(format!(
                    "priority list references backend {key} with no configured instance"
                )));
            }
        }

        let last_read = AtomicU8::new(read_order.primary() as u8);
        Ok(Self {
            backends,
            read_order,
            write_order,
            last_read,
        })
    }

    pub fn read_order(&self) -> &PriorityList {
        &self.read_order
    }

    pub fn write_order(&self) -> &PriorityList {
        &self.write_order
    }

    fn backend(&self, key: BackendKey) -> &Backend {
        self.backends
            .get(&key)
            .expect("priority lists are validated against backends at construction")
    }

    /// Open against one backend and probe the handle so lazy failures surface
    /// before the failover decision is made.
    async fn try_open(&self, key: BackendKey, name: &str) -> Result<ObjectStream> {
        let mut stream = self.backend(key).open(name).await?;
        stream.probe().await?;
        Ok(stream)
    }

    async fn save_to(&self, key: BackendKey, name: &str, content: Bytes) -> Result<String> {
        match self.backend(key).save(name, content).await {
            Ok(saved) => Ok(saved),
            Err(e) if e.is_backend_failure() => {
                tracing::error!(name, backend = %key, error = %e, "write failed");
                Err(Error::StorageUnavailable {
                    name: name.to_string(),
                    source: Box::new(e),
                })
            }
            Err(other) => Err(other),
        }
    }
}

impl Storage for DualStorage {
    /// Open an object, serving from the read primary and failing over at most
    /// once to the secondary.
    ///
    /// The active backend is a call-local value: concurrent `open` calls never
    /// observe each other's failover choice, and every call retries the
    /// primary first.
    async fn open(&self, name: &str) -> Result<ObjectStream> {
        validate_name(name)?;

        let primary = self.read_order.primary();
        let primary_err = match self.try_open(primary, name).await {
            Ok(stream) => {
                self.last_read.store(primary as u8, Ordering::Relaxed);
                return Ok(stream);
            }
            Err(e) if e.is_backend_failure() => e,
            Err(other) => return Err(other),
        };

        let Some(secondary) = self.read_order.secondary() else {
            tracing::error!(name, backend = %primary, error = %primary_err, "read failed, no fallback configured");
            return Err(Error::StorageUnavailable {
                name: name.to_string(),
                source: Box::new(primary_err),
            });
        };

        tracing::warn!(
            name,
            failed = %primary,
            serving = %secondary,
            error = %primary_err,
            "primary read failed, serving from fallback"
        );

        match self.try_open(secondary, name).await {
            Ok(stream) => {
                self.last_read.store(secondary as u8, Ordering::Relaxed);
                Ok(stream)
            }
            Err(e) if e.is_backend_failure() => {
                tracing::error!(name, backend = %secondary, error = %e, "fallback read failed, backends exhausted");
                Err(Error::StorageUnavailable {
                    name: name.to_string(),
                    source: Box::new(e),
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Store an object on every backend in `write_order`, in order.
    ///
    /// A primary failure aborts before the secondary is attempted; a secondary
    /// failure still fails the call and the primary copy is not rolled back.
    /// Callers must treat any failure as "replication state unknown".
    async fn save(&self, name: &str, content: Bytes) -> Result<String> {
        validate_name(name)?;

        let saved = self
            .save_to(self.write_order.primary(), name, content.clone())
            .await?;

        if let Some(secondary) = self.write_order.secondary() {
            self.save_to(secondary, name, content).await?;
        }

        Ok(saved)
    }

    /// Check existence against the backend that served the most recent
    /// successful `open` (the read primary if none has run yet).
    ///
    /// The cache is advisory: under concurrency, or after a failover, this may
    /// answer differently than a full `open` would. Known limitation.
    async fn exists(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let key = BackendKey::from_u8(self.last_read.load(Ordering::Relaxed));
        self.backend(key).exists(name).await
    }

    /// Always fails: deleting from only one backend would desynchronize
    /// replicas, and the façade does not guess.
    async fn delete(&self, _name: &str) -> Result<()> {
        Err(Error::NotImplemented("delete"))
    }
}

/// Builder for [`DualStorage`] with explicitly assembled backends.
///
/// Validation happens in [`build`](Self::build): both priority orders must be
/// well-formed and every referenced key must have a registered backend.
#[derive(Debug, Default)]
pub struct DualStorageBuilder {
    backends: Vec<(BackendKey, Backend)>,
    read_order: Vec<BackendKey>,
    write_order: Vec<BackendKey>,
}

impl DualStorageBuilder {
    /// Register a backend under a key. Registering the same key twice is a
    /// configuration error reported by `build`.
    pub fn backend(mut self, key: BackendKey, backend: impl Into<Backend>) -> Self {
        self.backends.push((key, backend.into()));
        self
    }

    pub fn read_order(mut self, keys: impl IntoIterator<Item = BackendKey>) -> Self {
        self.read_order = keys.into_iter().collect();
        self
    }

    pub fn write_order(mut self, keys: impl IntoIterator<Item = BackendKey>) -> Self {
        self.write_order = keys.into_iter().collect();
        self
    }

    pub fn build(self) -> Result<DualStorage> {
        let mut backends = HashMap::new();
        for (key, backend) in self.backends {
            if backends.insert(key, backend).is_some() {
                return Err(Error::Configuration(format!(
                    "backend {key} registered more than once"
                )));
            }
        }

        let read_order = PriorityList::new(&self.read_order)?;
        let write_order = PriorityList::new(&self.write_order)?;
        DualStorage::from_parts(backends, read_order, write_order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_list_rejects_empty() {
        let err = PriorityList::new(&[]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn priority_list_rejects_duplicates() {
        let err = PriorityList::new(&[BackendKey::S3, BackendKey::S3]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn priority_list_orders_primary_and_secondary() {
        let list = PriorityList::new(&[BackendKey::Gcs, BackendKey::S3]).unwrap();
        assert_eq!(list.primary(), BackendKey::Gcs);
        assert_eq!(list.secondary(), Some(BackendKey::S3));

        let single = PriorityList::new(&[BackendKey::S3]).unwrap();
        assert_eq!(single.primary(), BackendKey::S3);
        assert_eq!(single.secondary(), None);
    }

    #[cfg(feature = "memory")]
    #[test]
    fn build_rejects_unknown_backend_key() {
        let err = DualStorage::builder()
            .backend(BackendKey::S3, MemoryStorage::new())
            .read_order([BackendKey::S3, BackendKey::Gcs])
            .write_order([BackendKey::S3])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[cfg(feature = "memory")]
    #[test]
    fn build_rejects_duplicate_registration() {
        let err = DualStorage::builder()
            .backend(BackendKey::S3, MemoryStorage::new())
            .backend(BackendKey::S3, MemoryStorage::new())
            .read_order([BackendKey::S3])
            .write_order([BackendKey::S3])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
