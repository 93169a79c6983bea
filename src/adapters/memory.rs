use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use futures::stream::{self, StreamExt};

use crate::{Error, ObjectStream, Result, Storage, validate_name};

/// An induced failure mode for [`MemoryStorage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Every operation fails immediately with a transport error.
    Transport,
    /// `open` returns a handle whose stream fails at first poll, mimicking a
    /// remote client that only surfaces errors on first access.
    BrokenStream,
}

/// A simple in-memory `Storage` adapter.
///
/// - Data is stored as [`Bytes`] in a `HashMap`.
/// - Cloned handles share the same underlying map.
/// - Intended for tests, local development, and ephemeral usage.
///
/// A [`Fault`] switch lets tests exercise failover paths deterministically
/// without a network; [`set_fault`](Self::set_fault) with `None` heals.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<HashMap<String, Bytes>>>,
    fault: Arc<RwLock<Option<Fault>>>,
}

impl MemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new in-memory storage from an existing map.
    pub fn from_map(map: HashMap<String, Bytes>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(map)),
            fault: Arc::default(),
        }
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.inner.read().expect("poisoned lock").len()
    }

    /// Returns true if there are no stored objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all objects.
    pub fn clear(&self) {
        self.inner.write().expect("poisoned lock").clear();
    }

    /// Induce a failure mode, or heal with `None`.
    pub fn set_fault(&self, fault: Option<Fault>) {
        *self.fault.write().expect("poisoned lock") = fault;
    }

    /// Get a copy of the bytes for `name` (useful for tests).
    pub fn raw_bytes(&self, name: &str) -> Result<Bytes> {
        let map = self.inner.read().expect("poisoned lock");
        map.get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn fault(&self) -> Option<Fault> {
        *self.fault.read().expect("poisoned lock")
    }

    fn check_transport(&self, context: &str) -> Result<()> {
        if self.fault() == Some(Fault::Transport) {
            return Err(Error::transport_msg(format!(
                "memory backend fault induced during {context}"
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Avoid dumping potentially large in-memory contents.
        f.debug_struct("MemoryStorage")
            .field("len", &self.len())
            .field("fault", &self.fault())
            .finish()
    }
}

impl Storage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<ObjectStream> {
        validate_name(name)?;
        self.check_transport("open")?;

        if self.fault() == Some(Fault::BrokenStream) {
            // Descriptor creation succeeds; the failure surfaces on first read.
            let broken = stream::iter([Err(Error::transport_msg(
                "memory backend fault induced at first read",
            ))])
            .boxed();
            return Ok(ObjectStream::new(name, None, broken));
        }

        let content = self.raw_bytes(name)?;
        Ok(ObjectStream::from_bytes(name, content))
    }

    async fn save(&self, name: &str, content: Bytes) -> Result<String> {
        validate_name(name)?;
        self.check_transport("save")?;
        if self.fault() == Some(Fault::BrokenStream) {
            return Err(Error::transport_msg(
                "memory backend fault induced during save",
            ));
        }

        let mut map = self.inner.write().expect("poisoned lock");
        map.insert(name.to_string(), content);
        Ok(name.to_string())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        self.check_transport("exists")?;

        let map = self.inner.read().expect("poisoned lock");
        Ok(map.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        self.check_transport("delete")?;

        let mut map = self.inner.write().expect("poisoned lock");
        map.remove(name);
        Ok(())
    }
}
