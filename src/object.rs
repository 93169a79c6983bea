use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::Result;

/// A readable handle to a stored object.
///
/// Wraps the backend's content stream together with the object name and the
/// backend-reported size (when the backend knows it up front). Implements
/// [`Stream`] yielding `Result<Bytes>` chunks; use [`bytes`](Self::bytes) to
/// collect the remainder into one buffer.
pub struct ObjectStream {
    name: String,
    size: Option<u64>,
    inner: BoxStream<'static, Result<Bytes>>,
}

impl ObjectStream {
    /// Wrap a backend content stream.
    pub fn new(
        name: impl Into<String>,
        size: Option<u64>,
        inner: BoxStream<'static, Result<Bytes>>,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            inner,
        }
    }

    /// A fully materialized object, served as a single chunk.
    pub fn from_bytes(name: impl Into<String>, content: Bytes) -> Self {
        let size = content.len() as u64;
        Self::new(name, Some(size), stream::iter([Ok(content)]).boxed())
    }

    /// The object name this stream was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backend-reported object size, if known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Force the backend to prove the object is retrievable.
    ///
    /// Remote object-store clients can return a lazy handle that only surfaces
    /// a not-found or auth error on first access. `probe` eagerly pulls the
    /// first chunk and re-attaches it, so a stream that survives the probe has
    /// demonstrated a successful positional read. A zero-length object
    /// completes immediately and passes.
    pub async fn probe(&mut self) -> Result<()> {
        match self.inner.next().await {
            Some(Ok(chunk)) => {
                let rest = std::mem::replace(&mut self.inner, stream::empty().boxed());
                self.inner = stream::iter([Ok(chunk)]).chain(rest).boxed();
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => {
                self.inner = stream::empty().boxed();
                Ok(())
            }
        }
    }

    /// Collect the remaining content into one [`Bytes`].
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.inner.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Stream for ObjectStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn from_bytes_reports_size_and_content() {
        let stream = ObjectStream::from_bytes("a.txt", Bytes::from_static(b"hello"));
        assert_eq!(stream.name(), "a.txt");
        assert_eq!(stream.size(), Some(5));
        assert_eq!(stream.bytes().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn probe_reattaches_first_chunk() {
        let chunks = stream::iter([
            Ok(Bytes::from_static(b"hel")),
            Ok(Bytes::from_static(b"lo")),
        ])
        .boxed();
        let mut stream = ObjectStream::new("a.txt", None, chunks);

        stream.probe().await.unwrap();
        assert_eq!(stream.bytes().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn probe_passes_on_empty_object() {
        let mut stream = ObjectStream::new("empty", Some(0), stream::empty().boxed());
        stream.probe().await.unwrap();
        assert_eq!(stream.bytes().await.unwrap(), Bytes::new());
    }

    #[tokio::test]
    async fn probe_surfaces_lazy_failure() {
        let chunks = stream::iter([Err(Error::transport_msg("connection reset"))]).boxed();
        let mut stream = ObjectStream::new("a.txt", None, chunks);

        let err = stream.probe().await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
