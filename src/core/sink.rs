//! Physical sinks for serialized documents.
//!
//! A writer never touches a file directly: it pushes byte chunks into a
//! bounded channel and a spawned drain task copies them to the destination.
//! The channel bound is what propagates backpressure from a slow sink back to
//! the producer, and the drain task's completion is what callers await to know
//! that a document is durably written.

use std::{
    io,
    path::{Path, PathBuf},
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use log::{debug, error};
use tokio::{
    fs::File,
    io::{AsyncWrite, AsyncWriteExt, BufWriter},
    sync::mpsc,
    task::JoinHandle,
};

use crate::error::SitemapError;

/// Default number of chunks buffered between a writer and its sink.
pub const DEFAULT_SINK_CAPACITY: usize = 16;

/// Sending half of a physical sink.
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<Vec<u8>>,
}

impl ChunkSender {
    /// Pushes one chunk, waiting while the sink is saturated.
    pub async fn send(&self, chunk: Vec<u8>) -> Result<(), SitemapError> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| SitemapError::Sink("sink closed before the document ended".to_string()))
    }
}

/// Completion observable of a physical sink.
///
/// Resolves once the sending half is dropped and every chunk has been
/// written, flushed and shut down.
#[derive(Debug)]
pub struct SinkCompletion {
    handle: JoinHandle<Result<(), SitemapError>>,
}

impl SinkCompletion {
    pub async fn wait(self) -> Result<(), SitemapError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(SitemapError::Sink(format!("Sink task failed: {}", e))),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns a drain task copying chunks into `writer`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_sink<W>(writer: W, capacity: usize) -> (ChunkSender, SinkCompletion)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(capacity.max(1));

    let handle = tokio::spawn(async move {
        let mut writer = writer;
        let mut written = 0usize;
        while let Some(chunk) = rx.recv().await {
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| SitemapError::Sink(format!("Failed to write chunk: {}", e)))?;
            written += chunk.len();
        }
        writer
            .flush()
            .await
            .map_err(|e| SitemapError::Sink(format!("Failed to flush sink: {}", e)))?;
        writer
            .shutdown()
            .await
            .map_err(|e| SitemapError::Sink(format!("Failed to shut down sink: {}", e)))?;
        debug!("Sink finished after {} bytes", written);
        Ok(())
    });

    (ChunkSender { tx }, SinkCompletion { handle })
}

/// Creates a sink writing into a new file at `path`.
///
/// The file is created by the drain task, so creation errors surface through
/// the completion and as a closed channel on the next send.
pub fn file_sink<P: AsRef<Path>>(path: P, capacity: usize) -> (ChunkSender, SinkCompletion) {
    let path: PathBuf = path.as_ref().to_path_buf();
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(capacity.max(1));

    let handle = tokio::spawn(async move {
        let file = File::create(&path).await.map_err(|e| {
            error!("Failed to create sitemap file {}: {}", path.display(), e);
            SitemapError::Sink(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        while let Some(chunk) = rx.recv().await {
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| SitemapError::Sink(format!("Failed to write {}: {}", path.display(), e)))?;
        }
        writer
            .flush()
            .await
            .map_err(|e| SitemapError::Sink(format!("Failed to flush {}: {}", path.display(), e)))?;
        writer
            .get_mut()
            .sync_all()
            .await
            .map_err(|e| SitemapError::Sink(format!("Failed to sync {}: {}", path.display(), e)))?;
        debug!("Finished writing {}", path.display());
        Ok(())
    });

    (ChunkSender { tx }, SinkCompletion { handle })
}

/// In-memory buffer shared between a sink and whoever inspects the output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Lossy UTF-8 view of the contents.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("shared buffer poisoned"))?;
        guard.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Creates a sink collecting into a [`SharedBuffer`].
pub fn memory_sink(capacity: usize) -> (ChunkSender, SinkCompletion, SharedBuffer) {
    let buffer = SharedBuffer::new();
    let (sender, completion) = spawn_sink(buffer.clone(), capacity);
    (sender, completion, buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn memory_sink_collects_chunks_in_order() {
        let (sender, completion, buffer) = memory_sink(2);

        sender.send(b"<a>".to_vec()).await.unwrap();
        sender.send(b"text".to_vec()).await.unwrap();
        sender.send(b"</a>".to_vec()).await.unwrap();
        drop(sender);

        completion.wait().await.unwrap();
        assert_eq!(buffer.to_string_lossy(), "<a>text</a>");
    }

    #[tokio::test]
    async fn completion_waits_for_every_sender() {
        let (sender, completion, buffer) = memory_sink(1);
        let clone = sender.clone();

        sender.send(b"1".to_vec()).await.unwrap();
        drop(sender);
        clone.send(b"2".to_vec()).await.unwrap();
        drop(clone);

        completion.wait().await.unwrap();
        assert_eq!(buffer.contents(), b"12".to_vec());
    }

    #[tokio::test]
    async fn file_sink_writes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.xml");
        let (sender, completion) = file_sink(&path, DEFAULT_SINK_CAPACITY);

        sender.send(b"<urlset></urlset>".to_vec()).await.unwrap();
        drop(sender);
        completion.wait().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "<urlset></urlset>");
    }

    #[tokio::test]
    async fn file_sink_reports_creation_failure() {
        let (sender, completion) = file_sink("/nonexistent/directory/out.xml", 1);

        let result = completion.wait().await;
        assert!(matches!(result, Err(SitemapError::Sink(message)) if message.contains("Failed to create file")));
        assert!(sender.send(b"late".to_vec()).await.is_err());
    }
}
