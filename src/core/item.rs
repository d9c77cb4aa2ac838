use std::future::Future;

use crate::error::SitemapError;

/// Represents the result of writing items.
pub type ItemWriterResult = Result<(), SitemapError>;

/// A trait for writing items into a single XML document.
///
/// Implementors emit their document preamble lazily, commit one item per
/// call to [`ItemWriter::write`] and emit their closing tag exactly once,
/// either on [`ItemWriter::end`] or when they refuse an item for good.
pub trait ItemWriter<T> {
    /// Writes one item.
    ///
    /// Once the writer is finished every call fails with
    /// [`SitemapError::WriteAfterEnd`].
    fn write(&mut self, item: &T) -> impl Future<Output = ItemWriterResult> + Send;

    /// Emits the closing tag and releases the physical sink.
    ///
    /// Calling it on a finished writer is a no-op.
    fn end(&mut self) -> impl Future<Output = ItemWriterResult> + Send;

    /// Returns `true` once the closing tag has been written.
    fn is_finished(&self) -> bool;

    /// Number of items committed so far.
    fn item_count(&self) -> usize;
}
