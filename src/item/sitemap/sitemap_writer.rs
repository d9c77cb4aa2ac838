use std::path::Path;

use log::{debug, info};

use crate::core::item::{ItemWriter, ItemWriterResult};
use crate::core::sink::{ChunkSender, DEFAULT_SINK_CAPACITY, SinkCompletion, file_sink};
use crate::error::{ErrorHandler, ErrorLevel, SitemapError};

use super::encoder::{self, URLSET_TAG};
use super::normalize::Normalizer;
use super::types::{Namespaces, PROTOCOL_MAX_BYTES, PROTOCOL_MAX_ITEMS, SitemapItemLoose};

/// Lifecycle of a single-file writer. Both non-open states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Open,
    /// An item was refused by a ceiling; the closing tag has been written.
    LimitExceeded,
    /// `end()` was called; the closing tag has been written.
    Closed,
}

/// Writes one `<urlset>` document, enforcing optional byte and count ceilings.
///
/// The preamble is emitted with the first accepted item (or on `end()` for
/// an empty document) and the closing tag exactly once. Before committing an
/// item the writer checks that the file, closed right after it, would still
/// fit the byte limit, and that the count limit leaves room for it. A refused
/// item finalizes the writer: every later write fails with
/// [`SitemapError::WriteAfterEnd`].
///
/// # Examples
///
/// ```
/// use sitemap_batch_rs::core::item::ItemWriter;
/// use sitemap_batch_rs::core::sink::memory_sink;
/// use sitemap_batch_rs::item::sitemap::{Namespaces, SitemapItemLoose, SitemapStreamBuilder};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (sink, completion, buffer) = memory_sink(8);
/// let mut writer = SitemapStreamBuilder::new()
///     .hostname("https://example.com")
///     .namespaces(Namespaces::none())
///     .from_sink(sink)
///     .unwrap();
///
/// writer.write(&SitemapItemLoose::new("/docs")).await.unwrap();
/// writer.end().await.unwrap();
/// completion.wait().await.unwrap();
///
/// assert!(buffer.to_string_lossy().contains("<loc>https://example.com/docs</loc>"));
/// assert!(buffer.to_string_lossy().ends_with("</urlset>"));
/// # }
/// ```
#[derive(Debug)]
pub struct SitemapStream {
    sink: Option<ChunkSender>,
    normalizer: Normalizer,
    preamble: Vec<u8>,
    full_precision_priority: bool,
    count_limit: Option<usize>,
    byte_limit: Option<usize>,
    item_count: usize,
    byte_count: usize,
    head_written: bool,
    state: WriterState,
}

impl SitemapStream {
    /// Sets the maximum number of `<url>` entries.
    ///
    /// Allowed once, and only before anything has been written. A refused
    /// call leaves the current limits untouched.
    pub fn set_count_limit(&mut self, limit: usize) -> Result<(), SitemapError> {
        self.ensure_configurable("count")?;
        if let Some(current) = self.count_limit {
            return Err(SitemapError::Configuration(format!(
                "count limit already set to {}",
                current
            )));
        }
        if limit == 0 || limit > PROTOCOL_MAX_ITEMS {
            return Err(SitemapError::Configuration(format!(
                "count limit must be between 1 and {}, got {}",
                PROTOCOL_MAX_ITEMS, limit
            )));
        }
        self.count_limit = Some(limit);
        Ok(())
    }

    /// Sets the maximum size of the finished file in bytes.
    ///
    /// Same write-once rules as [`SitemapStream::set_count_limit`]. The limit
    /// must leave room for at least an empty document.
    pub fn set_byte_limit(&mut self, limit: usize) -> Result<(), SitemapError> {
        self.ensure_configurable("byte")?;
        if let Some(current) = self.byte_limit {
            return Err(SitemapError::Configuration(format!(
                "byte limit already set to {}",
                current
            )));
        }
        let empty_document = self.preamble.len() + encoder::closing_tag(URLSET_TAG).len();
        if limit <= empty_document || limit > PROTOCOL_MAX_BYTES {
            return Err(SitemapError::Configuration(format!(
                "byte limit must be between {} and {}, got {}",
                empty_document + 1,
                PROTOCOL_MAX_BYTES,
                limit
            )));
        }
        self.byte_limit = Some(limit);
        Ok(())
    }

    pub fn count_limit(&self) -> Option<usize> {
        self.count_limit
    }

    pub fn byte_limit(&self) -> Option<usize> {
        self.byte_limit
    }

    /// Exact number of bytes pushed to the sink, preamble included.
    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    fn ensure_configurable(&self, which: &str) -> Result<(), SitemapError> {
        if self.head_written || self.item_count > 0 || self.state != WriterState::Open {
            return Err(SitemapError::Configuration(format!(
                "{} limit cannot be changed once writing has started",
                which
            )));
        }
        Ok(())
    }

    async fn push(&mut self, chunk: Vec<u8>) -> Result<(), SitemapError> {
        let sink = self.sink.as_ref().ok_or(SitemapError::WriteAfterEnd)?;
        let len = chunk.len();
        sink.send(chunk).await?;
        self.byte_count += len;
        Ok(())
    }

    async fn write_head(&mut self) -> Result<(), SitemapError> {
        if !self.head_written {
            self.push(self.preamble.clone()).await?;
            self.head_written = true;
        }
        Ok(())
    }

    /// Writes the closing tag, releases the sink and enters `state`.
    async fn finish(&mut self, state: WriterState) -> Result<(), SitemapError> {
        if self.state != WriterState::Open {
            return Ok(());
        }
        self.write_head().await?;
        self.push(encoder::closing_tag(URLSET_TAG)).await?;
        self.state = state;
        self.sink = None;
        debug!(
            "Sitemap closed ({:?}) with {} items, {} bytes",
            state, self.item_count, self.byte_count
        );
        Ok(())
    }
}

impl ItemWriter<SitemapItemLoose> for SitemapStream {
    async fn write(&mut self, item: &SitemapItemLoose) -> ItemWriterResult {
        if self.state != WriterState::Open {
            return Err(SitemapError::WriteAfterEnd);
        }

        let item = self.normalizer.normalize(item)?;
        let encoded = encoder::encode_url(&item, self.full_precision_priority)?;

        if let Some(limit) = self.byte_limit {
            let preamble = if self.head_written {
                0
            } else {
                self.preamble.len()
            };
            let attempted = self.byte_count
                + preamble
                + encoded.len()
                + encoder::closing_tag(URLSET_TAG).len();
            if attempted > limit {
                info!(
                    "Byte limit {} reached after {} items, refusing {}",
                    limit, self.item_count, item.url
                );
                self.finish(WriterState::LimitExceeded).await?;
                return Err(SitemapError::ByteLimitExceeded { limit, attempted });
            }
        }

        if let Some(limit) = self.count_limit {
            if self.item_count + 1 > limit {
                info!("Count limit {} reached, refusing {}", limit, item.url);
                self.finish(WriterState::LimitExceeded).await?;
                return Err(SitemapError::CountLimitExceeded { limit });
            }
        }

        self.write_head().await?;
        self.push(encoded).await?;
        self.item_count += 1;
        debug!("Wrote {} ({} items, {} bytes)", item.url, self.item_count, self.byte_count);
        Ok(())
    }

    async fn end(&mut self) -> ItemWriterResult {
        self.finish(WriterState::Closed).await
    }

    fn is_finished(&self) -> bool {
        self.state != WriterState::Open
    }

    fn item_count(&self) -> usize {
        self.item_count
    }
}

/// Builder for creating sitemap writers.
///
/// The same builder can be reused to create any number of writers with the
/// same configuration, one per output file.
#[derive(Debug, Clone, Default)]
pub struct SitemapStreamBuilder {
    hostname: Option<String>,
    xsl_url: Option<String>,
    namespaces: Namespaces,
    lastmod_date_only: bool,
    full_precision_priority: bool,
    error_level: ErrorLevel,
    error_handler: Option<ErrorHandler>,
    sink_capacity: Option<usize>,
}

impl SitemapStreamBuilder {
    /// Creates a new builder: all extension namespaces, no stylesheet,
    /// validation problems logged as warnings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Base URL that relative item URLs are resolved against.
    pub fn hostname(mut self, hostname: &str) -> Self {
        self.hostname = Some(hostname.to_string());
        self
    }

    /// Stylesheet referenced by an `xml-stylesheet` processing instruction.
    pub fn xsl_url(mut self, xsl_url: &str) -> Self {
        self.xsl_url = Some(xsl_url.to_string());
        self
    }

    pub fn namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn lastmod_date_only(mut self, yes: bool) -> Self {
        self.lastmod_date_only = yes;
        self
    }

    /// Writes priorities as given instead of rounding to one decimal.
    pub fn full_precision_priority(mut self, yes: bool) -> Self {
        self.full_precision_priority = yes;
        self
    }

    pub fn error_level(mut self, level: ErrorLevel) -> Self {
        self.error_level = level;
        self
    }

    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Number of chunks buffered in front of a file sink.
    pub fn sink_capacity(mut self, capacity: usize) -> Self {
        self.sink_capacity = Some(capacity);
        self
    }

    /// Creates a `SitemapStream` pushing into `sink`.
    pub fn from_sink(&self, sink: ChunkSender) -> Result<SitemapStream, SitemapError> {
        let normalizer = Normalizer::new(self.hostname.as_deref())?
            .lastmod_date_only(self.lastmod_date_only)
            .level(self.error_level)
            .handler(self.error_handler.clone());
        let preamble = encoder::urlset_preamble(self.xsl_url.as_deref(), &self.namespaces)?;

        Ok(SitemapStream {
            sink: Some(sink),
            normalizer,
            preamble,
            full_precision_priority: self.full_precision_priority,
            count_limit: None,
            byte_limit: None,
            item_count: 0,
            byte_count: 0,
            head_written: false,
            state: WriterState::Open,
        })
    }

    /// Creates a `SitemapStream` writing to a new file at `path`.
    ///
    /// Must be called from within a tokio runtime. The returned completion
    /// resolves once the file is flushed and synced after `end()`.
    pub fn from_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(SitemapStream, SinkCompletion), SitemapError> {
        let capacity = self.sink_capacity.unwrap_or(DEFAULT_SINK_CAPACITY);
        let (sink, completion) = file_sink(path, capacity);
        let stream = self.from_sink(sink)?;
        Ok((stream, completion))
    }
}
