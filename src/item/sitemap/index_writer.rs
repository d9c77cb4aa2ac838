use std::path::Path;

use log::{debug, warn};

use crate::core::item::{ItemWriter, ItemWriterResult};
use crate::core::sink::{ChunkSender, DEFAULT_SINK_CAPACITY, SinkCompletion, file_sink};
use crate::error::SitemapError;

use super::encoder::{self, SITEMAPINDEX_TAG};
use super::normalize::normalize_lastmod;
use super::types::{IndexItem, PROTOCOL_MAX_ITEMS};

/// Writes one `<sitemapindex>` document.
///
/// Same preamble and closing-tag discipline as
/// [`super::sitemap_writer::SitemapStream`], one `<sitemap>` entry per write
/// and no ceilings of its own.
#[derive(Debug)]
pub struct SitemapIndexStream {
    sink: Option<ChunkSender>,
    preamble: Vec<u8>,
    lastmod_date_only: bool,
    item_count: usize,
    byte_count: usize,
    head_written: bool,
    closed: bool,
}

impl SitemapIndexStream {
    pub fn byte_count(&self) -> usize {
        self.byte_count
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
}

impl ItemWriter<IndexItem> for SitemapIndexStream {
    async fn write(&mut self, entry: &IndexItem) -> ItemWriterResult {
        if self.closed {
            return Err(SitemapError::WriteAfterEnd);
        }

        let mut entry = entry.clone();
        if self.lastmod_date_only {
            entry.lastmod = entry
                .lastmod
                .map(|raw| normalize_lastmod(&raw, true).unwrap_or(raw));
        }
        let encoded = encoder::encode_index_entry(&entry)?;

        self.write_head().await?;
        self.push(encoded).await?;
        self.item_count += 1;
        if self.item_count == PROTOCOL_MAX_ITEMS + 1 {
            warn!(
                "Sitemap index holds more than {} entries and no longer conforms to the protocol",
                PROTOCOL_MAX_ITEMS
            );
        }
        debug!("Indexed {}", entry.url);
        Ok(())
    }

    async fn end(&mut self) -> ItemWriterResult {
        if self.closed {
            return Ok(());
        }
        self.write_head().await?;
        self.push(encoder::closing_tag(SITEMAPINDEX_TAG)).await?;
        self.closed = true;
        self.sink = None;
        debug!("Sitemap index closed with {} entries", self.item_count);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.closed
    }

    fn item_count(&self) -> usize {
        self.item_count
    }
}

/// Builder for creating sitemap index writers.
///
/// # Examples
///
/// ```
/// use sitemap_batch_rs::core::item::ItemWriter;
/// use sitemap_batch_rs::core::sink::memory_sink;
/// use sitemap_batch_rs::item::sitemap::{IndexItem, SitemapIndexStreamBuilder};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (sink, completion, buffer) = memory_sink(8);
/// let mut index = SitemapIndexStreamBuilder::new()
///     .lastmod_date_only(true)
///     .from_sink(sink)
///     .unwrap();
///
/// index
///     .write(&IndexItem::new("https://example.com/sitemap-0.xml").with_lastmod("2024-02-03T04:05:06Z"))
///     .await
///     .unwrap();
/// index.end().await.unwrap();
/// completion.wait().await.unwrap();
///
/// assert!(buffer.to_string_lossy().contains("<lastmod>2024-02-03</lastmod>"));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SitemapIndexStreamBuilder {
    xsl_url: Option<String>,
    lastmod_date_only: bool,
    sink_capacity: Option<usize>,
}

impl SitemapIndexStreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn xsl_url(mut self, xsl_url: &str) -> Self {
        self.xsl_url = Some(xsl_url.to_string());
        self
    }

    /// Truncates entry lastmod values to `YYYY-MM-DD`.
    pub fn lastmod_date_only(mut self, yes: bool) -> Self {
        self.lastmod_date_only = yes;
        self
    }

    pub fn sink_capacity(mut self, capacity: usize) -> Self {
        self.sink_capacity = Some(capacity);
        self
    }

    pub fn from_sink(&self, sink: ChunkSender) -> Result<SitemapIndexStream, SitemapError> {
        let preamble = encoder::index_preamble(self.xsl_url.as_deref())?;

        Ok(SitemapIndexStream {
            sink: Some(sink),
            preamble,
            lastmod_date_only: self.lastmod_date_only,
            item_count: 0,
            byte_count: 0,
            head_written: false,
            closed: false,
        })
    }

    /// Must be called from within a tokio runtime.
    pub fn from_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(SitemapIndexStream, SinkCompletion), SitemapError> {
        let capacity = self.sink_capacity.unwrap_or(DEFAULT_SINK_CAPACITY);
        let (sink, completion) = file_sink(path, capacity);
        let index = self.from_sink(sink)?;
        Ok((index, completion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::memory_sink;

    #[tokio::test]
    async fn one_entry_per_write() {
        let (sink, completion, buffer) = memory_sink(4);
        let mut index = SitemapIndexStreamBuilder::new().from_sink(sink).unwrap();

        index.write(&IndexItem::new("https://example.com/sitemap-0.xml")).await.unwrap();
        index.write(&IndexItem::new("https://example.com/sitemap-1.xml")).await.unwrap();
        index.end().await.unwrap();
        completion.wait().await.unwrap();

        let content = buffer.to_string_lossy();
        assert_eq!(
            content,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\
             <sitemap><loc>https://example.com/sitemap-0.xml</loc></sitemap>\
             <sitemap><loc>https://example.com/sitemap-1.xml</loc></sitemap>\
             </sitemapindex>"
        );
        assert_eq!(index.item_count(), 2);
        assert_eq!(index.byte_count(), content.len());
    }

    #[tokio::test]
    async fn empty_index_is_well_formed() {
        let (sink, completion, buffer) = memory_sink(4);
        let mut index = SitemapIndexStreamBuilder::new()
            .xsl_url("/index.xsl")
            .from_sink(sink)
            .unwrap();

        index.end().await.unwrap();
        completion.wait().await.unwrap();

        let content = buffer.to_string_lossy();
        assert!(content.contains("<?xml-stylesheet type=\"text/xsl\" href=\"/index.xsl\"?>"));
        assert!(content.ends_with("<sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\"></sitemapindex>"));
    }

    #[tokio::test]
    async fn unparsable_lastmod_is_kept_verbatim() {
        let (sink, completion, buffer) = memory_sink(4);
        let mut index = SitemapIndexStreamBuilder::new()
            .lastmod_date_only(true)
            .from_sink(sink)
            .unwrap();

        index
            .write(&IndexItem::new("/s.xml").with_lastmod("last tuesday"))
            .await
            .unwrap();
        index.end().await.unwrap();
        completion.wait().await.unwrap();

        assert!(buffer.to_string_lossy().contains("<lastmod>last tuesday</lastmod>"));
    }

    #[tokio::test]
    async fn write_after_end_is_refused() {
        let (sink, _completion, _buffer) = memory_sink(4);
        let mut index = SitemapIndexStreamBuilder::new().from_sink(sink).unwrap();

        index.end().await.unwrap();

        assert!(index.is_finished());
        assert_eq!(
            index.write(&IndexItem::new("/late.xml")).await,
            Err(SitemapError::WriteAfterEnd)
        );
    }
}
