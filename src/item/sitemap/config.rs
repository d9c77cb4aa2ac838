use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::sink::{DEFAULT_SINK_CAPACITY, SinkCompletion};
use crate::error::{ErrorLevel, SitemapError};

use super::index_writer::SitemapIndexStreamBuilder;
use super::rotation::{
    DEFAULT_BYTE_LIMIT, DEFAULT_COUNT_LIMIT, FileShardFactory, RotationOptions,
    SitemapAndIndexStream,
};
use super::sitemap_writer::SitemapStreamBuilder;
use super::types::Namespaces;

/// Settings for a complete sitemap run, loadable from JSON.
///
/// Every field is optional in the serialized form.
///
/// # Examples
///
/// ```
/// use sitemap_batch_rs::item::sitemap::SitemapConfig;
///
/// let config = SitemapConfig::from_json(r#"{
///     "hostname": "https://example.com",
///     "count_limit": 1000,
///     "lastmod_date_only": true
/// }"#).unwrap();
///
/// assert_eq!(config.rotation_options().count_limit, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    pub hostname: Option<String>,
    pub xsl_url: Option<String>,
    pub lastmod_date_only: bool,
    pub full_precision_priority: bool,
    pub namespaces: Namespaces,
    pub error_level: ErrorLevel,
    pub count_limit: usize,
    pub byte_limit: usize,
    pub sink_capacity: usize,
    /// File name prefix of the shards written by [`SitemapConfig::file_pipeline`].
    pub shard_prefix: String,
    pub index_file_name: String,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            xsl_url: None,
            lastmod_date_only: false,
            full_precision_priority: false,
            namespaces: Namespaces::default(),
            error_level: ErrorLevel::default(),
            count_limit: DEFAULT_COUNT_LIMIT,
            byte_limit: DEFAULT_BYTE_LIMIT,
            sink_capacity: DEFAULT_SINK_CAPACITY,
            shard_prefix: "sitemap".to_string(),
            index_file_name: "sitemap-index.xml".to_string(),
        }
    }
}

impl SitemapConfig {
    pub fn from_json(json: &str) -> Result<Self, SitemapError> {
        serde_json::from_str(json)
            .map_err(|e| SitemapError::Configuration(format!("Failed to parse config: {}", e)))
    }

    pub fn rotation_options(&self) -> RotationOptions {
        RotationOptions {
            count_limit: self.count_limit,
            byte_limit: self.byte_limit,
        }
    }

    pub fn stream_builder(&self) -> SitemapStreamBuilder {
        let mut builder = SitemapStreamBuilder::new()
            .namespaces(self.namespaces.clone())
            .lastmod_date_only(self.lastmod_date_only)
            .full_precision_priority(self.full_precision_priority)
            .error_level(self.error_level)
            .sink_capacity(self.sink_capacity);
        if let Some(hostname) = &self.hostname {
            builder = builder.hostname(hostname);
        }
        if let Some(xsl_url) = &self.xsl_url {
            builder = builder.xsl_url(xsl_url);
        }
        builder
    }

    pub fn index_builder(&self) -> SitemapIndexStreamBuilder {
        let mut builder = SitemapIndexStreamBuilder::new()
            .lastmod_date_only(self.lastmod_date_only)
            .sink_capacity(self.sink_capacity);
        if let Some(xsl_url) = &self.xsl_url {
            builder = builder.xsl_url(xsl_url);
        }
        builder
    }

    /// Writes shards and the index into `dir`, announcing shards under
    /// `public_base`.
    ///
    /// Returns the orchestrator, the index completion and the index path.
    /// Must be called from within a tokio runtime.
    pub fn file_pipeline<P: AsRef<Path>>(
        &self,
        dir: P,
        public_base: &str,
    ) -> Result<(SitemapAndIndexStream<FileShardFactory>, SinkCompletion, PathBuf), SitemapError>
    {
        let dir = dir.as_ref();
        let factory = FileShardFactory::new(dir, public_base, self.stream_builder())
            .prefix(&self.shard_prefix);

        let index_path = dir.join(&self.index_file_name);
        let (index, index_completion) = self.index_builder().from_path(&index_path)?;
        let stream = SitemapAndIndexStream::new(index, factory, self.rotation_options())?;
        Ok((stream, index_completion, index_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = SitemapConfig::from_json("{}").unwrap();

        assert_eq!(config, SitemapConfig::default());
        assert_eq!(config.rotation_options(), RotationOptions::default());
    }

    #[test]
    fn reads_nested_settings() {
        let config = SitemapConfig::from_json(
            r#"{
                "error_level": "throw",
                "namespaces": { "video": false, "news": false },
                "byte_limit": 1048576,
                "shard_prefix": "pages"
            }"#,
        )
        .unwrap();

        assert_eq!(config.error_level, ErrorLevel::Throw);
        assert!(!config.namespaces.video);
        assert!(config.namespaces.image);
        assert_eq!(config.byte_limit, 1_048_576);
        assert_eq!(config.count_limit, DEFAULT_COUNT_LIMIT);
        assert_eq!(config.shard_prefix, "pages");
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        let result = SitemapConfig::from_json(r#"{"count_limit": "lots"}"#);

        assert!(matches!(result, Err(SitemapError::Configuration(_))));
    }
}
