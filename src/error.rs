use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sitemap error
///
/// Foreign errors (io, xml, url parsing) are kept as messages so that one
/// outcome can be cloned and handed to every party waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SitemapError {
    /// Illegal limit (re)configuration or invalid builder input.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Committing the item would push the file past its byte ceiling.
    #[error("Byte limit exceeded: {attempted} bytes requested, limit is {limit}")]
    ByteLimitExceeded { limit: usize, attempted: usize },

    /// The file already holds as many entries as it may.
    #[error("Count limit exceeded: limit is {limit} items")]
    CountLimitExceeded { limit: usize },

    /// The writer already emitted its closing tag.
    #[error("Write after end: the writer is already closed")]
    WriteAfterEnd,

    /// The item failed validation and was not written.
    #[error("Invalid item {url}: {issue}")]
    ItemValidation { url: String, issue: ValidationIssue },

    /// A freshly rotated, empty shard still refused the item.
    #[error("Item {url} does not fit an empty shard (shard {shard}): {reason}")]
    ItemTooLarge {
        shard: usize,
        url: String,
        reason: String,
    },

    /// The orchestrator reached a state that only a caller or race error can produce.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The physical sink failed or went away.
    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Shard factory error: {0}")]
    Factory(String),
}

impl SitemapError {
    /// Returns `true` for the two ceilings that a rotating caller recovers from.
    pub fn is_limit_error(&self) -> bool {
        matches!(
            self,
            SitemapError::ByteLimitExceeded { .. } | SitemapError::CountLimitExceeded { .. }
        )
    }

    /// Returns `true` when the pipeline can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        self.is_limit_error() || matches!(self, SitemapError::ItemValidation { .. })
    }
}

/// Problems found while validating a single item.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    #[error("URL is missing")]
    NoUrl,

    #[error("URL cannot be resolved: {0}")]
    InvalidUrl(String),

    #[error("priority {0} is not between 0.0 and 1.0")]
    InvalidPriority(f32),

    #[error("changefreq '{0}' is not one of always, hourly, daily, weekly, monthly, yearly, never")]
    InvalidChangeFreq(String),

    #[error("lastmod '{0}' is not a valid date")]
    InvalidLastmod(String),

    #[error("video requires a title, a description and a thumbnail_loc")]
    IncompleteVideo,

    #[error("video description is {0} characters long, the maximum is 2048")]
    VideoDescriptionTooLong(usize),

    #[error("video rating {0} is not between 0 and 5")]
    InvalidVideoRating(f32),

    #[error("video has {0} tags, the maximum is 32")]
    TooManyVideoTags(usize),

    #[error("video category is {0} characters long, the maximum is 256")]
    VideoCategoryTooLong(usize),

    #[error("video restriction relationship '{0}' must be allow or deny")]
    InvalidRestrictionRelationship(String),

    #[error("news requires a publication name, a language, a title and a publication_date")]
    IncompleteNews,
}

/// How loudly item validation problems are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLevel {
    /// Ignore the problem and write the item.
    Silent,
    /// Log the problem and write the item.
    #[default]
    Warn,
    /// Refuse the item.
    Throw,
}

/// Custom validation policy. `Ok(())` writes the item, `Err` refuses it.
#[derive(Clone)]
pub struct ErrorHandler(
    Arc<dyn Fn(&SitemapError, ErrorLevel) -> Result<(), SitemapError> + Send + Sync>,
);

impl ErrorHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&SitemapError, ErrorLevel) -> Result<(), SitemapError> + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    pub fn handle(&self, error: &SitemapError, level: ErrorLevel) -> Result<(), SitemapError> {
        (self.0)(error, level)
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHandler")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_errors_are_recoverable() {
        let byte = SitemapError::ByteLimitExceeded {
            limit: 10,
            attempted: 12,
        };
        let count = SitemapError::CountLimitExceeded { limit: 1 };

        assert!(byte.is_limit_error());
        assert!(count.is_limit_error());
        assert!(byte.is_recoverable());
        assert!(!SitemapError::WriteAfterEnd.is_limit_error());
        assert!(!SitemapError::Sink("gone".to_string()).is_recoverable());
    }

    #[test]
    fn validation_error_message_names_the_url() {
        let error = SitemapError::ItemValidation {
            url: "https://example.com/a".to_string(),
            issue: ValidationIssue::InvalidPriority(1.5),
        };

        assert_eq!(
            error.to_string(),
            "Invalid item https://example.com/a: priority 1.5 is not between 0.0 and 1.0"
        );
    }

    #[test]
    fn error_level_deserializes_from_lowercase() {
        let level: ErrorLevel = serde_json::from_str("\"throw\"").unwrap();
        assert_eq!(level, ErrorLevel::Throw);
        assert_eq!(ErrorLevel::default(), ErrorLevel::Warn);
    }

    #[test]
    fn custom_handler_decides() {
        let handler = ErrorHandler::new(|_, level| match level {
            ErrorLevel::Throw => Err(SitemapError::WriteAfterEnd),
            _ => Ok(()),
        });

        assert!(handler.handle(&SitemapError::WriteAfterEnd, ErrorLevel::Warn).is_ok());
        assert!(handler.handle(&SitemapError::WriteAfterEnd, ErrorLevel::Throw).is_err());
    }
}
