//! Turns loose records into normalized, validated [`SitemapItem`]s.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use log::warn;
use url::Url;

use crate::error::{ErrorHandler, ErrorLevel, SitemapError, ValidationIssue};

use super::types::{ChangeFreq, SitemapItem, SitemapItemLoose};

const MAX_VIDEO_DESCRIPTION: usize = 2048;
const MAX_VIDEO_TAGS: usize = 32;
const MAX_VIDEO_CATEGORY: usize = 256;

/// Normalizes a lastmod value.
///
/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS[.fff]` (read as
/// UTC) and plain `YYYY-MM-DD` dates. Returns `None` when nothing matches.
///
/// # Examples
///
/// ```
/// use sitemap_batch_rs::item::sitemap::normalize::normalize_lastmod;
///
/// assert_eq!(
///     normalize_lastmod("2024-03-01T10:00:00+02:00", false).as_deref(),
///     Some("2024-03-01T08:00:00.000Z")
/// );
/// assert_eq!(normalize_lastmod("2024-03-01", true).as_deref(), Some("2024-03-01"));
/// assert_eq!(normalize_lastmod("yesterday", false), None);
/// ```
pub fn normalize_lastmod(raw: &str, date_only: bool) -> Option<String> {
    let raw = raw.trim();
    let utc: DateTime<Utc> = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.with_timezone(&Utc)
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        naive.and_utc()
    } else if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        date.and_hms_opt(0, 0, 0)?.and_utc()
    } else {
        return None;
    };

    if date_only {
        Some(utc.format("%Y-%m-%d").to_string())
    } else {
        Some(utc.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Item normalizer with a severity-gated validation policy.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    hostname: Option<Url>,
    lastmod_date_only: bool,
    level: ErrorLevel,
    handler: Option<ErrorHandler>,
}

impl Normalizer {
    /// Creates a normalizer resolving relative URLs against `hostname`.
    pub fn new(hostname: Option<&str>) -> Result<Self, SitemapError> {
        let hostname = match hostname {
            Some(raw) => Some(Url::parse(raw).map_err(|e| {
                SitemapError::Configuration(format!("Invalid hostname '{}': {}", raw, e))
            })?),
            None => None,
        };

        Ok(Self {
            hostname,
            ..Self::default()
        })
    }

    pub fn lastmod_date_only(mut self, yes: bool) -> Self {
        self.lastmod_date_only = yes;
        self
    }

    pub fn level(mut self, level: ErrorLevel) -> Self {
        self.level = level;
        self
    }

    pub fn handler(mut self, handler: Option<ErrorHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Normalizes and validates one item.
    ///
    /// A missing or unresolvable page URL is always refused. Every other
    /// problem goes through the configured severity.
    pub fn normalize(&self, loose: &SitemapItemLoose) -> Result<SitemapItem, SitemapError> {
        let url = self
            .resolve_url(&loose.url)
            .map_err(|issue| SitemapError::ItemValidation {
                url: loose.url.clone(),
                issue,
            })?;

        let mut item = SitemapItem {
            url,
            lastmod: None,
            changefreq: loose.changefreq.clone(),
            priority: loose.priority,
            links: loose.links.clone(),
            img: loose.img.clone(),
            video: loose.video.clone(),
            news: loose.news.clone(),
            expires: loose.expires.clone(),
        };

        if let Some(raw) = &loose.lastmod {
            item.lastmod = match normalize_lastmod(raw, self.lastmod_date_only) {
                Some(lastmod) => Some(lastmod),
                None => {
                    self.report(&item.url, ValidationIssue::InvalidLastmod(raw.clone()))?;
                    Some(raw.clone())
                }
            };
        }

        for link in item.links.iter_mut() {
            match self.resolve_url(&link.url) {
                Ok(resolved) => link.url = resolved,
                Err(issue) => self.report(&loose.url, issue)?,
            }
        }
        for img in item.img.iter_mut() {
            match self.resolve_url(&img.url) {
                Ok(resolved) => img.url = resolved,
                Err(issue) => self.report(&loose.url, issue)?,
            }
        }

        for issue in validate(&item) {
            self.report(&item.url, issue)?;
        }

        Ok(item)
    }

    fn resolve_url(&self, raw: &str) -> Result<String, ValidationIssue> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationIssue::NoUrl);
        }

        match &self.hostname {
            Some(base) => base
                .join(raw)
                .map(|url| url.to_string())
                .map_err(|e| ValidationIssue::InvalidUrl(format!("{}: {}", raw, e))),
            None => match Url::parse(raw) {
                Ok(url) => Ok(url.to_string()),
                Err(url::ParseError::RelativeUrlWithoutBase) if raw.starts_with('/') => {
                    Ok(raw.to_string())
                }
                Err(e) => Err(ValidationIssue::InvalidUrl(format!("{}: {}", raw, e))),
            },
        }
    }

    fn report(&self, url: &str, issue: ValidationIssue) -> Result<(), SitemapError> {
        let error = SitemapError::ItemValidation {
            url: url.to_string(),
            issue,
        };

        if let Some(handler) = &self.handler {
            return handler.handle(&error, self.level);
        }

        match self.level {
            ErrorLevel::Silent => Ok(()),
            ErrorLevel::Warn => {
                warn!("{}", error);
                Ok(())
            }
            ErrorLevel::Throw => Err(error),
        }
    }
}

/// Collects every protocol violation of an item.
fn validate(item: &SitemapItem) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if let Some(priority) = item.priority {
        if !(0.0..=1.0).contains(&priority) {
            issues.push(ValidationIssue::InvalidPriority(priority));
        }
    }

    if let Some(changefreq) = &item.changefreq {
        if changefreq.parse::<ChangeFreq>().is_err() {
            issues.push(ValidationIssue::InvalidChangeFreq(changefreq.clone()));
        }
    }

    for video in &item.video {
        if video.title.is_empty() || video.description.is_empty() || video.thumbnail_loc.is_empty()
        {
            issues.push(ValidationIssue::IncompleteVideo);
        }
        let description_len = video.description.chars().count();
        if description_len > MAX_VIDEO_DESCRIPTION {
            issues.push(ValidationIssue::VideoDescriptionTooLong(description_len));
        }
        if let Some(rating) = video.rating {
            if !(0.0..=5.0).contains(&rating) {
                issues.push(ValidationIssue::InvalidVideoRating(rating));
            }
        }
        if video.tag.len() > MAX_VIDEO_TAGS {
            issues.push(ValidationIssue::TooManyVideoTags(video.tag.len()));
        }
        if let Some(category) = &video.category {
            let category_len = category.chars().count();
            if category_len > MAX_VIDEO_CATEGORY {
                issues.push(ValidationIssue::VideoCategoryTooLong(category_len));
            }
        }
        if let Some(relationship) = &video.restriction_relationship {
            if relationship != "allow" && relationship != "deny" {
                issues.push(ValidationIssue::InvalidRestrictionRelationship(
                    relationship.clone(),
                ));
            }
        }
    }

    if let Some(news) = &item.news {
        if news.publication.name.is_empty()
            || news.publication.language.is_empty()
            || news.title.is_empty()
            || news.publication_date.is_empty()
        {
            issues.push(ValidationIssue::IncompleteNews);
        }
    }

    issues
}
