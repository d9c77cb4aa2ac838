use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Sitemap namespace shared by url sets and indexes.
pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
pub const NEWS_NS: &str = "http://www.google.com/schemas/sitemap-news/0.9";
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
pub const IMAGE_NS: &str = "http://www.google.com/schemas/sitemap-image/1.1";
pub const VIDEO_NS: &str = "http://www.google.com/schemas/sitemap-video/1.1";

/// Protocol ceiling on entries per file.
pub const PROTOCOL_MAX_ITEMS: usize = 50_000;
/// Protocol ceiling on uncompressed bytes per file.
pub const PROTOCOL_MAX_BYTES: usize = 50 * 1024 * 1024;

/// How often a page is likely to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFreq {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFreq::Always => "always",
            ChangeFreq::Hourly => "hourly",
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
            ChangeFreq::Yearly => "yearly",
            ChangeFreq::Never => "never",
        }
    }
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeFreq {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(ChangeFreq::Always),
            "hourly" => Ok(ChangeFreq::Hourly),
            "daily" => Ok(ChangeFreq::Daily),
            "weekly" => Ok(ChangeFreq::Weekly),
            "monthly" => Ok(ChangeFreq::Monthly),
            "yearly" => Ok(ChangeFreq::Yearly),
            "never" => Ok(ChangeFreq::Never),
            other => Err(other.to_string()),
        }
    }
}

/// An `xhtml:link` alternate of a page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkItem {
    pub lang: String,
    #[serde(default)]
    pub hreflang: Option<String>,
    pub url: String,
}

/// An `image:image` entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Img {
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub geo_location: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
}

/// A `video:video` entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoItem {
    pub thumbnail_loc: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub content_loc: Option<String>,
    #[serde(default)]
    pub player_loc: Option<String>,
    #[serde(default)]
    pub player_loc_autoplay: Option<String>,
    #[serde(default)]
    pub player_loc_allow_embed: Option<bool>,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub family_friendly: Option<bool>,
    #[serde(default)]
    pub tag: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub restriction: Option<String>,
    #[serde(default)]
    pub restriction_relationship: Option<String>,
    #[serde(default)]
    pub requires_subscription: Option<bool>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub live: Option<bool>,
}

/// Publication a news entry belongs to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewsPublication {
    pub name: String,
    pub language: String,
}

/// A `news:news` entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewsItem {
    pub publication: NewsPublication,
    pub publication_date: String,
    pub title: String,
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub genres: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub stock_tickers: Option<String>,
}

/// A URL record as supplied by a producer, before normalization.
///
/// Anything that converts into it can be written: a bare `&str` or `String`
/// becomes a record with only `url` set.
///
/// # Examples
///
/// ```
/// use sitemap_batch_rs::item::sitemap::{ChangeFreq, SitemapItemLoose};
///
/// let item = SitemapItemLoose::new("/docs")
///     .lastmod("2024-03-01")
///     .changefreq(ChangeFreq::Weekly)
///     .priority(0.8);
///
/// assert_eq!(item.url, "/docs");
/// assert_eq!(item.changefreq.as_deref(), Some("weekly"));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SitemapItemLoose {
    pub url: String,
    #[serde(default)]
    pub lastmod: Option<String>,
    #[serde(default)]
    pub changefreq: Option<String>,
    #[serde(default)]
    pub priority: Option<f32>,
    #[serde(default)]
    pub links: Vec<LinkItem>,
    #[serde(default)]
    pub img: Vec<Img>,
    #[serde(default)]
    pub video: Vec<VideoItem>,
    #[serde(default)]
    pub news: Option<NewsItem>,
    #[serde(default)]
    pub expires: Option<String>,
}

impl SitemapItemLoose {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn lastmod<S: Into<String>>(mut self, lastmod: S) -> Self {
        self.lastmod = Some(lastmod.into());
        self
    }

    pub fn changefreq(mut self, changefreq: ChangeFreq) -> Self {
        self.changefreq = Some(changefreq.as_str().to_string());
        self
    }

    pub fn priority(mut self, priority: f32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn link(mut self, link: LinkItem) -> Self {
        self.links.push(link);
        self
    }

    pub fn image(mut self, img: Img) -> Self {
        self.img.push(img);
        self
    }

    pub fn video(mut self, video: VideoItem) -> Self {
        self.video.push(video);
        self
    }

    pub fn news(mut self, news: NewsItem) -> Self {
        self.news = Some(news);
        self
    }

    pub fn expires<S: Into<String>>(mut self, expires: S) -> Self {
        self.expires = Some(expires.into());
        self
    }
}

impl From<&str> for SitemapItemLoose {
    fn from(url: &str) -> Self {
        SitemapItemLoose::new(url)
    }
}

impl From<String> for SitemapItemLoose {
    fn from(url: String) -> Self {
        SitemapItemLoose::new(url)
    }
}

/// A normalized item, ready for encoding.
///
/// `url` is absolute or root-relative and never empty. `lastmod` is in the
/// `YYYY-MM-DDTHH:MM:SS.mmmZ` form, or `YYYY-MM-DD` when date-only output
/// was requested. Fields that failed validation under a lenient
/// [`crate::error::ErrorLevel`] are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SitemapItem {
    pub url: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    pub priority: Option<f32>,
    pub links: Vec<LinkItem>,
    pub img: Vec<Img>,
    pub video: Vec<VideoItem>,
    pub news: Option<NewsItem>,
    pub expires: Option<String>,
}

/// One `<sitemap>` entry of an index document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexItem {
    pub url: String,
    #[serde(default)]
    pub lastmod: Option<String>,
}

impl IndexItem {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            lastmod: None,
        }
    }

    pub fn with_lastmod<S: Into<String>>(mut self, lastmod: S) -> Self {
        self.lastmod = Some(lastmod.into());
        self
    }
}

impl From<&str> for IndexItem {
    fn from(url: &str) -> Self {
        IndexItem::new(url)
    }
}

impl From<String> for IndexItem {
    fn from(url: String) -> Self {
        IndexItem::new(url)
    }
}

/// Extension namespaces declared on the `<urlset>` root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Namespaces {
    pub news: bool,
    pub xhtml: bool,
    pub image: bool,
    pub video: bool,
    /// Extra `(attribute, value)` pairs, e.g. `("xmlns:mobile", "...")`.
    pub custom: Vec<(String, String)>,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            news: true,
            xhtml: true,
            image: true,
            video: true,
            custom: Vec::new(),
        }
    }
}

impl Namespaces {
    /// Only the core sitemap namespace.
    pub fn none() -> Self {
        Self {
            news: false,
            xhtml: false,
            image: false,
            video: false,
            custom: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changefreq_parses_known_values_only() {
        assert_eq!("daily".parse::<ChangeFreq>(), Ok(ChangeFreq::Daily));
        assert_eq!(ChangeFreq::Never.to_string(), "never");
        assert_eq!("sometimes".parse::<ChangeFreq>(), Err("sometimes".to_string()));
    }

    #[test]
    fn loose_item_deserializes_with_defaults() {
        let item: SitemapItemLoose = serde_json::from_str(
            r#"{"url": "/a", "priority": 0.3, "img": [{"url": "/a.png"}]}"#,
        )
        .unwrap();

        assert_eq!(item.url, "/a");
        assert_eq!(item.priority, Some(0.3));
        assert_eq!(item.img[0].url, "/a.png");
        assert!(item.links.is_empty());
        assert!(item.news.is_none());
    }

    #[test]
    fn strings_convert_into_items() {
        let from_str: SitemapItemLoose = "https://example.com/".into();
        let index: IndexItem = String::from("https://example.com/sitemap-0.xml").into();

        assert_eq!(from_str.url, "https://example.com/");
        assert_eq!(index.lastmod, None);
    }
}
