//! Streaming sitemap and sitemap-index writers.
//!
//! [`SitemapStream`] writes a single `<urlset>` document and refuses items once
//! its byte or entry ceiling would be crossed. [`SitemapIndexStream`] writes the
//! `<sitemapindex>` document. [`SitemapAndIndexStream`] ties them together,
//! rotating to a fresh shard whenever the current one is full.

pub mod config;
pub mod encoder;
pub mod index_writer;
pub mod normalize;
pub mod rotation;
pub mod sitemap_writer;
pub mod types;

pub use config::SitemapConfig;
pub use index_writer::{SitemapIndexStream, SitemapIndexStreamBuilder};
pub use normalize::Normalizer;
pub use rotation::{
    FileShardFactory, RotationOptions, RotationState, Shard, ShardFactory, SitemapAndIndexStream,
};
pub use sitemap_writer::{SitemapStream, SitemapStreamBuilder, WriterState};
pub use types::{
    ChangeFreq, Img, IndexItem, LinkItem, Namespaces, NewsItem, NewsPublication, SitemapItem,
    SitemapItemLoose, VideoItem,
};
