#![cfg_attr(docsrs, feature(doc_cfg))]
//#![warn(missing_docs)]

/*!
 <div align="center">
   <h1>Sitemap-Batch for Rust</h1>
   <h3>Streaming sitemap writers with automatic file rotation</h3>
  </div>

 # Sitemap-Batch for Rust

 Search engines cap a single sitemap file at 50 000 URLs and 50 MiB. **Sitemap Batch for Rust**
 writes an unbounded stream of URLs as a set of conforming sitemap files plus a sitemap index
 listing them, rotating to a new file before either ceiling is crossed.

 ## Core Concepts

- **ItemWriter:** An abstraction that represents the output of a writer, one item at a time,
  completed by `end()`.
- **SitemapStream:** Writes one `<urlset>` document. It carries optional byte and entry ceilings
  and refuses the item that would cross one of them.
- **SitemapIndexStream:** Writes the `<sitemapindex>` document.
- **SitemapAndIndexStream:** Feeds items to the current shard, rotates to a fresh shard from a
  `ShardFactory` when it is full and records every shard in the index.
- **Sink:** A bounded channel drained by a background task into a file or buffer. Its
  `SinkCompletion` resolves once the bytes are physically written.

 ## Getting Started

```toml
[dependencies]
sitemap-batch-rs = "<version>"
tokio = { version = "1", features = ["full"] }
```

Then, on your main.rs:

```rust
use sitemap_batch_rs::{
    SitemapError,
    item::sitemap::{ChangeFreq, SitemapConfig, SitemapItemLoose},
};
use std::env::temp_dir;

#[tokio::main]
async fn main() -> Result<(), SitemapError> {
    let dir = temp_dir().join("sitemaps-doc");
    std::fs::create_dir_all(&dir).unwrap();

    let config = SitemapConfig {
        hostname: Some("https://example.com".to_string()),
        count_limit: 2,
        ..SitemapConfig::default()
    };
    let (sitemaps, index_done, index_path) =
        config.file_pipeline(&dir, "https://example.com/sitemaps")?;

    for page in ["/", "/about", "/blog", "/contact"] {
        sitemaps
            .write(SitemapItemLoose::new(page).changefreq(ChangeFreq::Weekly))
            .await?;
    }
    sitemaps.end().await?;
    index_done.wait().await?;

    let index = std::fs::read_to_string(index_path).unwrap();
    assert_eq!(index.matches("<sitemap>").count(), 2);

    Ok(())
}
```

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.
 */

/// Core traits and byte sinks
pub mod core;

/// Error types for sitemap writers
pub mod error;

#[doc(inline)]
pub use error::*;

/// Sitemap, sitemap index and rotating writers
pub mod item;
