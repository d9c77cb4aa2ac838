//! Mock version of a shard factory.
use mockall::mock;

use sitemap_batch_rs::{
    SitemapError,
    item::sitemap::{Shard, ShardFactory},
};

mock! {
    pub Factory {}
    impl ShardFactory for Factory {
        fn create(&mut self, ordinal: usize) -> Result<Shard, SitemapError>;
    }
}
