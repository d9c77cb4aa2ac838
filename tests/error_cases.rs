mod common;

use common::{
    MockFactory, Shards, assert_well_formed, init_logger, memory_index, memory_shard, plain_builder,
};
use mockall::predicate::eq;
use sitemap_batch_rs::{
    SitemapError,
    core::item::ItemWriter,
    item::sitemap::{RotationOptions, RotationState, SitemapAndIndexStream},
};

fn count_limited(count_limit: usize) -> RotationOptions {
    RotationOptions {
        count_limit,
        ..RotationOptions::default()
    }
}

#[tokio::test]
async fn factory_failure_during_rotation_closes_the_run() {
    init_logger();
    let shards = Shards::default();
    let recorded = shards.clone();
    let mut factory = MockFactory::new();
    factory
        .expect_create()
        .with(eq(0))
        .times(1)
        .returning(move |ordinal| memory_shard(ordinal, &plain_builder(), &recorded));
    factory
        .expect_create()
        .with(eq(1))
        .times(1)
        .returning(|_| Err(SitemapError::Factory("disk full".to_string())));

    let (index, index_done, index_buffer) = memory_index();
    let sitemaps = SitemapAndIndexStream::new(index, factory, count_limited(1)).unwrap();

    sitemaps.write("https://example.com/a").await.unwrap();
    let result = sitemaps.write("https://example.com/b").await;

    assert_eq!(result, Err(SitemapError::Factory("disk full".to_string())));
    assert_eq!(sitemaps.state(), RotationState::Closed);
    assert_eq!(
        sitemaps.end().await,
        Err(SitemapError::Factory("disk full".to_string()))
    );
    assert_eq!(
        sitemaps.write("https://example.com/c").await,
        Err(SitemapError::WriteAfterEnd)
    );

    index_done.wait().await.unwrap();
    let shard = shards.lock().unwrap()[0].to_string_lossy();
    assert_well_formed(&shard, "urlset");
    assert_well_formed(&index_buffer.to_string_lossy(), "sitemapindex");
}

#[tokio::test]
async fn shard_handed_out_closed_closes_the_run() {
    init_logger();
    let shards = Shards::default();
    let recorded = shards.clone();
    let mut closed = memory_shard(1, &plain_builder(), &shards).unwrap();
    closed.stream.end().await.unwrap();

    let mut factory = MockFactory::new();
    factory
        .expect_create()
        .with(eq(0))
        .times(1)
        .returning(move |ordinal| memory_shard(ordinal, &plain_builder(), &recorded));
    factory
        .expect_create()
        .with(eq(1))
        .times(1)
        .return_once(move |_| Ok(closed));

    let (index, index_done, index_buffer) = memory_index();
    let sitemaps = SitemapAndIndexStream::new(index, factory, count_limited(1)).unwrap();

    sitemaps.write("https://example.com/a").await.unwrap();
    let result = sitemaps.write("https://example.com/b").await;

    assert!(matches!(result, Err(SitemapError::InvalidState(_))));
    assert_eq!(sitemaps.state(), RotationState::Closed);
    assert!(matches!(
        sitemaps.end().await,
        Err(SitemapError::InvalidState(_))
    ));

    index_done.wait().await.unwrap();
    let contents: Vec<String> = shards
        .lock()
        .unwrap()
        .iter()
        .map(|buffer| buffer.to_string_lossy())
        .collect();
    assert_eq!(contents.len(), 2);
    for shard in &contents {
        assert_well_formed(shard, "urlset");
        assert!(!shard.contains("https://example.com/b"));
    }
    let index = index_buffer.to_string_lossy();
    assert_well_formed(&index, "sitemapindex");
    assert_eq!(index.matches("<sitemap>").count(), 1);
}

#[tokio::test]
async fn factory_failure_for_first_shard_fails_construction() {
    let mut factory = MockFactory::new();
    factory
        .expect_create()
        .with(eq(0))
        .times(1)
        .returning(|_| Err(SitemapError::Factory("no permission".to_string())));

    let (index, _index_done, _index_buffer) = memory_index();
    let result = SitemapAndIndexStream::new(index, factory, RotationOptions::default());

    assert!(matches!(result, Err(SitemapError::Factory(_))));
}

#[tokio::test]
async fn limits_outside_protocol_bounds_are_rejected() {
    let shards = Shards::default();
    let recorded = shards.clone();
    let mut factory = MockFactory::new();
    factory
        .expect_create()
        .returning(move |ordinal| memory_shard(ordinal, &plain_builder(), &recorded));

    let (index, _index_done, _index_buffer) = memory_index();
    let result = SitemapAndIndexStream::new(index, factory, count_limited(50_001));

    assert!(matches!(result, Err(SitemapError::Configuration(_))));
}
