mod common;

use std::{
    mem,
    sync::{Arc, Mutex},
    time::Duration,
};

use common::{
    assert_well_formed, init_logger, locs, memory_index, plain_builder, shard_location,
};
use sitemap_batch_rs::{
    SitemapError,
    core::sink::{SharedBuffer, spawn_sink},
    item::sitemap::{
        IndexItem, RotationOptions, RotationState, Shard, ShardFactory, SitemapAndIndexStream,
    },
};
use tokio::{
    task::JoinHandle,
    time::{sleep, timeout},
};

type Readers = Arc<Mutex<Vec<JoinHandle<SharedBuffer>>>>;

fn page(n: usize) -> String {
    format!("https://example.com/page-{}", n)
}

fn one_per_shard() -> RotationOptions {
    RotationOptions {
        count_limit: 1,
        ..RotationOptions::default()
    }
}

/// Shards behind an 8 byte pipe whose reader only starts after `delay`,
/// so every shard applies backpressure until then.
fn slow_factory(delay: Duration, readers: Readers) -> impl ShardFactory + 'static {
    move |ordinal: usize| -> Result<Shard, SitemapError> {
        let (client, mut server) = tokio::io::duplex(8);
        let reader = tokio::spawn(async move {
            sleep(delay).await;
            let mut buffer = SharedBuffer::new();
            tokio::io::copy(&mut server, &mut buffer).await.unwrap();
            buffer
        });
        readers.lock().unwrap().push(reader);

        let (sink, completion) = spawn_sink(client, 1);
        let stream = plain_builder().from_sink(sink)?;
        Ok(Shard {
            entry: IndexItem::new(shard_location(ordinal)),
            stream,
            completion,
        })
    }
}

async fn drain(readers: &Readers) -> Vec<String> {
    let handles = mem::take(&mut *readers.lock().unwrap());
    let mut shards = Vec::new();
    for handle in handles {
        shards.push(handle.await.unwrap().to_string_lossy());
    }
    shards
}

#[tokio::test]
async fn abandoned_writes_do_not_stall_end() {
    init_logger();
    let readers = Readers::default();
    let (index, index_done, index_buffer) = memory_index();
    let factory = slow_factory(Duration::from_millis(300), readers.clone());
    let sitemaps = SitemapAndIndexStream::new(index, factory, one_per_shard()).unwrap();

    let mut accepted = 0;
    for n in 0..4 {
        if let Ok(result) = timeout(Duration::from_millis(20), sitemaps.write(page(n))).await {
            result.unwrap();
            accepted += 1;
        }
    }
    assert!(accepted < 4);

    sleep(Duration::from_millis(500)).await;
    sitemaps.write(page(4)).await.unwrap();

    let ended = timeout(Duration::from_secs(3), sitemaps.end()).await;
    assert_eq!(ended, Ok(Ok(())));
    assert_eq!(sitemaps.state(), RotationState::Closed);
    index_done.wait().await.unwrap();

    let shards = drain(&readers).await;
    assert_eq!(shards.len(), sitemaps.shard_count());
    let mut written = Vec::new();
    for shard in &shards {
        assert_well_formed(shard, "urlset");
        written.extend(locs(shard));
    }
    assert!(written.len() > accepted);
    assert_eq!(written.last(), Some(&page(4)));
    assert_well_formed(&index_buffer.to_string_lossy(), "sitemapindex");
}

#[tokio::test]
async fn abandoned_end_still_finalizes() {
    init_logger();
    let readers = Readers::default();
    let (index, index_done, index_buffer) = memory_index();
    let factory = slow_factory(Duration::from_millis(300), readers.clone());
    let sitemaps = SitemapAndIndexStream::new(index, factory, one_per_shard()).unwrap();

    sitemaps.write(page(0)).await.unwrap();
    assert!(timeout(Duration::from_millis(20), sitemaps.end()).await.is_err());
    assert_eq!(sitemaps.state(), RotationState::Draining);
    assert_eq!(
        sitemaps.write(page(1)).await,
        Err(SitemapError::WriteAfterEnd)
    );

    let ended = timeout(Duration::from_secs(3), sitemaps.end()).await;
    assert_eq!(ended, Ok(Ok(())));
    index_done.wait().await.unwrap();

    let shards = drain(&readers).await;
    assert_eq!(shards.len(), 1);
    assert_well_formed(&shards[0], "urlset");
    assert_eq!(locs(&shards[0]), vec![page(0)]);
    assert_eq!(
        locs(&index_buffer.to_string_lossy()),
        vec![shard_location(0)]
    );
}
