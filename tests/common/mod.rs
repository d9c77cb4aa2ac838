#![allow(dead_code)]

pub mod mocks;

pub use mocks::MockFactory;

use std::sync::{Arc, Mutex};

use quick_xml::{Reader, events::Event};
use sitemap_batch_rs::{
    SitemapError,
    core::sink::{SharedBuffer, SinkCompletion, memory_sink},
    item::sitemap::{
        IndexItem, Namespaces, Shard, ShardFactory, SitemapIndexStream, SitemapIndexStreamBuilder,
        SitemapStreamBuilder,
    },
};

pub type Shards = Arc<Mutex<Vec<SharedBuffer>>>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn shard_location(ordinal: usize) -> String {
    format!("https://example.com/sitemap-{}.xml", ordinal)
}

/// Creates an in-memory shard and records its buffer in `shards`.
pub fn memory_shard(
    ordinal: usize,
    builder: &SitemapStreamBuilder,
    shards: &Shards,
) -> Result<Shard, SitemapError> {
    let (sink, completion, buffer) = memory_sink(4);
    let stream = builder.from_sink(sink)?;
    shards
        .lock()
        .map_err(|e| SitemapError::Factory(e.to_string()))?
        .push(buffer);
    Ok(Shard {
        entry: IndexItem::new(shard_location(ordinal)),
        stream,
        completion,
    })
}

pub fn memory_factory(builder: SitemapStreamBuilder) -> (impl ShardFactory + 'static, Shards) {
    let shards: Shards = Arc::new(Mutex::new(Vec::new()));
    let recorded = shards.clone();
    let factory = move |ordinal: usize| -> Result<Shard, SitemapError> {
        memory_shard(ordinal, &builder, &recorded)
    };
    (factory, shards)
}

pub fn plain_builder() -> SitemapStreamBuilder {
    SitemapStreamBuilder::new().namespaces(Namespaces::none())
}

pub fn memory_index() -> (SitemapIndexStream, SinkCompletion, SharedBuffer) {
    let (sink, completion, buffer) = memory_sink(4);
    let index = SitemapIndexStreamBuilder::new().from_sink(sink).unwrap();
    (index, completion, buffer)
}

pub fn shard_contents(shards: &Shards) -> Vec<String> {
    shards
        .lock()
        .unwrap()
        .iter()
        .map(|buffer| buffer.to_string_lossy())
        .collect()
}

/// Values of every `<loc>` element, in document order.
pub fn locs(xml: &str) -> Vec<String> {
    xml.split("<loc>")
        .skip(1)
        .filter_map(|rest| rest.split("</loc>").next())
        .map(str::to_string)
        .collect()
}

/// Asserts `xml` is one well-formed document rooted at `root`.
pub fn assert_well_formed(xml: &str, root: &str) {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if depth == 0 {
                    assert_eq!(start.name().as_ref(), root.as_bytes());
                    roots += 1;
                }
                depth += 1;
            }
            Ok(Event::End(_)) => depth -= 1,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("malformed document: {} in {}", e, xml),
        }
    }

    assert_eq!(depth, 0, "unclosed elements in {}", xml);
    assert_eq!(roots, 1, "expected a single <{}> root in {}", root, xml);
}
