//! Rotation of sitemap shards behind a single index.

use std::{
    mem,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::{
    runtime::Handle,
    sync::{Mutex as AsyncMutex, OwnedMutexGuard, oneshot},
};
use uuid::Uuid;

use crate::core::item::ItemWriter;
use crate::core::sink::SinkCompletion;
use crate::error::SitemapError;

use super::index_writer::SitemapIndexStream;
use super::sitemap_writer::{SitemapStream, SitemapStreamBuilder};
use super::types::{IndexItem, SitemapItemLoose};

/// Default ceiling on entries per shard, below the protocol's 50 000.
pub const DEFAULT_COUNT_LIMIT: usize = 45_000;
/// Default ceiling on bytes per shard, below the protocol's 50 MiB.
pub const DEFAULT_BYTE_LIMIT: usize = 45 * 1024 * 1024;

/// One output file handed out by a [`ShardFactory`].
#[derive(Debug)]
pub struct Shard {
    /// Entry recorded in the index once the shard holds an item.
    pub entry: IndexItem,
    /// Fresh writer without limits; the orchestrator applies its own.
    pub stream: SitemapStream,
    /// Resolves once the shard's bytes are physically written.
    pub completion: SinkCompletion,
}

/// Creates shard `ordinal` (zero-based) on demand.
pub trait ShardFactory: Send {
    fn create(&mut self, ordinal: usize) -> Result<Shard, SitemapError>;
}

impl<F> ShardFactory for F
where
    F: FnMut(usize) -> Result<Shard, SitemapError> + Send,
{
    fn create(&mut self, ordinal: usize) -> Result<Shard, SitemapError> {
        self(ordinal)
    }
}

/// Writes shards as `<dir>/<prefix>-<n>.xml`, published under `<public_base>`.
#[derive(Debug, Clone)]
pub struct FileShardFactory {
    dir: PathBuf,
    public_base: String,
    prefix: String,
    builder: SitemapStreamBuilder,
    lastmod: Option<String>,
}

impl FileShardFactory {
    pub fn new<P: Into<PathBuf>>(dir: P, public_base: &str, builder: SitemapStreamBuilder) -> Self {
        Self {
            dir: dir.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
            prefix: "sitemap".to_string(),
            builder,
            lastmod: None,
        }
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// lastmod recorded on every index entry.
    pub fn lastmod(mut self, lastmod: &str) -> Self {
        self.lastmod = Some(lastmod.to_string());
        self
    }

    pub fn file_name(&self, ordinal: usize) -> String {
        format!("{}-{}.xml", self.prefix, ordinal)
    }
}

impl ShardFactory for FileShardFactory {
    fn create(&mut self, ordinal: usize) -> Result<Shard, SitemapError> {
        let file_name = self.file_name(ordinal);
        let (stream, completion) = self.builder.from_path(self.dir.join(&file_name))?;
        let entry = IndexItem {
            url: format!("{}/{}", self.public_base, file_name),
            lastmod: self.lastmod.clone(),
        };
        Ok(Shard {
            entry,
            stream,
            completion,
        })
    }
}

/// Per-shard ceilings applied by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationOptions {
    pub count_limit: usize,
    pub byte_limit: usize,
}

impl Default for RotationOptions {
    fn default() -> Self {
        Self {
            count_limit: DEFAULT_COUNT_LIMIT,
            byte_limit: DEFAULT_BYTE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RotationState {
    #[default]
    Writing,
    /// Between tearing a full shard down and the next one being ready.
    Rotating,
    /// `end()` requested, writes still in flight.
    Draining,
    Closed,
}

struct RotationLedger<F> {
    factory: F,
    ordinal: usize,
    current: SitemapStream,
    entry: IndexItem,
    completion: Option<SinkCompletion>,
    announced: bool,
    index: SitemapIndexStream,
}

impl<F: ShardFactory> RotationLedger<F> {
    /// Replaces the current shard with `shard`, limited per `options`.
    fn install(
        &mut self,
        ordinal: usize,
        mut shard: Shard,
        options: &RotationOptions,
    ) -> Result<(), SitemapError> {
        prepare(ordinal, &mut shard, options)?;
        self.ordinal = ordinal;
        self.current = shard.stream;
        self.entry = shard.entry;
        self.completion = Some(shard.completion);
        self.announced = false;
        Ok(())
    }

    /// Ends the current shard and waits until its sink has finished.
    async fn close_current(&mut self) -> Result<(), SitemapError> {
        self.current.end().await?;
        if let Some(completion) = self.completion.take() {
            completion.wait().await?;
        }
        Ok(())
    }
}

/// Checks a shard coming out of the factory and applies the run's limits.
fn prepare(ordinal: usize, shard: &mut Shard, options: &RotationOptions) -> Result<(), SitemapError> {
    if shard.stream.is_finished() {
        return Err(SitemapError::InvalidState(format!(
            "shard {} was handed out already closed",
            ordinal
        )));
    }
    shard.stream.set_count_limit(options.count_limit)?;
    shard.stream.set_byte_limit(options.byte_limit)
}

#[derive(Default)]
struct Control {
    state: RotationState,
    shards: usize,
    in_flight: usize,
    finalizing: bool,
    pending: Vec<oneshot::Sender<Result<(), SitemapError>>>,
    outcome: Option<Result<(), SitemapError>>,
}

struct Shared<F> {
    id: Uuid,
    options: RotationOptions,
    ledger: Arc<AsyncMutex<RotationLedger<F>>>,
    control: Mutex<Control>,
}

/// Counts one write in flight until dropped, even when the caller gives up.
struct InFlight<F: ShardFactory + 'static> {
    shared: Arc<Shared<F>>,
}

impl<F: ShardFactory + 'static> Drop for InFlight<F> {
    fn drop(&mut self) {
        if self.shared.release() {
            self.shared.spawn_finalize();
        }
    }
}

/// Writes an unbounded stream of items into as many sitemap shards as the
/// limits require, announcing each shard in a sitemap index.
///
/// Items are processed one at a time, in the order their `write` calls
/// acquire the orchestrator, including any rotation they trigger. A shard
/// refusing an item on a limit is ended, its sink awaited, and the next shard
/// obtained from the factory before the same item is retried once. A shard
/// is announced in the index when it accepts its first item.
///
/// `write` and `end` take `&self`, so the orchestrator can be shared across
/// tasks behind an `Arc`. `end` waits for every write in flight, then closes
/// the current shard and the index.
///
/// # Examples
///
/// ```
/// use sitemap_batch_rs::core::sink::memory_sink;
/// use sitemap_batch_rs::SitemapError;
/// use sitemap_batch_rs::item::sitemap::{
///     IndexItem, Namespaces, RotationOptions, Shard, SitemapAndIndexStream,
///     SitemapIndexStreamBuilder, SitemapStreamBuilder,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (index_sink, index_done, index_buffer) = memory_sink(8);
/// let index = SitemapIndexStreamBuilder::new().from_sink(index_sink).unwrap();
///
/// let factory = |n: usize| -> Result<Shard, SitemapError> {
///     let (sink, completion, _buffer) = memory_sink(8);
///     let stream = SitemapStreamBuilder::new().namespaces(Namespaces::none()).from_sink(sink)?;
///     Ok(Shard {
///         entry: IndexItem::new(format!("https://example.com/sitemap-{}.xml", n)),
///         stream,
///         completion,
///     })
/// };
/// let options = RotationOptions { count_limit: 2, ..RotationOptions::default() };
/// let sitemaps = SitemapAndIndexStream::new(index, factory, options).unwrap();
///
/// for page in ["/a", "/b", "/c"] {
///     sitemaps.write(format!("https://example.com{}", page)).await.unwrap();
/// }
/// sitemaps.end().await.unwrap();
/// index_done.wait().await.unwrap();
///
/// assert_eq!(index_buffer.to_string_lossy().matches("<sitemap>").count(), 2);
/// # }
/// ```
pub struct SitemapAndIndexStream<F: ShardFactory + 'static> {
    shared: Arc<Shared<F>>,
}

impl<F: ShardFactory + 'static> SitemapAndIndexStream<F> {
    /// Creates the orchestrator and obtains shard 0 from `factory`.
    ///
    /// Shard 0 produces a document even if nothing is ever written, but it is
    /// only announced in the index once it holds an item.
    pub fn new(
        index: SitemapIndexStream,
        mut factory: F,
        options: RotationOptions,
    ) -> Result<Self, SitemapError> {
        let mut shard = factory.create(0)?;
        prepare(0, &mut shard, &options)?;

        let id = Uuid::new_v4();
        info!(
            "Sitemap run {} started: count limit {}, byte limit {}",
            id, options.count_limit, options.byte_limit
        );

        let shared = Shared {
            id,
            options,
            ledger: Arc::new(AsyncMutex::new(RotationLedger {
                factory,
                ordinal: 0,
                current: shard.stream,
                entry: shard.entry,
                completion: Some(shard.completion),
                announced: false,
                index,
            })),
            control: Mutex::new(Control {
                shards: 1,
                ..Control::default()
            }),
        };
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.shared.id
    }

    pub fn options(&self) -> &RotationOptions {
        &self.shared.options
    }

    pub fn state(&self) -> RotationState {
        self.shared.state()
    }

    /// Number of shards obtained from the factory so far.
    pub fn shard_count(&self) -> usize {
        self.shared.control().shards
    }

    /// Writes one item, rotating to a new shard if the current one is full.
    ///
    /// Limit refusals never reach the caller. Validation errors are returned
    /// and leave the pipeline usable; any other error closes it.
    ///
    /// Dropping the returned future before the item reaches the orchestrator
    /// discards the item. Once it has, the item is processed to completion,
    /// rotation included, whether or not the caller still waits.
    pub async fn write<I: Into<SitemapItemLoose>>(&self, item: I) -> Result<(), SitemapError> {
        let item = item.into();
        let in_flight = self.shared.admit()?;
        let ledger = Arc::clone(&self.shared.ledger).lock_owned().await;

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move {
            let _in_flight = in_flight;
            shared.apply(ledger, item).await
        });
        task.await
            .map_err(|e| SitemapError::InvalidState(format!("Write task failed: {}", e)))?
    }

    /// Ends the run: waits for writes in flight, ends the current shard,
    /// waits for its sink, then ends the index.
    ///
    /// Every caller gets the same outcome; the work happens once, and still
    /// happens if every caller stops waiting.
    pub async fn end(&self) -> Result<(), SitemapError> {
        let (rx, run_now) = {
            let mut control = self.shared.control();
            if let Some(outcome) = &control.outcome {
                return outcome.clone();
            }
            let (tx, rx) = oneshot::channel();
            control.pending.push(tx);
            control.state = RotationState::Draining;
            let run_now = control.in_flight == 0 && !control.finalizing;
            if run_now {
                control.finalizing = true;
            } else {
                debug!(
                    "[{}] end requested with {} writes in flight",
                    self.shared.id, control.in_flight
                );
            }
            (rx, run_now)
        };

        if run_now {
            self.shared.spawn_finalize();
        }

        rx.await.map_err(|_| {
            SitemapError::InvalidState("sitemap run dropped before it was finalized".to_string())
        })?
    }
}

impl<F: ShardFactory + 'static> Shared<F> {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> RotationState {
        self.control().state
    }

    fn set_state(&self, from: RotationState, to: RotationState) {
        let mut control = self.control();
        if control.state == from {
            control.state = to;
        }
    }

    /// Counts a write in flight, unless the run is ending.
    fn admit(self: &Arc<Self>) -> Result<InFlight<F>, SitemapError> {
        let mut control = self.control();
        match control.state {
            RotationState::Draining | RotationState::Closed => Err(SitemapError::WriteAfterEnd),
            _ => {
                control.in_flight += 1;
                Ok(InFlight {
                    shared: Arc::clone(self),
                })
            }
        }
    }

    /// Returns `true` when this was the last write and finalization is due.
    fn release(&self) -> bool {
        let mut control = self.control();
        control.in_flight -= 1;
        if control.in_flight == 0
            && control.state == RotationState::Draining
            && !control.finalizing
        {
            control.finalizing = true;
            return true;
        }
        false
    }

    /// Runs finalization on its own task so no caller can interrupt it.
    fn spawn_finalize(self: &Arc<Self>) {
        match Handle::try_current() {
            Ok(handle) => {
                let shared = Arc::clone(self);
                handle.spawn(async move { shared.finalize().await });
            }
            Err(e) => {
                error!("[{}] cannot finalize outside a tokio runtime: {}", self.id, e);
                self.control().finalizing = false;
            }
        }
    }

    async fn apply(
        &self,
        mut ledger: OwnedMutexGuard<RotationLedger<F>>,
        item: SitemapItemLoose,
    ) -> Result<(), SitemapError> {
        if self.state() == RotationState::Closed {
            return Err(SitemapError::WriteAfterEnd);
        }
        let result = self.process(&mut ledger, &item).await;
        if let Err(error) = &result {
            if !error.is_recoverable() {
                self.teardown(&mut ledger, error.clone()).await;
            }
        }
        result
    }

    async fn process(
        &self,
        ledger: &mut RotationLedger<F>,
        item: &SitemapItemLoose,
    ) -> Result<(), SitemapError> {
        let shard_at_start = ledger.ordinal;

        match ledger.current.write(item).await {
            Ok(()) => self.announce(ledger).await,
            Err(error) if error.is_limit_error() => {
                info!(
                    "[{}] shard {} is full ({}), rotating",
                    self.id, shard_at_start, error
                );
                self.set_state(RotationState::Writing, RotationState::Rotating);
                let rotated = self.rotate(ledger).await;
                self.set_state(RotationState::Rotating, RotationState::Writing);
                rotated?;

                match ledger.current.write(item).await {
                    Ok(()) => self.announce(ledger).await,
                    Err(retry) if retry.is_limit_error() => Err(SitemapError::ItemTooLarge {
                        shard: ledger.ordinal,
                        url: item.url.clone(),
                        reason: retry.to_string(),
                    }),
                    Err(SitemapError::WriteAfterEnd) => Err(SitemapError::InvalidState(format!(
                        "shard {} was closed before {} could be retried",
                        ledger.ordinal, item.url
                    ))),
                    Err(retry) => Err(retry),
                }
            }
            Err(SitemapError::WriteAfterEnd) => Err(SitemapError::InvalidState(format!(
                "shard {} was closed before {} could be written",
                shard_at_start, item.url
            ))),
            Err(error) => Err(error),
        }
    }

    /// Records the current shard in the index the first time it accepts an item.
    async fn announce(&self, ledger: &mut RotationLedger<F>) -> Result<(), SitemapError> {
        if !ledger.announced {
            ledger.index.write(&ledger.entry).await?;
            ledger.announced = true;
            debug!(
                "[{}] announced shard {} as {}",
                self.id, ledger.ordinal, ledger.entry.url
            );
        }
        Ok(())
    }

    async fn rotate(&self, ledger: &mut RotationLedger<F>) -> Result<(), SitemapError> {
        ledger.close_current().await?;

        let next = ledger.ordinal + 1;
        let shard = ledger.factory.create(next)?;
        self.control().shards = next + 1;
        ledger.install(next, shard, &self.options)?;
        info!("[{}] opened shard {}", self.id, next);
        Ok(())
    }

    async fn close_all(&self, ledger: &mut RotationLedger<F>) -> Result<(), SitemapError> {
        ledger.close_current().await?;
        ledger.index.end().await
    }

    async fn finalize(&self) {
        let result = {
            let mut ledger = self.ledger.lock().await;
            let result = self.close_all(&mut ledger).await;
            match &result {
                Ok(()) => info!(
                    "Sitemap run {} finished: {} shards, {} indexed",
                    self.id,
                    ledger.ordinal + 1,
                    ledger.index.item_count()
                ),
                Err(e) => error!("Sitemap run {} failed to finish: {}", self.id, e),
            }
            result
        };
        self.settle(result);
    }

    /// Best-effort close after an unrecoverable error, so every document
    /// written so far still ends with its closing tag.
    async fn teardown(&self, ledger: &mut RotationLedger<F>, cause: SitemapError) {
        error!("[{}] closing sitemaps after error: {}", self.id, cause);
        if let Err(e) = self.close_all(ledger).await {
            warn!("[{}] could not close sitemaps cleanly: {}", self.id, e);
        }
        self.settle(Err(cause));
    }

    /// Enters `Closed` and answers every queued `end()` with `outcome`.
    fn settle(&self, outcome: Result<(), SitemapError>) {
        let pending = {
            let mut control = self.control();
            control.state = RotationState::Closed;
            control.outcome = Some(outcome.clone());
            mem::take(&mut control.pending)
        };
        for tx in pending {
            let _ = tx.send(outcome.clone());
        }
    }
}
