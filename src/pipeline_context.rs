// =============================================================================
// PipelineContext — single dependency-injected hub replacing module singletons
// =============================================================================
//
// Generalizes the teacher's `AppState` (one struct of `Arc`/`RwLock` fields
// built once in `AppState::new` and threaded through every subsystem) into
// the mint-discovery domain. Resolves spec.md §9's "global state / module-
// level singletons" note: the CoinGecko enricher, caches, and counters that
// the prototype scattered at module scope all become fields here, owned by
// whichever component the data model (§3) assigns them to.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::fallback_fetcher::FallbackFetcher;
use crate::ports::TradingView;
use crate::publish_sink::PublishSink;
use crate::qualifier::Qualifier;
use crate::rug_detector::RugDetector;
use crate::runtime_config::RuntimeConfig;
use crate::types::{Candidate, Mint};

/// Item pulled off the event queue by the single consumer task.
pub enum QueueEvent {
    Candidate(Candidate),
    Shutdown,
}

pub struct PipelineContext {
    pub config: RuntimeConfig,
    pub fetcher: Arc<FallbackFetcher>,
    pub rug_detector: Arc<RugDetector>,
    pub qualifier: Arc<Qualifier>,
    pub publish_sink: Arc<PublishSink>,
    pub trading_view: Option<Arc<dyn TradingView>>,

    pub resolved_symbols: RwLock<HashMap<Mint, (String, f64, Instant)>>,
    retry_tasks: Mutex<HashMap<Mint, JoinHandle<()>>>,

    queue_tx: mpsc::Sender<QueueEvent>,
    symbol_tx: mpsc::Sender<Mint>,

    pub processed: AtomicU64,
    pub queue_dropped: AtomicU64,
    pub start_time: Instant,
}

impl PipelineContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RuntimeConfig,
        fetcher: Arc<FallbackFetcher>,
        rug_detector: Arc<RugDetector>,
        qualifier: Arc<Qualifier>,
        publish_sink: Arc<PublishSink>,
        trading_view: Option<Arc<dyn TradingView>>,
    ) -> (Arc<Self>, mpsc::Receiver<QueueEvent>, mpsc::Receiver<Mint>) {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let (symbol_tx, symbol_rx) = mpsc::channel(config.queue_capacity);
        let ctx = Arc::new(Self {
            config,
            fetcher,
            rug_detector,
            qualifier,
            publish_sink,
            trading_view,
            resolved_symbols: RwLock::new(HashMap::new()),
            retry_tasks: Mutex::new(HashMap::new()),
            queue_tx,
            symbol_tx,
            processed: AtomicU64::new(0),
            queue_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        });
        (ctx, queue_rx, symbol_rx)
    }

    /// Non-blocking enqueue used by every producer (C4/C5/C6). Returns
    /// `false` (and increments the drop counter) on a full queue.
    pub fn enqueue_candidate(&self, candidate: Candidate) -> bool {
        match self.queue_tx.try_send(QueueEvent::Candidate(candidate)) {
            Ok(()) => true,
            Err(_) => {
                self.queue_dropped.fetch_add(1, Ordering::Relaxed);
                metrics::increment_counter!("mint_scout_queue_drops_total");
                false
            }
        }
    }

    pub async fn shutdown_queue(&self) {
        let _ = self.queue_tx.send(QueueEvent::Shutdown).await;
    }

    pub fn queue_capacity(&self) -> usize {
        self.config.queue_capacity
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_capacity() - self.queue_tx.capacity()
    }

    pub fn enqueue_for_symbol_resolution(&self, mint: Mint) {
        let _ = self.symbol_tx.try_send(mint);
    }

    /// Evicts `resolved_symbols` entries older than `ttl` (spec.md §3:
    /// "Resolved symbols: process-lifetime with periodic eviction"), and
    /// returns the remaining count for gauge publication.
    pub fn evict_expired_symbols(&self, ttl: std::time::Duration) -> usize {
        let mut symbols = self.resolved_symbols.write();
        symbols.retain(|_, (_, _, resolved_at)| resolved_at.elapsed() < ttl);
        symbols.len()
    }

    /// Registers a retry task if (and only if) the mint has no active one,
    /// preserving the "at most one retry task per mint" invariant (spec.md
    /// §3/§8). Returns `false` if a task is already running.
    pub fn try_register_retry(&self, mint: &Mint, handle: JoinHandle<()>) -> bool {
        let mut tasks = self.retry_tasks.lock();
        if tasks.contains_key(mint) {
            handle.abort();
            return false;
        }
        tasks.insert(mint.clone(), handle);
        true
    }

    pub fn clear_retry(&self, mint: &Mint) {
        self.retry_tasks.lock().remove(mint);
    }

    pub fn active_retries(&self) -> usize {
        self.retry_tasks.lock().len()
    }

    pub async fn shutdown_retries(&self) {
        let handles: Vec<JoinHandle<()>> = self.retry_tasks.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.abort();
        }
    }
}
