// =============================================================================
// LookbackSweeper — periodic new-listing/trending poll + status digest (C6)
// =============================================================================
//
// Grounded on `_lookback_loop` / `_poll_birdeye_lookback` / `_poll_coingecko_lookback`
// (helius_token_scanner_bot.py:1050-1120). The 30-minute status digest is
// supplemented from `_status_report_loop` (helius_token_scanner_bot.py:1650-1700),
// which the distilled spec.md dropped but the original always ran alongside
// the sweep — kept here since it shares the same notifier and timer idiom.
// =============================================================================

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::info;

use crate::pipeline_context::PipelineContext;
use crate::ports::{NotifierMessage, NotifierPort};
use crate::providers::birdeye::BirdeyeProvider;
use crate::providers::coingecko::CoinGeckoProvider;
use crate::types::{Candidate, CandidateSource};

pub struct LookbackSweeper {
    birdeye: Arc<BirdeyeProvider>,
    coingecko: Arc<CoinGeckoProvider>,
    chain: String,
    limit: u32,
    seen: Mutex<HashSet<String>>,
}

impl LookbackSweeper {
    pub fn new(birdeye: Arc<BirdeyeProvider>, coingecko: Arc<CoinGeckoProvider>, chain: impl Into<String>, limit: u32) -> Self {
        Self {
            birdeye,
            coingecko,
            chain: chain.into(),
            limit,
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub async fn run(&self, ctx: Arc<PipelineContext>) {
        let interval = Duration::from_secs(ctx.config.lookback_interval_sec);
        let window = Duration::from_secs(ctx.config.lookback_window_sec);
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.sweep(&ctx, window).await;
        }
    }

    async fn sweep(&self, ctx: &Arc<PipelineContext>, window: Duration) {
        let now_ms = now_millis();
        let window_ms = window.as_millis() as i64;

        let new_listings = self.birdeye.fetch_new_listings(&self.chain, self.limit).await;
        let trending = self.birdeye.fetch_trending(&self.chain, self.limit).await;
        let recently_added = self.coingecko.fetch_recently_added(self.limit as usize).await;

        let mut enqueued = 0usize;
        for token in new_listings {
            if self.within_window(token.created_time, now_ms, window_ms) {
                self.maybe_enqueue(ctx, &token.mint, CandidateSource::LookbackNewListing, &mut enqueued);
            }
        }
        for token in trending {
            if self.within_window(token.created_time, now_ms, window_ms) {
                self.maybe_enqueue(ctx, &token.mint, CandidateSource::LookbackTrending, &mut enqueued);
            }
        }
        for coin in recently_added {
            if self.within_window(coin.created_time, now_ms, window_ms) {
                self.maybe_enqueue(ctx, &coin.mint, CandidateSource::LookbackNewListing, &mut enqueued);
            }
        }

        if enqueued > 0 {
            info!(enqueued, "lookback sweep enqueued candidates");
        }
    }

    /// Inclusive window check: a missing `created_time` is treated as fresh
    /// enough to include (the lists are already scoped to "new"/"trending").
    fn within_window(&self, created_time: Option<i64>, now_ms: i64, window_ms: i64) -> bool {
        match created_time {
            Some(ts) => (now_ms - ts) <= window_ms,
            None => true,
        }
    }

    fn maybe_enqueue(&self, ctx: &Arc<PipelineContext>, mint: &str, source: CandidateSource, enqueued: &mut usize) {
        if !self.seen.lock().insert(mint.to_string()) {
            return;
        }
        if ctx.enqueue_candidate(Candidate::new(mint, source)) {
            *enqueued += 1;
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Emits an uptime/throughput/queue-depth notification every 30 minutes.
pub async fn run_status_digest(ctx: Arc<PipelineContext>, notifier: Option<Arc<dyn NotifierPort>>, chat_id: String) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1800));
    loop {
        ticker.tick().await;
        let Some(notifier) = &notifier else { continue };
        let uptime_min = ctx.start_time.elapsed().as_secs() / 60;
        let processed = ctx.processed.load(Ordering::Relaxed);
        let dropped = ctx.queue_dropped.load(Ordering::Relaxed);
        let text = format!(
            "Status digest: uptime {uptime_min}m, processed {processed}, queue_dropped {dropped}, \
             queue_depth {}/{}, active_retries {}",
            ctx.queue_depth(),
            ctx.queue_capacity(),
            ctx.active_retries(),
        );
        let _ = notifier.send(NotifierMessage::new(chat_id.clone(), text)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweeper() -> LookbackSweeper {
        let client = reqwest::Client::new();
        let birdeye = Arc::new(BirdeyeProvider::new(client.clone(), "https://example.invalid", None));
        let coingecko = Arc::new(CoinGeckoProvider::new(client, "https://example.invalid", None));
        LookbackSweeper::new(birdeye, coingecko, "solana", 20)
    }

    #[test]
    fn missing_created_time_is_treated_as_within_window() {
        let s = sweeper();
        assert!(s.within_window(None, 1_000_000, 5_400_000));
    }

    #[test]
    fn boundary_age_is_inclusive() {
        let s = sweeper();
        assert!(s.within_window(Some(0), 5_400_000, 5_400_000));
        assert!(!s.within_window(Some(0), 5_400_001, 5_400_000));
    }

    #[test]
    fn dedup_set_prevents_repeat_enqueue() {
        let s = sweeper();
        assert!(s.seen.lock().insert("MintA".to_string()));
        assert!(!s.seen.lock().insert("MintA".to_string()));
    }
}
