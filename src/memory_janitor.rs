// =============================================================================
// MemoryJanitor — periodic TTL eviction + gauge publication (C12)
// =============================================================================
//
// Grounded on `_cleanup_loop` / `_cleanup_memory`
// (helius_token_scanner_bot.py:1416-1439).
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::pipeline_context::PipelineContext;

pub async fn run(ctx: Arc<PipelineContext>) {
    let interval = Duration::from_secs_f64(ctx.config.memory_cleanup_interval);
    let ttl = Duration::from_secs_f64(ctx.config.liquidity_history_ttl);
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // first tick fires immediately; skip it

    let symbol_ttl = Duration::from_secs_f64(ctx.config.resolved_symbol_ttl);

    loop {
        ticker.tick().await;
        let (history_len, blacklist_len) = ctx.rug_detector.evict_expired(ttl);
        let resolved_len = ctx.evict_expired_symbols(symbol_ttl);
        metrics::gauge!("mint_scout_liquidity_history_size", history_len as f64);
        metrics::gauge!("mint_scout_blacklist_size", blacklist_len as f64);
        metrics::gauge!("mint_scout_resolved_symbols_size", resolved_len as f64);
        info!(history_len, blacklist_len, resolved_len, "memory janitor swept");
    }
}
