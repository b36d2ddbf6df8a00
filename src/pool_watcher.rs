// =============================================================================
// PoolWatcher — Raydium/Orca/Pump.fun pool-creation log watcher (C5)
// =============================================================================
//
// Shares `ws_producer.rs`'s `logsSubscribe` + reconnect shape but mentions DEX
// program ids instead of the SPL Token program, and classifies logs by
// keyword rather than by instruction name. Grounded on `_pool_watcher_loop` /
// `_detect_pool_event` / `_partition_base_quote` / `_estimate_liquidity_from_reserves`
// (helius_token_scanner_bot.py:900-1020).
// =============================================================================

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use crate::pipeline_context::PipelineContext;
use crate::types::{Candidate, CandidateSource};

const POOL_EVENT_KEYWORDS: &[&str] = &["initializepool", "createpool", "addliquidity", "deposit"];

/// Known quote mints: a pool event naming one of these as a leg means the
/// *other* leg is the new listing's base mint.
const QUOTE_MINTS: &[(&str, &str)] = &[
    ("So11111111111111111111111111111111111111112", "SOL"),
    ("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", "USDC"),
    ("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", "USDT"),
];

fn is_quote_mint(addr: &str) -> bool {
    QUOTE_MINTS.iter().any(|(mint, _)| *mint == addr)
}

fn detect_pool_event(logs: &[String]) -> bool {
    logs.iter().any(|l| {
        let lower = l.to_ascii_lowercase();
        POOL_EVENT_KEYWORDS.iter().any(|kw| lower.contains(kw))
    })
}

/// Splits a pair of addresses seen in a pool-creation log into (base, quote).
/// Returns `None` if neither or both legs look like a known quote mint.
fn partition_base_quote(a: &str, b: &str) -> Option<(String, String)> {
    match (is_quote_mint(a), is_quote_mint(b)) {
        (true, false) => Some((b.to_string(), a.to_string())),
        (false, true) => Some((a.to_string(), b.to_string())),
        _ => None,
    }
}

fn estimate_liquidity_usd(logs: &[String], reserve_regex: &Regex) -> Option<f64> {
    logs.iter().find_map(|l| {
        reserve_regex
            .captures(l)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    })
}

pub struct PoolWatcher {
    ws_url: String,
    source: CandidateSource,
    program_id: String,
    reserve_regex: Regex,
    seen: Mutex<HashSet<String>>,
}

impl PoolWatcher {
    pub fn new(ws_url: impl Into<String>, source: CandidateSource, program_id: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            source,
            program_id: program_id.into(),
            reserve_regex: Regex::new(r"(?i)reserve[a-z]*[:=]\s*([0-9]+(?:\.[0-9]+)?)").unwrap(),
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub async fn run(&self, ctx: Arc<PipelineContext>) {
        let mut backoff = Duration::from_secs(15);
        loop {
            match self.run_once(&ctx).await {
                Ok(()) => info!(source = %self.source, "pool watcher stream closed cleanly, reconnecting"),
                Err(e) => warn!(source = %self.source, error = %e, "pool watcher stream error, reconnecting"),
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(Duration::from_secs(60));
        }
    }

    async fn run_once(&self, ctx: &Arc<PipelineContext>) -> anyhow::Result<()> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(&self.ws_url).await?;
        let (mut write, mut read) = ws_stream.split();
        info!(url = %self.ws_url, program = %self.program_id, source = %self.source, "connected to pool watcher stream");

        let frame = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "logsSubscribe",
            "params": [{"mentions": [self.program_id]}, {"commitment": "confirmed"}],
        });
        write.send(Message::Text(frame.to_string())).await?;

        loop {
            let next = tokio::time::timeout(Duration::from_secs(30), read.next()).await;
            let msg = match next {
                Ok(Some(Ok(msg))) => msg,
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(None) => return Ok(()),
                Err(_) => {
                    write.send(Message::Ping(Vec::new())).await?;
                    continue;
                }
            };

            let Message::Text(text) = msg else { continue };
            let Ok(envelope) = serde_json::from_str::<Value>(&text) else { continue };
            if envelope.get("method").and_then(Value::as_str) != Some("logsNotification") {
                continue;
            }
            self.handle_notification(ctx, &envelope);
        }
    }

    fn handle_notification(&self, ctx: &Arc<PipelineContext>, envelope: &Value) {
        let value = envelope.pointer("/params/result/value").cloned().unwrap_or(Value::Null);
        let logs: Vec<String> = value
            .get("logs")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default();

        if !detect_pool_event(&logs) {
            return;
        }

        let mints: Vec<&str> = logs
            .iter()
            .flat_map(|l| l.split(|c: char| c.is_whitespace() || c == ':' || c == ','))
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| crate::ws_producer::looks_like_pubkey(t))
            .collect();

        let Some((base, quote)) = mints.windows(2).find_map(|w| partition_base_quote(w[0], w[1])) else {
            return;
        };

        if !self.seen.lock().insert(base.clone()) {
            return;
        }

        let mut candidate = Candidate::new(base, self.source);
        if let Some(liq) = estimate_liquidity_usd(&logs, &self.reserve_regex) {
            candidate = candidate.with_liquidity_hint(liq);
        }

        if !ctx.enqueue_candidate(candidate) {
            warn!(source = %self.source, "event queue full, dropped pool watcher candidate");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_base_and_quote_mints() {
        let usdc = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
        let base = "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk5uP6aBBBBBBBBBBB";
        assert_eq!(
            partition_base_quote(usdc, base),
            Some((base.to_string(), usdc.to_string()))
        );
        assert_eq!(partition_base_quote(base, usdc), Some((base.to_string(), usdc.to_string())));
    }

    #[test]
    fn rejects_two_quote_mints() {
        let usdc = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
        let usdt = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";
        assert_eq!(partition_base_quote(usdc, usdt), None);
    }

    #[test]
    fn detects_pool_creation_keywords_case_insensitively() {
        let logs = vec!["Program log: InitializePool2 executed".to_string()];
        assert!(detect_pool_event(&logs));
        let none = vec!["Program log: Swap executed".to_string()];
        assert!(!detect_pool_event(&none));
    }

    #[test]
    fn reserve_regex_extracts_first_numeric_reserve() {
        let re = Regex::new(r"(?i)reserve[a-z]*[:=]\s*([0-9]+(?:\.[0-9]+)?)").unwrap();
        let logs = vec!["Program log: reserveA: 12500.50".to_string()];
        assert_eq!(estimate_liquidity_usd(&logs, &re), Some(12500.50));
    }
}
