// =============================================================================
// WSProducer — Helius logsSubscribe client (C4)
// =============================================================================
//
// Generalizes `market_data/trade_stream.rs`'s `connect_async` + split-stream
// reconnect shape (there wired to a Binance trade feed) into a Solana
// `logsSubscribe` client. Reconnect backoff, heartbeat, and the two-strategy
// mint-extraction algorithm are grounded on `_producer_loop` /
// `_try_extract_mint` / `_looks_like_pubkey` / `_is_known_program` /
// `_extract_mint_from_tx` in helius_token_scanner_bot.py (lines 802-860,
// 2387-2460).
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::pipeline_context::PipelineContext;
use crate::ports::TransactionLookupPort;
use crate::types::{Candidate, CandidateSource};

/// Fixed deny list of well-known Solana program/system addresses that can
/// never themselves be the newly created mint (spec.md §4.4 step 3).
const KNOWN_PROGRAMS: &[&str] = &[
    "11111111111111111111111111111111",           // System Program
    "ComputeBudget111111111111111111111111111111", // Compute Budget
    "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",  // SPL Token program
    "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb",  // Token-2022 program
    "SysvarRent111111111111111111111111111111111", // Rent sysvar
    "Memo1UhkJRfHyvLMcVucJwxXeuD728EqVDDwQDxFMNo",  // Memo program
    "Vote111111111111111111111111111111111111111", // Vote program
    "SysvarC1ock11111111111111111111111111111111", // Clock sysvar
    "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL", // Associated Token Account program
];

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

pub fn looks_like_pubkey(s: &str) -> bool {
    (32..=44).contains(&s.len()) && s.chars().all(|c| BASE58_ALPHABET.contains(c))
}

fn is_known_program(addr: &str) -> bool {
    KNOWN_PROGRAMS.contains(&addr)
}

/// Scans whitespace-delimited log tokens for a base58 address that isn't a
/// known system/program address.
fn extract_mint_heuristic(logs: &[String]) -> Option<String> {
    for line in logs {
        for token in line.split(|c: char| c.is_whitespace() || c == ':' || c == ',') {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if looks_like_pubkey(token) && !is_known_program(token) {
                return Some(token.to_string());
            }
        }
    }
    None
}

fn extract_mint_from_tx(tx: &Value) -> Option<String> {
    let post_balances = tx.get("meta")?.get("postTokenBalances")?.as_array()?;
    let mints: Vec<&str> = post_balances
        .iter()
        .filter_map(|b| b.get("mint").and_then(Value::as_str))
        .collect();
    let distinct: std::collections::HashSet<&str> = mints.iter().copied().collect();
    if distinct.len() == 1 {
        return distinct.into_iter().next().map(String::from);
    }

    let account_keys = tx
        .get("transaction")?
        .get("message")?
        .get("accountKeys")?
        .as_array()?;
    account_keys
        .iter()
        .filter_map(Value::as_str)
        .find(|addr| !is_known_program(addr))
        .map(String::from)
}

pub struct WsProducer {
    ws_url: String,
    program_ids: Vec<String>,
    rpc: Option<Arc<dyn TransactionLookupPort>>,
}

impl WsProducer {
    pub fn new(ws_url: impl Into<String>, program_ids: Vec<String>, rpc: Option<Arc<dyn TransactionLookupPort>>) -> Self {
        Self {
            ws_url: ws_url.into(),
            program_ids,
            rpc,
        }
    }

    pub async fn run(&self, ctx: Arc<PipelineContext>) {
        let mut backoff = Duration::from_secs(15);
        loop {
            match self.run_once(&ctx).await {
                Ok(()) => info!("helius logs stream closed cleanly, reconnecting"),
                Err(e) => warn!(error = %e, "helius logs stream error, reconnecting"),
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(Duration::from_secs(60));
        }
    }

    async fn run_once(&self, ctx: &Arc<PipelineContext>) -> anyhow::Result<()> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(&self.ws_url).await?;
        let (mut write, mut read) = ws_stream.split();
        info!(url = %self.ws_url, programs = ?self.program_ids, "connected to helius logs stream");

        for (idx, program_id) in self.program_ids.iter().enumerate() {
            let frame = json!({
                "jsonrpc": "2.0",
                "id": idx + 1,
                "method": "logsSubscribe",
                "params": [{"mentions": [program_id]}, {"commitment": "confirmed"}],
            });
            write.send(Message::Text(frame.to_string())).await?;
        }

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
            self.handle_notification(ctx, &envelope).await;
        }
    }

    async fn handle_notification(&self, ctx: &Arc<PipelineContext>, envelope: &Value) {
        let value = envelope
            .pointer("/params/result/value")
            .cloned()
            .unwrap_or(Value::Null);
        let signature = value.get("signature").and_then(Value::as_str).map(String::from);
        let logs: Vec<String> = value
            .get("logs")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default();

        let has_init_mint = logs.iter().any(|l| l.contains("InitializeMint"));
        if !has_init_mint {
            return;
        }

        let mut mint = extract_mint_heuristic(&logs);
        if mint.is_none() {
            if let (Some(sig), Some(rpc)) = (&signature, &self.rpc) {
                match rpc.get_transaction(sig).await {
                    Ok(tx) => mint = extract_mint_from_tx(&tx),
                    Err(e) => debug!(signature = %sig, error = %e, "rpc getTransaction fallback failed"),
                }
            }
        }

        let Some(mint) = mint else {
            debug!(signature = ?signature, "could not extract mint from InitializeMint log");
            return;
        };

        let mut candidate = Candidate::new(mint, CandidateSource::HeliusLogs);
        if let Some(sig) = signature {
            candidate = candidate.with_signature(sig);
        }
        if !ctx.enqueue_candidate(candidate) {
            warn!("event queue full, dropped helius candidate");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_heuristic_rejects_known_programs() {
        assert!(!is_known_program("RandomMint11111111111111111111111111111"));
        assert!(is_known_program("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"));
    }

    #[test]
    fn looks_like_pubkey_rejects_ambiguous_chars() {
        assert!(!looks_like_pubkey("contains_0_and_O_chars_00000000"));
        assert!(looks_like_pubkey("4k3Dyjzvzp8eMZWUXbBCjEvwSkkk5uP6"));
    }

    #[test]
    fn heuristic_extraction_skips_known_programs() {
        let logs = vec![
            "Program TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA invoke [1]".to_string(),
            "Program log: InitializeMint2: mint=4k3Dyjzvzp8eMZWUXbBCjEvwSkkk5uP6".to_string(),
        ];
        assert_eq!(extract_mint_heuristic(&logs), Some("4k3Dyjzvzp8eMZWUXbBCjEvwSkkk5uP6".to_string()));
    }
}
