// =============================================================================
// DexScreener — highest-liquidity Solana pair, with activity gate
// =============================================================================
//
// Primary: /latest/dex/tokens/{mint}. Fallback: /latest/dex/search?q={mint}
// filtered to chainId=solana and baseToken.address=mint. A pair is only
// accepted if it shows trading signs (m5 trades > 0 AND m5 distinct buyers
// > 0); otherwise `not_found` with reason `dexscreener_low_activity`.
// Grounded on `fetch_from_dexscreener` in dex_fetchers.py.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::providers::{get_json, Buyers30mResolver, DexProvider};
use crate::types::{safe_float, DexInfo, DexStatus, Metadata};

pub struct DexScreenerProvider {
    client: reqwest::Client,
    base_url: String,
}

impl DexScreenerProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn pairs_for(&self, mint: &str, timeout: Duration) -> Result<Vec<Value>, String> {
        let url = format!("{}/tokens/{mint}", self.base_url.trim_end_matches('/'));
        let primary = get_json(&self.client, &url, &[], timeout, 2).await;
        let pairs = match &primary {
            Ok(body) => body.get("pairs").and_then(Value::as_array).cloned().unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        if !pairs.is_empty() {
            return Ok(pairs);
        }

        let search_url = format!("{}/search?q={mint}", self.base_url.trim_end_matches('/'));
        let search = get_json(&self.client, &search_url, &[], timeout, 2).await?;
        let candidates: Vec<Value> = search
            .get("pairs")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter(|p| {
                        let chain_ok = p
                            .get("chainId")
                            .and_then(Value::as_str)
                            .map(|c| c.eq_ignore_ascii_case("solana"))
                            .unwrap_or(true);
                        let addr_ok = p
                            .get("baseToken")
                            .and_then(|b| b.get("address"))
                            .and_then(Value::as_str)
                            .map(|a| a == mint)
                            .unwrap_or(false);
                        chain_ok && addr_ok
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(candidates)
    }
}

#[async_trait]
impl DexProvider for DexScreenerProvider {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn fetch(&self, mint: &str, timeout: Duration) -> DexInfo {
        let pairs = match self.pairs_for(mint, timeout).await {
            Ok(p) if !p.is_empty() => p,
            Ok(_) => return DexInfo::not_found("dexscreener_no_pairs"),
            Err(e) => {
                debug!(mint, error = %e, "dexscreener fetch failed");
                return DexInfo::error(format!("dexscreener_http:{e}"));
            }
        };

        let mut best: Option<&Value> = None;
        let mut best_liq = -1.0_f64;
        let mut alt_pairs = Vec::new();
        let mut saw_low_activity = false;

        for pair in &pairs {
            let chain_ok = pair
                .get("chainId")
                .and_then(Value::as_str)
                .map(|c| c.eq_ignore_ascii_case("solana"))
                .unwrap_or(true);
            if !chain_ok {
                continue;
            }
            let liq = safe_float(pair.get("liquidity").and_then(|l| l.get("usd"))).unwrap_or(0.0);
            let m5 = pair.get("txns").and_then(|t| t.get("m5"));
            let buys = m5.and_then(|m| m.get("buys")).and_then(Value::as_i64).unwrap_or(0);
            let sells = m5.and_then(|m| m.get("sells")).and_then(Value::as_i64).unwrap_or(0);
            let trades5m = buys + sells;
            let buyers5m = pair
                .get("buyers")
                .and_then(|b| b.get("m5"))
                .and_then(Value::as_i64)
                .unwrap_or(0);

            if trades5m < 1 || buyers5m < 1 {
                saw_low_activity = true;
                continue;
            }
            if let Some(addr) = pair.get("pairAddress").and_then(Value::as_str) {
                alt_pairs.push(addr.to_string());
            }
            if liq > best_liq {
                best_liq = liq;
                best = Some(pair);
            }
        }

        let Some(best) = best else {
            return if saw_low_activity {
                DexInfo::not_found("dexscreener_low_activity")
            } else {
                DexInfo::not_found("dexscreener_no_pairs")
            };
        };

        let mut metadata: Metadata = Metadata::new();
        if let Some(v) = safe_float(best.get("priceUsd")) {
            metadata.insert("price_usd".into(), v.into());
        }
        if let Some(v) = safe_float(best.get("fdv")) {
            metadata.insert("fdv".into(), v.into());
        }
        if let Some(v) = safe_float(best.get("marketCap")) {
            metadata.insert("market_cap".into(), v.into());
        }
        if let Some(v) = safe_float(best.get("liquidity").and_then(|l| l.get("usd"))) {
            metadata.insert("liquidity_usd".into(), v.into());
        }
        if let Some(v) = safe_float(best.get("volume").and_then(|vv| vv.get("h24"))) {
            metadata.insert("volume_24h_usd".into(), v.into());
        }
        if let Some(base_token) = best.get("baseToken") {
            if let Some(symbol) = base_token.get("symbol").and_then(Value::as_str) {
                metadata.insert("base_symbol".into(), symbol.into());
            }
            if let Some(decimals) = base_token.get("decimals").and_then(Value::as_i64) {
                metadata.insert("decimals".into(), decimals.into());
            }
        }
        if let Some(created) = safe_float(best.get("pairCreatedAt")) {
            metadata.insert("pair_created_at".into(), created.into());
        }
        let mut price_change = serde_json::Map::new();
        if let Some(pc) = best.get("priceChange").and_then(Value::as_object) {
            for key in ["m5", "h1", "h6", "h24"] {
                if let Some(v) = safe_float(pc.get(key)) {
                    price_change.insert(key.into(), v.into());
                }
            }
        }
        if !price_change.is_empty() {
            metadata.insert("price_change".into(), Value::Object(price_change));
        }
        if let Some(h24) = best.get("txns").and_then(|t| t.get("h24")) {
            let buys = h24.get("buys").and_then(Value::as_i64).unwrap_or(0);
            let sells = h24.get("sells").and_then(Value::as_i64).unwrap_or(0);
            metadata.insert("trades_24h".into(), (buys + sells).into());
        }

        let pair_address = best.get("pairAddress").and_then(Value::as_str).map(String::from);
        if let Some(addr) = &pair_address {
            alt_pairs.retain(|p| p != addr);
        }
        let dex_name = best
            .get("dexId")
            .and_then(Value::as_str)
            .unwrap_or("dexscreener")
            .to_string();

        DexInfo {
            status: Some(DexStatus::Ok),
            dex_name: Some(dex_name),
            pair_address,
            alt_pairs,
            reason: Some("dexscreener_ok".into()),
            metadata,
        }
    }
}

/// Backfills `buyers_30m` from the best pair's 5-minute distinct-buyer count
/// (spec.md §4.3's backfill note names this as one of the two concrete
/// sources, the other being Birdeye's overview field).
#[async_trait]
impl Buyers30mResolver for DexScreenerProvider {
    async fn resolve(&self, mint: &str, timeout: Duration) -> Option<i64> {
        let pairs = self.pairs_for(mint, timeout).await.ok()?;
        pairs
            .iter()
            .filter_map(|p| p.get("buyers").and_then(|b| b.get("m5")).and_then(Value::as_i64))
            .max()
    }
}
