// =============================================================================
// ProviderPort — one client per external market-data source
// =============================================================================
//
// Every provider normalizes its own response schema into the metadata keys
// listed in the data model: price_usd, liquidity_usd, volume_24h_usd, fdv,
// market_cap, holders, buyers_30m, trades_24h, last_trade_minutes,
// pair_created_at, price_change.{m5,h1,h6,h24}, supply, decimals,
// base_symbol, resolved_symbol, coingecko_score, coingecko_symbol.
// =============================================================================

pub mod birdeye;
pub mod coingecko;
pub mod dexscreener;
pub mod jupiter;
pub mod solscan;

use std::time::Duration;

use async_trait::async_trait;

use crate::types::DexInfo;

/// Contract implemented once per external data source (spec §4.2).
#[async_trait]
pub trait DexProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, mint: &str, timeout: Duration) -> DexInfo;
}

/// Backfills `buyers_30m` from an alternative source when the primary
/// fallback chain's winning result didn't carry it (spec §4.3, last
/// paragraph).
#[async_trait]
pub trait Buyers30mResolver: Send + Sync {
    async fn resolve(&self, mint: &str, timeout: Duration) -> Option<i64>;
}

/// Shared GET-JSON helper: bounded by `timeout`, retried with capped
/// exponential backoff, grounded on `_get_json` in the Python prototype.
pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, &str)],
    timeout: Duration,
    tries: u32,
) -> Result<serde_json::Value, String> {
    let mut backoff = Duration::from_millis(500);
    let mut last_err = String::from("unknown");
    for _ in 0..tries.max(1) {
        let mut req = client.get(url).timeout(timeout);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        match req.send().await {
            Ok(resp) if resp.status().is_success() => {
                return resp
                    .json::<serde_json::Value>()
                    .await
                    .map_err(|e| e.to_string());
            }
            Ok(resp) => {
                last_err = format!("http_{}", resp.status().as_u16());
            }
            Err(e) => {
                last_err = e.to_string();
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(Duration::from_secs(3));
    }
    Err(last_err)
}
