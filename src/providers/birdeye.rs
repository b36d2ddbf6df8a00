// =============================================================================
// Birdeye — token overview + new-listing/trending lists
// =============================================================================
//
// Populates overview fields (price, liquidity, volume, fdv, holders,
// buyers_30m, price_change.*, pair_created_at) and selects the
// highest-liquidity pool among `topMarkets` for `pair_address`. Grounded on
// `fetch_from_birdeye` in the Python prototype's dex_fetchers.py.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::providers::{get_json, Buyers30mResolver, DexProvider};
use crate::types::{safe_float, DexInfo, Metadata};

pub struct BirdeyeProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl BirdeyeProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn headers<'a>(&'a self, key: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![("accept", "application/json"), ("x-api-key", key)]
    }

    fn parse_overview(payload: &Value) -> DexInfo {
        let obj = match payload.as_object() {
            Some(o) if !o.is_empty() => o,
            _ => return DexInfo::not_found("birdeye_no_data"),
        };

        let mut metadata: Metadata = Metadata::new();
        if let Some(v) = safe_float(obj.get("liquidity").or_else(|| obj.get("liquidityUsd"))) {
            metadata.insert("liquidity_usd".into(), v.into());
        }
        if let Some(v) = safe_float(
            obj.get("volume24h")
                .or_else(|| obj.get("volume24hUsd"))
                .or_else(|| obj.get("v24hUSD")),
        ) {
            metadata.insert("volume_24h_usd".into(), v.into());
        }
        if let Some(v) = safe_float(obj.get("price")) {
            metadata.insert("price_usd".into(), v.into());
        }
        if let Some(v) = safe_float(obj.get("fdv").or_else(|| obj.get("fullyDilutedValuation"))) {
            metadata.insert("fdv".into(), v.into());
        }
        if let Some(v) = safe_float(obj.get("marketCap").or_else(|| obj.get("mc"))) {
            metadata.insert("market_cap".into(), v.into());
        }
        if let Some(v) = safe_float(obj.get("holders").or_else(|| obj.get("holder"))) {
            metadata.insert("holders".into(), (v as i64).into());
        }
        if let Some(v) = safe_float(
            obj.get("buyers30m")
                .or_else(|| obj.get("uniqueBuyers30m"))
                .or_else(|| obj.get("txnBuyerCount30m")),
        ) {
            metadata.insert("buyers_30m".into(), (v as i64).into());
        }
        if let Some(symbol) = obj.get("symbol").and_then(Value::as_str) {
            metadata.insert("base_symbol".into(), symbol.to_uppercase().into());
        }
        if let Some(name) = obj.get("name").and_then(Value::as_str) {
            metadata.insert("name".into(), name.into());
        }

        let mut price_change = serde_json::Map::new();
        for (key, field) in [
            ("m5", "priceChange5mPercent"),
            ("h1", "priceChange1hPercent"),
            ("h6", "priceChange6hPercent"),
            ("h24", "priceChange24hPercent"),
        ] {
            if let Some(v) = safe_float(obj.get(field)) {
                price_change.insert(key.into(), v.into());
            }
        }
        if !price_change.is_empty() {
            metadata.insert("price_change".into(), Value::Object(price_change));
        }

        if let Some(v) = safe_float(
            obj.get("createdAt")
                .or_else(|| obj.get("createdTime"))
                .or_else(|| obj.get("launchTime")),
        ) {
            let ms = if v > 1e12 { v } else { v * 1000.0 };
            metadata.insert("pair_created_at".into(), ms.into());
        }

        // Pick the highest-liquidity pool for pair_address (spec §4.2).
        let mut pair_address = None;
        let mut alt_pairs = Vec::new();
        let mut dex_name = obj
            .get("dexId")
            .and_then(Value::as_str)
            .unwrap_or("birdeye")
            .to_string();
        if let Some(pools) = obj
            .get("topMarkets")
            .or_else(|| obj.get("markets"))
            .and_then(Value::as_array)
        {
            let mut sorted: Vec<&Value> = pools.iter().collect();
            sorted.sort_by(|a, b| {
                let la = safe_float(a.get("liquidity")).unwrap_or(0.0);
                let lb = safe_float(b.get("liquidity")).unwrap_or(0.0);
                lb.partial_cmp(&la).unwrap_or(std::cmp::Ordering::Equal)
            });
            for (idx, pool) in sorted.iter().enumerate() {
                let addr = pool
                    .get("pairAddress")
                    .or_else(|| pool.get("address"))
                    .and_then(Value::as_str);
                if let Some(addr) = addr {
                    if pair_address.is_none() {
                        pair_address = Some(addr.to_string());
                    } else {
                        alt_pairs.push(addr.to_string());
                    }
                }
                if idx == 0 {
                    if let Some(d) = pool.get("dex").and_then(Value::as_str) {
                        dex_name = d.to_string();
                    }
                }
            }
        }

        DexInfo {
            status: Some(crate::types::DexStatus::Ok),
            dex_name: Some(dex_name),
            pair_address,
            alt_pairs,
            reason: Some("birdeye_ok".into()),
            metadata,
        }
    }
}

#[async_trait]
impl DexProvider for BirdeyeProvider {
    fn name(&self) -> &'static str {
        "birdeye"
    }

    async fn fetch(&self, mint: &str, timeout: Duration) -> DexInfo {
        let Some(key) = self.api_key.as_deref() else {
            return DexInfo::error("birdeye_api_key_missing");
        };
        let url = format!("{}/defi/token_overview?address={mint}", self.base_url.trim_end_matches('/'));
        match get_json(&self.client, &url, &self.headers(key), timeout, 3).await {
            Ok(body) => {
                let payload = body.get("data").cloned().unwrap_or(Value::Null);
                Self::parse_overview(&payload)
            }
            Err(e) => {
                debug!(mint, error = %e, "birdeye fetch failed");
                DexInfo::error(format!("birdeye_http:{e}"))
            }
        }
    }
}

#[async_trait]
impl Buyers30mResolver for BirdeyeProvider {
    async fn resolve(&self, mint: &str, timeout: Duration) -> Option<i64> {
        let info = self.fetch(mint, timeout).await;
        info.metadata.get("buyers_30m").and_then(Value::as_i64)
    }
}

impl BirdeyeProvider {
    /// Symbol backfill for the SymbolResolver (spec.md §4.11): Birdeye's
    /// overview carries a `symbol` field directly, fixed at confidence 0.7.
    pub async fn resolve_symbol(&self, mint: &str, timeout: Duration) -> Option<(String, f64)> {
        let info = self.fetch(mint, timeout).await;
        let symbol = info.metadata.get("base_symbol").and_then(Value::as_str)?;
        Some((symbol.to_uppercase(), 0.7))
    }
}

/// A single entry from Birdeye's new-listing or trending list, used by the
/// [`crate::lookback_sweeper::LookbackSweeper`].
#[derive(Debug, Clone)]
pub struct ListedToken {
    pub mint: String,
    pub created_time: Option<i64>,
}

impl BirdeyeProvider {
    pub async fn fetch_new_listings(&self, chain: &str, limit: u32) -> Vec<ListedToken> {
        let Some(key) = self.api_key.as_deref() else {
            return Vec::new();
        };
        let url = format!(
            "{}/defi/v2/tokens/new_listing?chain={chain}&limit={limit}",
            self.base_url.trim_end_matches('/')
        );
        self.fetch_listing(&url, key).await
    }

    pub async fn fetch_trending(&self, chain: &str, limit: u32) -> Vec<ListedToken> {
        let Some(key) = self.api_key.as_deref() else {
            return Vec::new();
        };
        let url = format!(
            "{}/defi/token_trending?chain={chain}&limit={limit}",
            self.base_url.trim_end_matches('/')
        );
        self.fetch_listing(&url, key).await
    }

    async fn fetch_listing(&self, url: &str, key: &str) -> Vec<ListedToken> {
        match get_json(&self.client, url, &self.headers(key), Duration::from_secs(10), 2).await {
            Ok(body) => {
                let items = body
                    .get("data")
                    .and_then(|d| d.get("tokens").or_else(|| d.get("items")))
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                items
                    .into_iter()
                    .filter_map(|it| {
                        let mint = it.get("address").and_then(Value::as_str)?.to_string();
                        let created_time = it
                            .get("createdTime")
                            .or_else(|| it.get("liquidityAddedAt"))
                            .and_then(safe_float_opt);
                        Some(ListedToken {
                            mint,
                            created_time: created_time.map(|v| v as i64),
                        })
                    })
                    .collect()
            }
            Err(e) => {
                debug!(error = %e, "birdeye listing fetch failed");
                Vec::new()
            }
        }
    }
}

fn safe_float_opt(v: &Value) -> Option<f64> {
    safe_float(Some(v))
}
