// =============================================================================
// CoinGecko — contract lookup, additive enrichment, and lookback lists
// =============================================================================
//
// As a ProviderPort: contract-address lookup on the `solana` platform.
// As an enricher: strictly additive metadata merge invoked by
// FallbackFetcher after a successful primary fetch (never gates a
// publish). Also serves recently-added coins to the LookbackSweeper.
// Grounded on `fetch_from_coingecko` (dex_fetchers.py) and
// `CoinGeckoEnricher` (coingecko_enricher.py).
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::providers::{get_json, DexProvider};
use crate::types::{safe_float, DexInfo, Metadata};

pub struct CoinGeckoProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn headers<'a>(&'a self, key: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![("accept", "application/json"), ("x-cg-pro-api-key", key)]
    }

    async fn fetch_contract(&self, mint: &str, timeout: Duration) -> Result<Value, String> {
        let key = self.api_key.as_deref().ok_or_else(|| "coingecko_api_key_missing".to_string())?;
        let url = format!("{}/coins/solana/contract/{mint}", self.base_url.trim_end_matches('/'));
        get_json(&self.client, &url, &self.headers(key), timeout, 3).await
    }

    /// Strictly additive enrichment: merges symbol/name/logo/social/ATH and
    /// a `coingecko_score` bonus into `metadata`. Never downgrades a status.
    pub async fn enrich(&self, mint: &str, timeout: Duration, metadata: &mut Metadata) -> bool {
        let Ok(data) = self.fetch_contract(mint, timeout).await else {
            return false;
        };
        if data.get("error").is_some() || data.is_null() {
            return false;
        }

        let mut verified = false;
        if let Some(symbol) = data.get("symbol").and_then(Value::as_str) {
            metadata.insert("coingecko_symbol".into(), symbol.to_uppercase().into());
            verified = true;
        }
        if let Some(name) = data.get("name").and_then(Value::as_str) {
            metadata.insert("coingecko_name".into(), name.into());
        }
        if let Some(logo) = data
            .get("image")
            .and_then(|i| i.get("small").or_else(|| i.get("thumb")))
            .and_then(Value::as_str)
        {
            metadata.insert("coingecko_logo".into(), logo.into());
        }
        let links = data.get("links");
        if let Some(homepage) = links
            .and_then(|l| l.get("homepage"))
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            metadata.insert("coingecko_homepage".into(), homepage.into());
        }
        if let Some(twitter) = links
            .and_then(|l| l.get("twitter_screen_name"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            metadata.insert("coingecko_twitter".into(), twitter.into());
        }

        let market = data.get("market_data");
        if let Some(ath) = market
            .and_then(|m| m.get("ath"))
            .and_then(|a| a.get("usd"))
            .and_then(safe_float_ref)
        {
            metadata.insert("ath_usd".into(), ath.into());
        }

        let social_links = [
            metadata.contains_key("coingecko_homepage"),
            metadata.contains_key("coingecko_twitter"),
        ]
        .into_iter()
        .filter(|b| *b)
        .count();
        let mut score = 0i64;
        if verified {
            score += 10;
        }
        score += match social_links {
            0 => 0,
            1 => 2,
            _ => 5,
        };
        metadata.insert("coingecko_score".into(), score.into());

        verified
    }

    /// Symbol lookup for [`crate::symbol_resolver::SymbolResolver`]: a
    /// contract hit always carries an authoritative symbol, so this path
    /// uses the higher of the two confidences the prototype applied
    /// inconsistently (spec.md §9's open question: 0.95 for contract hit).
    pub async fn resolve_symbol(&self, mint: &str, timeout: Duration) -> Option<(String, f64)> {
        let data = self.fetch_contract(mint, timeout).await.ok()?;
        let symbol = data.get("symbol").and_then(Value::as_str)?;
        Some((symbol.to_uppercase(), 0.95))
    }

    pub async fn fetch_recently_added(&self, limit: usize) -> Vec<RecentlyAdded> {
        let key = match self.api_key.as_deref() {
            Some(k) => k,
            None => return Vec::new(),
        };
        let url = format!("{}/coins/list/new", self.base_url.trim_end_matches('/'));
        let ids = match get_json(&self.client, &url, &self.headers(key), Duration::from_secs(10), 1).await {
            Ok(Value::Array(items)) => items
                .into_iter()
                .filter_map(|c| {
                    let has_solana = c.get("platforms").and_then(|p| p.get("solana")).is_some();
                    has_solana.then(|| c.get("id").and_then(Value::as_str).map(String::from))?
                })
                .take(limit)
                .collect::<Vec<_>>(),
            _ => return Vec::new(),
        };

        let mut out = Vec::new();
        for id in ids {
            let coin_url = format!("{}/coins/{id}", self.base_url.trim_end_matches('/'));
            if let Ok(data) = get_json(&self.client, &coin_url, &self.headers(key), Duration::from_secs(8), 1).await {
                if let Some(mint) = data.get("platforms").and_then(|p| p.get("solana")).and_then(Value::as_str) {
                    out.push(RecentlyAdded {
                        mint: mint.to_string(),
                        symbol: data.get("symbol").and_then(Value::as_str).map(|s| s.to_uppercase()),
                        created_time: None,
                    });
                }
            }
        }
        out
    }
}

fn safe_float_ref(v: &Value) -> Option<f64> {
    safe_float(Some(v))
}

#[derive(Debug, Clone)]
pub struct RecentlyAdded {
    pub mint: String,
    pub symbol: Option<String>,
    pub created_time: Option<i64>,
}

#[async_trait]
impl DexProvider for CoinGeckoProvider {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch(&self, mint: &str, timeout: Duration) -> DexInfo {
        let data = match self.fetch_contract(mint, timeout).await {
            Ok(d) => d,
            Err(e) if e == "coingecko_api_key_missing" => return DexInfo::error(e),
            Err(e) => {
                debug!(mint, error = %e, "coingecko fetch failed");
                return DexInfo::error(format!("coingecko_http:{e}"));
            }
        };
        if data.is_null() || data.get("error").is_some() {
            let msg = data
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("coingecko_empty")
                .to_string();
            return DexInfo::not_found(msg);
        }

        let name = data.get("name").and_then(Value::as_str).unwrap_or("coingecko").to_string();
        let mut reason = "coingecko_ok".to_string();
        let tvl = data
            .get("market_data")
            .and_then(|m| m.get("total_value_locked").or_else(|| m.get("total_volume").and_then(|v| v.get("usd"))))
            .and_then(safe_float_ref);
        if let Some(tvl) = tvl {
            reason.push_str(&format!("_tvl:{tvl:.0}"));
        }

        DexInfo {
            status: Some(crate::types::DexStatus::Ok),
            dex_name: Some(name),
            pair_address: None,
            alt_pairs: Vec::new(),
            reason: Some(reason),
            metadata: Metadata::new(),
        }
    }
}
