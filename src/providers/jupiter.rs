// =============================================================================
// Jupiter — exact-in quote to wSOL as a tradability signal
// =============================================================================
//
// Absence of routes => not_found. A response mentioning TOKEN_NOT_TRADABLE
// => not_found. Grounded on `fetch_from_jupiter` in dex_fetchers.py.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::providers::{get_json, DexProvider};
use crate::types::DexInfo;

const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

pub struct JupiterProvider {
    client: reqwest::Client,
    base_url: String,
}

impl JupiterProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DexProvider for JupiterProvider {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    async fn fetch(&self, mint: &str, timeout: Duration) -> DexInfo {
        let url = format!(
            "{}/quote?inputMint={mint}&outputMint={WSOL_MINT}&amount=1000000&slippageBps=50&swapMode=ExactIn&onlyDirectRoutes=true",
            self.base_url.trim_end_matches('/')
        );
        let body = match get_json(&self.client, &url, &[], timeout, 2).await {
            Ok(b) => b,
            Err(e) => {
                debug!(mint, error = %e, "jupiter fetch failed");
                let lower = e.to_lowercase();
                if lower.contains("token_not_tradable") || lower.contains("not tradable") {
                    return DexInfo::not_found("jupiter_token_not_tradable");
                }
                return DexInfo::error(format!("jupiter_http:{e}"));
            }
        };

        let routes = body
            .get("data")
            .or_else(|| body.get("routes"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let Some(first) = routes.first() else {
            return DexInfo::not_found("jupiter_no_routes");
        };

        let infos = first
            .get("marketInfos")
            .or_else(|| first.get("routePlan"))
            .and_then(Value::as_array);
        let Some(infos) = infos.filter(|i| !i.is_empty()) else {
            return DexInfo::ok("jupiter");
        };
        let info0 = &infos[0];
        let label = info0
            .get("amm")
            .and_then(|a| a.get("label"))
            .and_then(Value::as_str)
            .or_else(|| info0.get("label").and_then(Value::as_str))
            .unwrap_or("jupiter")
            .to_string();
        let market_id = info0
            .get("marketId")
            .or_else(|| info0.get("id"))
            .or_else(|| info0.get("poolId"))
            .and_then(Value::as_str)
            .map(String::from);

        DexInfo {
            status: Some(crate::types::DexStatus::Ok),
            dex_name: Some(label),
            pair_address: market_id,
            alt_pairs: Vec::new(),
            reason: Some("jupiter_ok".into()),
            metadata: crate::types::Metadata::new(),
        }
    }
}
