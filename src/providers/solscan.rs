// =============================================================================
// Solscan — last-resort confirmation that basic mint metadata exists
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::providers::{get_json, DexProvider};
use crate::types::DexInfo;

pub struct SolscanProvider {
    client: reqwest::Client,
    base_url: String,
}

impl SolscanProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DexProvider for SolscanProvider {
    fn name(&self) -> &'static str {
        "solscan"
    }

    async fn fetch(&self, mint: &str, timeout: Duration) -> DexInfo {
        let url = format!("{}/token/meta?tokenAddress={mint}", self.base_url.trim_end_matches('/'));
        let body = match get_json(&self.client, &url, &[("accept", "application/json")], timeout, 4).await {
            Ok(b) => b,
            Err(e) => {
                debug!(mint, error = %e, "solscan fetch failed");
                return DexInfo::error(format!("solscan_http:{e}"));
            }
        };

        let has_meta = body.get("symbol").and_then(Value::as_str).is_some()
            || body.get("name").and_then(Value::as_str).is_some()
            || body.get("mintAuthority").is_some();
        if has_meta {
            DexInfo::ok("solscan")
        } else {
            DexInfo::not_found("solscan_no_meta")
        }
    }
}
