// =============================================================================
// SolanaRpcClient — getTransaction fallback for mint extraction
// =============================================================================
//
// Implements [`TransactionLookupPort`] against the standard Solana JSON-RPC
// `getTransaction` method, used by `WsProducer` only when the base58 log
// heuristic fails to turn up a mint (spec.md §4.4 step 3).
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::ports::TransactionLookupPort;

pub struct SolanaRpcClient {
    client: reqwest::Client,
    rpc_url: String,
}

impl SolanaRpcClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            rpc_url: rpc_url.into(),
        }
    }
}

#[async_trait]
impl TransactionLookupPort for SolanaRpcClient {
    async fn get_transaction(&self, signature: &str) -> anyhow::Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getTransaction",
            "params": [signature, {"encoding": "json", "maxSupportedTransactionVersion": 0}],
        });
        let resp = self.client.post(&self.rpc_url).json(&body).send().await?;
        let payload: Value = resp.json().await?;
        payload
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("rpc response missing result field"))
    }
}
