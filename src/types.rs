// =============================================================================
// Shared types used across the mint discovery pipeline
// =============================================================================

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A SPL token mint address. Kept as a plain `String` rather than a newtype
/// so it round-trips through JSON/log text without extra parsing machinery;
/// validity is established by [`looks_like_pubkey`](crate::ws_producer::looks_like_pubkey)
/// at the point a mint is first extracted, not re-checked on every pass.
pub type Mint = String;

/// Where a candidate was first observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    HeliusLogs,
    Raydium,
    Orca,
    Pumpfun,
    LookbackNewListing,
    LookbackTrending,
    External,
}

impl std::fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::HeliusLogs => "helius_logs",
            Self::Raydium => "raydium",
            Self::Orca => "orca",
            Self::Pumpfun => "pumpfun",
            Self::LookbackNewListing => "lookback_new_listing",
            Self::LookbackTrending => "lookback_trending",
            Self::External => "external",
        };
        write!(f, "{s}")
    }
}

impl CandidateSource {
    pub fn is_pump(&self) -> bool {
        matches!(self, Self::Pumpfun)
    }
}

/// One item pulled through the event queue.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Per-candidate tracing id, stable across the first pass and every
    /// retry attempt for the same evaluation; logged to correlate a
    /// `summary`/`summary_retry` chain without re-keying on the mint string.
    pub trace_id: Uuid,
    pub mint: Mint,
    pub signature: Option<String>,
    pub symbol_hint: Option<String>,
    pub source: CandidateSource,
    pub received_at: Instant,
    /// A cheap, non-authoritative liquidity estimate from a pool-watcher's
    /// regex scan of a "reserve" log line. Seeds `metadata.liquidity_usd`
    /// only when no provider fetch supplies one; never gates a decision
    /// itself (spec.md §4.5 names no liquidity threshold for pool events).
    pub liquidity_hint: Option<f64>,
}

impl Candidate {
    pub fn new(mint: impl Into<String>, source: CandidateSource) -> Self {
        let mint = mint.into();
        Self {
            trace_id: Uuid::new_v4(),
            symbol_hint: Some(placeholder_symbol(&mint)),
            mint,
            signature: None,
            source,
            received_at: Instant::now(),
            liquidity_hint: None,
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_symbol_hint(mut self, symbol: impl Into<String>) -> Self {
        self.symbol_hint = Some(symbol.into());
        self
    }

    pub fn with_liquidity_hint(mut self, liquidity_usd: f64) -> Self {
        self.liquidity_hint = Some(liquidity_usd);
        self
    }
}

/// Synthetic placeholder symbol used until an authoritative one resolves.
pub fn placeholder_symbol(mint: &str) -> String {
    let prefix: String = mint.chars().take(6).collect();
    format!("TOKEN_{prefix}")
}

pub fn is_placeholder_symbol(symbol: &str) -> bool {
    let up = symbol.to_ascii_uppercase();
    up.starts_with("TOKEN_") || up == "UNKNOWN" || up == "N/A" || up.is_empty()
}

/// Outcome of a single provider fetch, normalized across sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DexStatus {
    Ok,
    Pending,
    NotFound,
    Error,
}

impl std::fmt::Display for DexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Pending => "pending",
            Self::NotFound => "not_found",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// A tagged metadata map. Values are heterogeneous (numbers, strings,
/// nested objects) across providers, so we keep them as [`serde_json::Value`]
/// and push all numeric coercion through [`MetadataExt::get_f64`] rather than
/// typing every provider's schema individually.
pub type Metadata = HashMap<String, Value>;

/// Typed, presence-preserving accessors over a [`Metadata`] map. Absence is
/// always `None`; a present-but-unparsable value is also `None` — callers
/// branch on presence, never on "zero vs missing".
pub trait MetadataExt {
    fn get_f64(&self, key: &str) -> Option<f64>;
    fn get_i64(&self, key: &str) -> Option<i64>;
    fn get_str(&self, key: &str) -> Option<&str>;
    fn get_map(&self, key: &str) -> Option<&serde_json::Map<String, Value>>;
}

impl MetadataExt for Metadata {
    fn get_f64(&self, key: &str) -> Option<f64> {
        safe_float(self.get(key))
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn get_map(&self, key: &str) -> Option<&serde_json::Map<String, Value>> {
        self.get(key).and_then(Value::as_object)
    }
}

/// Coerce a loosely-typed JSON value (number or numeric string) into an
/// `f64`, returning `None` on any other shape or parse failure. Every
/// provider funnels its numeric fields through this single helper so the
/// qualifier's "absent vs present" branching stays uniform.
pub fn safe_float(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Producer-agnostic provider result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DexInfo {
    pub status: Option<DexStatus>,
    pub dex_name: Option<String>,
    pub pair_address: Option<String>,
    #[serde(default)]
    pub alt_pairs: Vec<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DexInfo {
    pub fn ok(dex_name: impl Into<String>) -> Self {
        Self {
            status: Some(DexStatus::Ok),
            dex_name: Some(dex_name.into()),
            ..Default::default()
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self {
            status: Some(DexStatus::NotFound),
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: Some(DexStatus::Error),
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn pending(reason: impl Into<String>) -> Self {
        Self {
            status: Some(DexStatus::Pending),
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, Some(DexStatus::Ok))
    }

    /// An `Ok` result is only *useful* if it carries liquidity or volume; a
    /// provider that confirms existence but nothing tradable is treated as
    /// insufficient and the fan-out keeps going (spec step 3 of C3).
    pub fn has_market_signal(&self) -> bool {
        self.metadata.get_f64("liquidity_usd").is_some() || self.metadata.get_f64("volume_24h_usd").is_some()
    }
}

/// Final decision for a qualification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Publish,
    Drop,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Publish => "publish",
            Self::Drop => "drop",
        };
        write!(f, "{s}")
    }
}

/// Emitted once per qualification pass (and once more per retry attempt,
/// tagged via `evt`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub evt: &'static str,
    pub mint: Mint,
    pub symbol: String,
    pub source: CandidateSource,
    pub dex_status: DexStatus,
    pub dex_reason: String,
    pub dex_name: Option<String>,
    pub pair_address: Option<String>,
    #[serde(default)]
    pub alt_pairs: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub liquidity_usd: Option<f64>,
    pub decision: Option<Decision>,
    pub score: Option<f64>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub rug_alert: bool,
    pub blacklisted_until: Option<i64>,
    pub resolved_symbol: Option<String>,
    pub symbol_confidence: Option<f64>,
    #[serde(default)]
    pub attempt: u32,
}

impl Summary {
    pub fn from_fetch(candidate: &Candidate, info: &DexInfo) -> Self {
        let mut metadata = info.metadata.clone();
        if !metadata.contains_key("liquidity_usd") {
            if let Some(liq) = candidate.liquidity_hint {
                metadata.insert("liquidity_usd".into(), liq.into());
            }
        }
        let liquidity_usd = metadata.get_f64("liquidity_usd");
        Self {
            evt: "summary",
            mint: candidate.mint.clone(),
            symbol: candidate
                .symbol_hint
                .clone()
                .unwrap_or_else(|| placeholder_symbol(&candidate.mint)),
            source: candidate.source,
            dex_status: info.status.unwrap_or(DexStatus::Pending),
            dex_reason: info.reason.clone().unwrap_or_default(),
            dex_name: info.dex_name.clone(),
            pair_address: info.pair_address.clone(),
            alt_pairs: info.alt_pairs.clone(),
            metadata,
            liquidity_usd,
            decision: None,
            score: None,
            notes: Vec::new(),
            rug_alert: false,
            blacklisted_until: None,
            resolved_symbol: None,
            symbol_confidence: None,
            attempt: 0,
        }
    }
}

/// Circuit breaker lifecycle state (C1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_symbol_is_detected() {
        assert!(is_placeholder_symbol("TOKEN_ab12cd"));
        assert!(is_placeholder_symbol("unknown"));
        assert!(!is_placeholder_symbol("BONK"));
    }

    #[test]
    fn safe_float_coerces_numeric_strings() {
        let v = Value::String("12.5".to_string());
        assert_eq!(safe_float(Some(&v)), Some(12.5));
        let bad = Value::String("nope".to_string());
        assert_eq!(safe_float(Some(&bad)), None);
    }

    #[test]
    fn metadata_ext_reads_presence_correctly() {
        let mut m: Metadata = HashMap::new();
        m.insert("liquidity_usd".into(), Value::from(1000.0));
        assert_eq!(m.get_f64("liquidity_usd"), Some(1000.0));
        assert_eq!(m.get_f64("volume_24h_usd"), None);
    }
}
