// =============================================================================
// RuntimeConfig — environment-driven thresholds for the pipeline
// =============================================================================
//
// Every threshold named in spec.md §4/§6 is overridable by an environment
// variable with a documented default, generalizing the teacher's
// `#[serde(default = "...")]`-per-field JSON config into env-var loading
// (grounded on `scanner_config.py`'s `_env_int`/`_env_float`/`_env_bool`
// helpers). `RuntimeConfig` itself is still `Serialize`/`Deserialize` and
// keeps the teacher's atomic tmp+rename save, reused by `PublishSink` for
// `open_positions.json` rather than for this config (spec.md names no
// config persistence requirement across restarts).
// =============================================================================

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_retry_initial_delay")]
    pub retry_initial_delay: f64,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: f64,
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay: f64,
    #[serde(default = "default_retry_fetch_timeout")]
    pub retry_fetch_timeout: f64,

    #[serde(default = "default_memory_cleanup_interval")]
    pub memory_cleanup_interval: f64,
    #[serde(default = "default_liquidity_history_ttl")]
    pub liquidity_history_ttl: f64,
    #[serde(default = "default_resolved_symbol_ttl")]
    pub resolved_symbol_ttl: f64,

    #[serde(default = "default_breaker_threshold")]
    pub breaker_failure_threshold: u32,
    #[serde(default = "default_breaker_timeout")]
    pub breaker_timeout: f64,

    /// Not wired into a hard gate (spec.md §4.8's gate list omits it,
    /// matching the prototype's final disabled state per the DESIGN.md
    /// open-question resolution); retained for env-var parity and the
    /// startup sanity warning below.
    #[serde(default = "default_min_liquidity_usd")]
    pub min_liquidity_usd: f64,
    #[serde(default = "default_min_volume24h_usd")]
    pub min_volume24h_usd: f64,
    #[serde(default = "default_min_buyers_30m")]
    pub min_buyers_30m: i64,

    #[serde(default = "default_min_age_min")]
    pub min_age_min: i64,
    #[serde(default = "default_util_min")]
    pub util_min: f64,
    #[serde(default = "default_util_max")]
    pub util_max: f64,
    #[serde(default = "default_min_publish_score")]
    pub min_publish_score: f64,

    #[serde(default = "default_pool_min_trades24h")]
    pub pool_min_trades24h: i64,
    #[serde(default = "default_pool_max_last_trade_min")]
    pub pool_max_last_trade_min: i64,
    #[serde(default = "default_enable_fdv_sanity")]
    pub enable_fdv_sanity: bool,
    #[serde(default = "default_fdv_sanity_tolerance")]
    pub fdv_sanity_tolerance: f64,

    #[serde(default = "default_buyers30m_soft_mode")]
    pub buyers30m_soft_mode: bool,
    #[serde(default = "default_strict_placeholder")]
    pub strict_placeholder: bool,
    #[serde(default = "default_placeholder_penalty")]
    pub placeholder_penalty: f64,
    #[serde(default = "default_min_symbol_len")]
    pub min_symbol_len: usize,
    #[serde(default = "default_max_symbol_len")]
    pub max_symbol_len: usize,
    #[serde(default = "default_min_symbol_confidence")]
    pub min_symbol_confidence: f64,

    #[serde(default = "default_cooldown_duration")]
    pub cooldown_duration: f64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_lookback_window_sec")]
    pub lookback_window_sec: u64,
    #[serde(default = "default_lookback_interval_sec")]
    pub lookback_interval_sec: u64,

    #[serde(default = "default_enable_raydium_watcher")]
    pub enable_raydium_watcher: bool,
    #[serde(default = "default_quote_allowlist")]
    pub quote_allowlist: Vec<String>,

    #[serde(default = "default_health_host")]
    pub health_host: String,
    #[serde(default = "default_health_port")]
    pub health_port: u16,
    #[serde(default = "default_metrics_host")]
    pub metrics_host: String,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_max_retry_attempts() -> u32 {
    4
}
fn default_retry_initial_delay() -> f64 {
    5.0
}
fn default_retry_backoff() -> f64 {
    2.0
}
fn default_retry_max_delay() -> f64 {
    60.0
}
fn default_retry_fetch_timeout() -> f64 {
    12.0
}
fn default_memory_cleanup_interval() -> f64 {
    300.0
}
fn default_liquidity_history_ttl() -> f64 {
    3600.0
}
fn default_resolved_symbol_ttl() -> f64 {
    86400.0
}
fn default_breaker_threshold() -> u32 {
    5
}
fn default_breaker_timeout() -> f64 {
    60.0
}
fn default_min_liquidity_usd() -> f64 {
    20_000.0
}
fn default_min_volume24h_usd() -> f64 {
    30_000.0
}
fn default_min_buyers_30m() -> i64 {
    7
}
fn default_min_age_min() -> i64 {
    3
}
fn default_util_min() -> f64 {
    0.3
}
fn default_util_max() -> f64 {
    8.0
}
fn default_min_publish_score() -> f64 {
    25.0
}
fn default_pool_min_trades24h() -> i64 {
    20
}
fn default_pool_max_last_trade_min() -> i64 {
    10
}
fn default_enable_fdv_sanity() -> bool {
    true
}
fn default_fdv_sanity_tolerance() -> f64 {
    0.30
}
fn default_buyers30m_soft_mode() -> bool {
    true
}
fn default_strict_placeholder() -> bool {
    false
}
fn default_placeholder_penalty() -> f64 {
    10.0
}
fn default_min_symbol_len() -> usize {
    2
}
fn default_max_symbol_len() -> usize {
    15
}
fn default_min_symbol_confidence() -> f64 {
    0.7
}
fn default_cooldown_duration() -> f64 {
    180.0
}
fn default_queue_capacity() -> usize {
    1000
}
fn default_lookback_window_sec() -> u64 {
    5400
}
fn default_lookback_interval_sec() -> u64 {
    60
}
fn default_enable_raydium_watcher() -> bool {
    true
}
fn default_quote_allowlist() -> Vec<String> {
    vec!["USDC".into(), "USDT".into(), "SOL".into()]
}
fn default_health_host() -> String {
    "0.0.0.0".into()
}
fn default_health_port() -> u16 {
    8090
}
fn default_metrics_host() -> String {
    "0.0.0.0".into()
}
fn default_metrics_port() -> u16 {
    9090
}

impl RuntimeConfig {
    /// All documented defaults, no environment overrides. Used by tests and
    /// as the fallback when `load_from_env` can't parse a value.
    pub fn from_defaults() -> Self {
        Self {
            max_retry_attempts: default_max_retry_attempts(),
            retry_initial_delay: default_retry_initial_delay(),
            retry_backoff: default_retry_backoff(),
            retry_max_delay: default_retry_max_delay(),
            retry_fetch_timeout: default_retry_fetch_timeout(),
            memory_cleanup_interval: default_memory_cleanup_interval(),
            liquidity_history_ttl: default_liquidity_history_ttl(),
            resolved_symbol_ttl: default_resolved_symbol_ttl(),
            breaker_failure_threshold: default_breaker_threshold(),
            breaker_timeout: default_breaker_timeout(),
            min_liquidity_usd: default_min_liquidity_usd(),
            min_volume24h_usd: default_min_volume24h_usd(),
            min_buyers_30m: default_min_buyers_30m(),
            min_age_min: default_min_age_min(),
            util_min: default_util_min(),
            util_max: default_util_max(),
            min_publish_score: default_min_publish_score(),
            pool_min_trades24h: default_pool_min_trades24h(),
            pool_max_last_trade_min: default_pool_max_last_trade_min(),
            enable_fdv_sanity: default_enable_fdv_sanity(),
            fdv_sanity_tolerance: default_fdv_sanity_tolerance(),
            buyers30m_soft_mode: default_buyers30m_soft_mode(),
            strict_placeholder: default_strict_placeholder(),
            placeholder_penalty: default_placeholder_penalty(),
            min_symbol_len: default_min_symbol_len(),
            max_symbol_len: default_max_symbol_len(),
            min_symbol_confidence: default_min_symbol_confidence(),
            cooldown_duration: default_cooldown_duration(),
            queue_capacity: default_queue_capacity(),
            lookback_window_sec: default_lookback_window_sec(),
            lookback_interval_sec: default_lookback_interval_sec(),
            enable_raydium_watcher: default_enable_raydium_watcher(),
            quote_allowlist: default_quote_allowlist(),
            health_host: default_health_host(),
            health_port: default_health_port(),
            metrics_host: default_metrics_host(),
            metrics_port: default_metrics_port(),
        }
    }

    /// Reads every `SCANNER_*`/`LOOKBACK_*` environment variable, falling
    /// back to the documented default on absence or parse failure.
    pub fn load_from_env() -> Self {
        let mut cfg = Self::from_defaults();

        cfg.max_retry_attempts = env_u32("SCANNER_MAX_RETRY_ATTEMPTS", cfg.max_retry_attempts);
        cfg.retry_initial_delay = env_f64("SCANNER_RETRY_INITIAL_DELAY", cfg.retry_initial_delay);
        cfg.retry_backoff = env_f64("SCANNER_RETRY_BACKOFF", cfg.retry_backoff);
        cfg.retry_max_delay = env_f64("SCANNER_RETRY_MAX_DELAY", cfg.retry_max_delay);
        cfg.retry_fetch_timeout = env_f64("SCANNER_RETRY_FETCH_TIMEOUT", cfg.retry_fetch_timeout);

        cfg.memory_cleanup_interval = env_f64("SCANNER_MEMORY_CLEANUP_INTERVAL", cfg.memory_cleanup_interval);
        cfg.liquidity_history_ttl = env_f64("SCANNER_LIQUIDITY_HISTORY_TTL", cfg.liquidity_history_ttl);
        cfg.resolved_symbol_ttl = env_f64("SCANNER_RESOLVED_SYMBOL_TTL", cfg.resolved_symbol_ttl);

        cfg.breaker_failure_threshold = env_u32("SCANNER_BREAKER_THRESHOLD", cfg.breaker_failure_threshold);
        cfg.breaker_timeout = env_f64("SCANNER_BREAKER_TIMEOUT", cfg.breaker_timeout);

        cfg.min_liquidity_usd = env_f64("SCANNER_MIN_LIQUIDITY_USD", cfg.min_liquidity_usd);
        cfg.min_volume24h_usd = env_f64("SCANNER_MIN_VOLUME24H_USD", cfg.min_volume24h_usd);
        cfg.min_buyers_30m = env_i64("SCANNER_MIN_BUYERS_30M", cfg.min_buyers_30m);

        cfg.min_age_min = env_i64("SCANNER_MIN_AGE_MIN", cfg.min_age_min);
        cfg.util_min = env_f64("SCANNER_UTIL_MIN", cfg.util_min);
        cfg.util_max = env_f64("SCANNER_UTIL_MAX", cfg.util_max);
        cfg.min_publish_score = env_f64("SCANNER_MIN_PUBLISH_SCORE", cfg.min_publish_score);

        cfg.pool_min_trades24h = env_i64("SCANNER_POOL_MIN_TRADES24H", cfg.pool_min_trades24h);
        cfg.pool_max_last_trade_min = env_i64("SCANNER_POOL_MAX_LAST_TRADE_MIN", cfg.pool_max_last_trade_min);
        cfg.enable_fdv_sanity = env_bool("SCANNER_ENABLE_FDV_SANITY", cfg.enable_fdv_sanity);
        cfg.fdv_sanity_tolerance = env_f64("SCANNER_FDV_SANITY_TOLERANCE", cfg.fdv_sanity_tolerance);

        cfg.buyers30m_soft_mode = env_bool("SCANNER_BUYERS30M_SOFT_MODE", cfg.buyers30m_soft_mode);
        cfg.strict_placeholder = env_bool("SCANNER_STRICT_PLACEHOLDER", cfg.strict_placeholder);
        cfg.placeholder_penalty = env_f64("SCANNER_PLACEHOLDER_PENALTY", cfg.placeholder_penalty);
        cfg.min_symbol_len = env_u32("SCANNER_MIN_SYMBOL_LEN", cfg.min_symbol_len as u32) as usize;
        cfg.max_symbol_len = env_u32("SCANNER_MAX_SYMBOL_LEN", cfg.max_symbol_len as u32) as usize;

        cfg.lookback_window_sec = env_u32("LOOKBACK_WINDOW_SEC", cfg.lookback_window_sec as u32) as u64;
        cfg.lookback_interval_sec = env_u32("LOOKBACK_INTERVAL_SEC", cfg.lookback_interval_sec as u32) as u64;

        cfg.enable_raydium_watcher = env_bool("SCANNER_ENABLE_RAYDIUM_WATCHER", cfg.enable_raydium_watcher);
        if let Ok(raw) = std::env::var("SCANNER_RAYDIUM_QUOTE_ALLOWLIST") {
            cfg.quote_allowlist = raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        cfg.health_host = std::env::var("SCANNER_HEALTH_HOST").unwrap_or(cfg.health_host);
        cfg.health_port = env_u32("SCANNER_HEALTH_PORT", cfg.health_port as u32) as u16;
        cfg.metrics_host = std::env::var("SCANNER_METRICS_HOST").unwrap_or(cfg.metrics_host);
        cfg.metrics_port = env_u32("SCANNER_METRICS_PORT", cfg.metrics_port as u32) as u16;

        warn_on_config_overrides(&cfg);
        info!(
            min_publish_score = cfg.min_publish_score,
            strict_placeholder = cfg.strict_placeholder,
            breaker_failure_threshold = cfg.breaker_failure_threshold,
            "runtime config loaded"
        );
        cfg
    }

    /// Atomic tmp+rename persistence, matching the teacher's
    /// `RuntimeConfig::save` — kept here for parity but not invoked for this
    /// config itself (spec.md names no cross-restart persistence for
    /// thresholds); reused directly by `PublishSink` for `open_positions.json`.
    pub fn save_json_atomic<T: Serialize>(path: impl AsRef<Path>, value: &T) -> anyhow::Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(value)?;
        std::fs::write(&tmp_path, body)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// Flags the "threshold override bug" from spec.md §9: the prototype
/// silently clamped `min_liquidity_usd`/`min_volume24h_usd` downward with a
/// hardcoded `min(...)`. This implementation never does that — thresholds
/// are authoritative as configured — but neither field is wired into a
/// qualifier hard gate, so a configured value is worth a warning.
fn warn_on_config_overrides(cfg: &RuntimeConfig) {
    if cfg.min_liquidity_usd > 1000.0 {
        warn!(
            configured = cfg.min_liquidity_usd,
            "SCANNER_MIN_LIQUIDITY_USD is set but is not enforced as a qualifier hard gate (spec gate list omits it); it only feeds scoring tiers"
        );
    }
    if cfg.min_volume24h_usd > 100.0 {
        warn!(
            configured = cfg.min_volume24h_usd,
            "SCANNER_MIN_VOLUME24H_USD is set but is not enforced as a qualifier hard gate (spec gate list omits it); it only feeds scoring tiers"
        );
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = RuntimeConfig::from_defaults();
        assert_eq!(cfg.max_retry_attempts, 4);
        assert_eq!(cfg.min_publish_score, 25.0);
        assert_eq!(cfg.breaker_failure_threshold, 5);
        assert_eq!(cfg.queue_capacity, 1000);
    }

    #[test]
    fn env_bool_accepts_common_truthy_forms() {
        std::env::set_var("TEST_BOOL_FLAG_QUALIFIER", "yes");
        assert!(env_bool("TEST_BOOL_FLAG_QUALIFIER", false));
        std::env::remove_var("TEST_BOOL_FLAG_QUALIFIER");
        assert!(env_bool("TEST_BOOL_FLAG_QUALIFIER", true));
    }
}
