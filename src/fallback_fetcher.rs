// =============================================================================
// FallbackFetcher — ordered provider fan-out guarded by circuit breakers
// =============================================================================
//
// Iterates Birdeye -> DexScreener -> Jupiter -> CoinGecko -> Solscan. Skips
// breaker-open providers, records success/failure, treats an `ok` result
// with no liquidity and no volume as insufficient and keeps going. On the
// first acceptable `ok`, runs a non-blocking CoinGecko enrichment pass and
// stops. Grounded on `DexInfoFetcher.fetch` in the Python prototype.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout as tokio_timeout;
use tracing::warn;

use crate::circuit_breaker::CircuitBreaker;
use crate::providers::coingecko::CoinGeckoProvider;
use crate::providers::{Buyers30mResolver, DexProvider};
use crate::types::DexInfo;

struct Slot {
    provider: Arc<dyn DexProvider>,
    breaker: Arc<CircuitBreaker>,
}

pub struct FallbackFetcher {
    chain: Vec<Slot>,
    coingecko_enricher: Option<Arc<CoinGeckoProvider>>,
    buyers30m_resolvers: Vec<Arc<dyn Buyers30mResolver>>,
}

impl FallbackFetcher {
    pub fn new() -> Self {
        Self {
            chain: Vec::new(),
            coingecko_enricher: None,
            buyers30m_resolvers: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn DexProvider>, breaker: Arc<CircuitBreaker>) -> Self {
        self.chain.push(Slot { provider, breaker });
        self
    }

    pub fn with_coingecko_enricher(mut self, enricher: Arc<CoinGeckoProvider>) -> Self {
        self.coingecko_enricher = Some(enricher);
        self
    }

    /// Registers another backfill source for `buyers_30m`, tried in
    /// registration order until one returns a value (spec.md §4.3's backfill
    /// note names Birdeye's overview field and DexScreener's `txns.m5`
    /// buyer counts as the two concrete sources).
    pub fn with_buyers30m_resolver(mut self, resolver: Arc<dyn Buyers30mResolver>) -> Self {
        self.buyers30m_resolvers.push(resolver);
        self
    }

    pub async fn fetch(&self, mint: &str, timeout: Duration) -> DexInfo {
        let mut reason_chain: Vec<String> = Vec::new();
        let mut success: Option<DexInfo> = None;

        for slot in &self.chain {
            if !slot.breaker.allow_request() {
                reason_chain.push(format!("{}=circuit_open", slot.provider.name()));
                continue;
            }

            let outcome = tokio_timeout(timeout, slot.provider.fetch(mint, timeout)).await;
            let info = match outcome {
                Ok(info) => info,
                Err(_) => {
                    slot.breaker.record_failure();
                    reason_chain.push(format!("{}=timeout", slot.provider.name()));
                    continue;
                }
            };

            match info.status {
                Some(crate::types::DexStatus::Ok) => {
                    slot.breaker.record_success();
                    if !info.has_market_signal() {
                        reason_chain.push(format!("{}=insufficient_data", slot.provider.name()));
                        continue;
                    }
                    reason_chain.push(format!("{}=ok", slot.provider.name()));
                    success = Some(info);
                    break;
                }
                Some(crate::types::DexStatus::NotFound) => {
                    reason_chain.push(format!(
                        "{}=not_found:{}",
                        slot.provider.name(),
                        info.reason.clone().unwrap_or_default()
                    ));
                }
                Some(crate::types::DexStatus::Error) | None => {
                    slot.breaker.record_failure();
                    reason_chain.push(format!(
                        "{}=error:{}",
                        slot.provider.name(),
                        info.reason.clone().unwrap_or_default()
                    ));
                }
                Some(crate::types::DexStatus::Pending) => {
                    reason_chain.push(format!("{}=pending", slot.provider.name()));
                }
            }
        }

        let Some(mut result) = success else {
            let reason = if reason_chain.is_empty() {
                "all_failed".to_string()
            } else {
                reason_chain.join("; ")
            };
            return DexInfo::pending(reason);
        };

        if let Some(enricher) = &self.coingecko_enricher {
            match tokio_timeout(timeout, enricher.enrich(mint, timeout, &mut result.metadata)).await {
                Ok(true) => {
                    let reason = result.reason.get_or_insert_with(String::new);
                    reason.push_str("+CG_verified");
                }
                Ok(false) => {}
                Err(_) => warn!(mint, "coingecko enrichment timed out"),
            }
        }

        if !result.metadata.contains_key("buyers_30m") {
            for resolver in &self.buyers30m_resolvers {
                if let Ok(Some(buyers)) = tokio_timeout(timeout, resolver.resolve(mint, timeout)).await {
                    result.metadata.insert("buyers_30m".into(), buyers.into());
                    break;
                }
            }
        }

        result.reason = Some(reason_chain.join("; "));
        result
    }
}

impl Default for FallbackFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        name: &'static str,
        calls: AtomicUsize,
        result: DexInfo,
    }

    #[async_trait]
    impl DexProvider for FixedProvider {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn fetch(&self, _mint: &str, _timeout: Duration) -> DexInfo {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    #[tokio::test]
    async fn stops_at_first_acceptable_ok() {
        let birdeye = Arc::new(FixedProvider {
            name: "birdeye",
            calls: AtomicUsize::new(0),
            result: DexInfo::not_found("none"),
        });
        let mut md = crate::types::Metadata::new();
        md.insert("liquidity_usd".into(), 5000.0.into());
        let dexscreener = Arc::new(FixedProvider {
            name: "dexscreener",
            calls: AtomicUsize::new(0),
            result: DexInfo {
                status: Some(crate::types::DexStatus::Ok),
                metadata: md,
                ..Default::default()
            },
        });
        let jupiter = Arc::new(FixedProvider {
            name: "jupiter",
            calls: AtomicUsize::new(0),
            result: DexInfo::ok("jupiter"),
        });

        let fetcher = FallbackFetcher::new()
            .with_provider(birdeye.clone(), Arc::new(CircuitBreaker::new(Default::default())))
            .with_provider(dexscreener.clone(), Arc::new(CircuitBreaker::new(Default::default())))
            .with_provider(jupiter.clone(), Arc::new(CircuitBreaker::new(Default::default())));

        let result = fetcher.fetch("Mint111", Duration::from_secs(1)).await;
        assert!(result.is_ok());
        assert_eq!(jupiter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(dexscreener.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_breaker_is_skipped_and_recorded() {
        let breaker = Arc::new(CircuitBreaker::new(crate::circuit_breaker::CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_secs(60),
        }));
        breaker.record_failure();
        let birdeye = Arc::new(FixedProvider {
            name: "birdeye",
            calls: AtomicUsize::new(0),
            result: DexInfo::ok("birdeye"),
        });
        let fetcher = FallbackFetcher::new().with_provider(birdeye.clone(), breaker);
        let result = fetcher.fetch("Mint222", Duration::from_secs(1)).await;
        assert_eq!(birdeye.calls.load(Ordering::SeqCst), 0);
        assert!(result.reason.unwrap().contains("birdeye=circuit_open"));
    }
}
