// =============================================================================
// RugDetector — rolling liquidity history + 24h blacklist
// =============================================================================
//
// On each observation: append to a 300s rolling window, evict stale
// entries, and flag rug_alert when liquidity <= 0.4 * max(window). A rug
// alert blacklists the mint for 86400s unless already blacklisted.
// Exclusively owns liquidity history and the blacklist map (spec §3).
// Grounded on `_check_liquidity_drop` / `_is_blacklisted` in the prototype.
// =============================================================================

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::types::Mint;

const LIQUIDITY_WINDOW: Duration = Duration::from_secs(300);
const RUG_DROP_RATIO: f64 = 0.4;
const BLACKLIST_TTL: Duration = Duration::from_secs(86_400);

pub struct RugDetector {
    history: RwLock<HashMap<Mint, Vec<(Instant, f64)>>>,
    blacklist: RwLock<HashMap<Mint, Instant>>,
}

impl RugDetector {
    pub fn new() -> Self {
        Self {
            history: RwLock::new(HashMap::new()),
            blacklist: RwLock::new(HashMap::new()),
        }
    }

    /// Record an observation and return whether it triggers a rug alert.
    pub fn check(&self, mint: &str, liquidity: Option<f64>) -> bool {
        let Some(liquidity) = liquidity.filter(|l| *l > 0.0) else {
            return false;
        };
        let now = Instant::now();
        let cutoff = now.checked_sub(LIQUIDITY_WINDOW).unwrap_or(now);

        let max_liq = {
            let mut history = self.history.write();
            let entries = history.entry(mint.to_string()).or_default();
            entries.push((now, liquidity));
            entries.retain(|(ts, _)| *ts >= cutoff);
            entries.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max)
        };

        if max_liq <= 0.0 {
            return false;
        }

        if liquidity <= max_liq * RUG_DROP_RATIO {
            let mut blacklist = self.blacklist.write();
            blacklist
                .entry(mint.to_string())
                .or_insert_with(|| now + BLACKLIST_TTL);
            true
        } else {
            false
        }
    }

    pub fn is_blacklisted(&self, mint: &str) -> bool {
        let blacklist = self.blacklist.read();
        blacklist
            .get(mint)
            .map(|expires_at| Instant::now() < *expires_at)
            .unwrap_or(false)
    }

    /// Remaining seconds-since-epoch the mint stays blacklisted, if any.
    /// Used only for display; the gate itself is `is_blacklisted`.
    pub fn blacklisted_until_unix(&self, mint: &str, now_unix: i64) -> Option<i64> {
        let blacklist = self.blacklist.read();
        let expires_at = *blacklist.get(mint)?;
        let remaining = expires_at.saturating_duration_since(Instant::now());
        Some(now_unix + remaining.as_secs() as i64)
    }

    pub fn evict_expired(&self, history_ttl: Duration) -> (usize, usize) {
        let now = Instant::now();
        let cutoff = now.checked_sub(history_ttl).unwrap_or(now);
        {
            let mut history = self.history.write();
            history.retain(|_, entries| {
                entries.retain(|(ts, _)| *ts >= cutoff);
                !entries.is_empty()
            });
        }
        {
            let mut blacklist = self.blacklist.write();
            blacklist.retain(|_, expires_at| now < *expires_at);
        }
        (self.history.read().len(), self.blacklist.read().len())
    }

    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    pub fn blacklist_len(&self) -> usize {
        self.blacklist.read().len()
    }
}

impl Default for RugDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_rug_on_catastrophic_drop() {
        let rug = RugDetector::new();
        assert!(!rug.check("Mint333", Some(10_000.0)));
        assert!(!rug.check("Mint333", Some(9_500.0)));
        // Exactly at the 0.4 boundary must trigger (inclusive).
        assert!(rug.check("Mint333", Some(9_500.0 * 0.4)));
        assert!(rug.is_blacklisted("Mint333"));
    }

    #[test]
    fn boundary_ratio_is_inclusive() {
        let rug = RugDetector::new();
        rug.check("MintX", Some(1000.0));
        // exactly 0.4 * max_liq
        assert!(rug.check("MintX", Some(400.0)));
    }

    #[test]
    fn non_blacklisted_mint_passes() {
        let rug = RugDetector::new();
        assert!(!rug.is_blacklisted("NeverSeen"));
    }

    #[test]
    fn zero_or_missing_liquidity_never_triggers() {
        let rug = RugDetector::new();
        assert!(!rug.check("MintZero", None));
        assert!(!rug.check("MintZero", Some(0.0)));
    }
}
