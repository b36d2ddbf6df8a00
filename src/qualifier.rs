// =============================================================================
// Qualifier — hard gates + weighted scorer
// =============================================================================
//
// Hard gates run first; any one drops the candidate with a single tagged
// note. Surviving candidates get a four-part weighted score clamped to
// [0,100], plus additive bonuses. Grounded line-for-line on
// `_decide_candidate` / `_score_dex` / `_score_demand` / `_score_structure` /
// `_score_momentum` in the Python prototype's helius_token_scanner_bot.py.
// The conflicting-threshold override bug noted in spec.md §9 is resolved
// here by treating every configured threshold as authoritative; see
// `warn_on_config_overrides` in runtime_config.rs for the startup sanity
// check that replaces the silent override.
// =============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use crate::runtime_config::RuntimeConfig;
use crate::types::{is_placeholder_symbol, CandidateSource, Decision, Metadata, MetadataExt, Summary};

const BLUECHIP_SYMBOLS: [&str; 4] = ["USDC", "USDT", "WSOL", "SOL"];
const BLUECHIP_MINTS: [&str; 3] = [
    "So11111111111111111111111111111111111111112",
    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
    "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
];

pub struct Qualifier {
    config: RuntimeConfig,
}

impl Qualifier {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Evaluates one summary, mutating `notes`/`score`/`decision` in place
    /// and returning the decision, mirroring the tuple the prototype's
    /// `_decide_candidate` returns.
    pub fn decide(&self, summary: &mut Summary, rug_alert: bool, blacklisted: bool) -> Decision {
        summary.rug_alert = rug_alert;
        let mut notes = Vec::new();

        if rug_alert || blacklisted {
            notes.push("risk_drop".to_string());
            summary.notes = notes;
            summary.decision = Some(Decision::Drop);
            return Decision::Drop;
        }

        if is_bluechip(&summary.mint, &summary.symbol) {
            notes.push("bluechip_non_target".to_string());
            summary.notes = notes;
            summary.decision = Some(Decision::Drop);
            return Decision::Drop;
        }

        let placeholder = is_placeholder_symbol(&summary.symbol);
        if placeholder && self.config.strict_placeholder {
            notes.push("placeholder_symbol_strict".to_string());
            summary.notes = notes;
            summary.decision = Some(Decision::Drop);
            return Decision::Drop;
        }
        if placeholder {
            notes.push("placeholder_symbol_penalty".to_string());
        }

        let md = &summary.metadata;
        let mut liquidity = md.get_f64("liquidity_usd");
        let mut volume = md.get_f64("volume_24h_usd");
        let age_min = pair_age_min(md);

        if liquidity.is_none() && volume.is_none() {
            let fresh_pool = matches!(
                summary.source,
                CandidateSource::Raydium | CandidateSource::Orca | CandidateSource::Pumpfun
            ) && age_min.map(|a| a < 2.0).unwrap_or(false);
            if fresh_pool {
                liquidity = Some(1000.0);
                volume = Some(100.0);
                notes.push("light_publish_new_pool".to_string());
            }
        }

        let util = match (volume, liquidity) {
            (Some(v), Some(l)) if l > 0.0 => Some(v / l),
            _ => None,
        };
        if let Some(u) = util {
            if u < self.config.util_min || u > self.config.util_max {
                notes.push("util_out_of_bounds".to_string());
                summary.notes = notes;
                summary.decision = Some(Decision::Drop);
                return Decision::Drop;
            }
        }

        if let Some(age) = age_min {
            if age < self.config.min_age_min as f64 {
                notes.push("age_too_fresh".to_string());
                summary.notes = notes;
                summary.decision = Some(Decision::Drop);
                return Decision::Drop;
            }
        }

        if let Some(last_trade) = md.get_f64("last_trade_minutes") {
            if last_trade > self.config.pool_max_last_trade_min as f64 {
                notes.push("stale_pool".to_string());
                summary.notes = notes;
                summary.decision = Some(Decision::Drop);
                return Decision::Drop;
            }
        }

        if let Some(trades) = md.get_i64("trades_24h") {
            if trades < self.config.pool_min_trades24h {
                notes.push("trades24_low".to_string());
                summary.notes = notes;
                summary.decision = Some(Decision::Drop);
                return Decision::Drop;
            }
        }

        if self.config.enable_fdv_sanity {
            if let (Some(price), Some(supply), Some(fdv)) =
                (md.get_f64("price_usd"), md.get_f64("supply"), md.get_f64("fdv"))
            {
                let implied = price * supply;
                if implied > 0.0 && ((implied - fdv).abs() / implied) > self.config.fdv_sanity_tolerance {
                    notes.push("fdv_sanity_fail".to_string());
                    summary.notes = notes;
                    summary.decision = Some(Decision::Drop);
                    return Decision::Drop;
                }
            }
        }

        notes.push("dex_ok".to_string());
        if md.get_i64("buyers_30m").is_some() {
            notes.push("buyers_ok".to_string());
        }

        let mut score = score_dex(liquidity, volume, util, age_min)
            + score_demand(md.get_i64("buyers_30m"))
            + score_structure(summary, md)
            + score_momentum(md.get_map("price_change"));

        if summary.dex_reason.contains("jupiter=ok") {
            score += 5.0;
            notes.push("jupiter_bonus".to_string());
        }

        if summary.source.is_pump() {
            score += 3.0;
            if let Some(pc) = md.get_map("price_change") {
                let m5 = pc.get("m5").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
                let h1 = pc.get("h1").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
                score += if m5 >= 50.0 {
                    5.0
                } else if m5 >= 20.0 {
                    3.0
                } else {
                    0.0
                };
                score += if h1 >= 100.0 {
                    4.0
                } else if h1 >= 50.0 {
                    2.0
                } else {
                    0.0
                };
            }
            notes.push("pump_bonus".to_string());
        }

        if placeholder {
            score -= self.config.placeholder_penalty;
        }

        let score = score.clamp(0.0, 100.0);
        let decision = if score >= self.config.min_publish_score {
            notes.push("score_threshold_passed".to_string());
            Decision::Publish
        } else {
            notes.push("score_threshold_failed".to_string());
            Decision::Drop
        };

        summary.score = Some(score);
        summary.notes = notes;
        summary.decision = Some(decision);
        decision
    }
}

fn is_bluechip(mint: &str, symbol: &str) -> bool {
    BLUECHIP_MINTS.contains(&mint) || BLUECHIP_SYMBOLS.contains(&symbol.to_ascii_uppercase().as_str())
}

pub(crate) fn pair_age_min(md: &Metadata) -> Option<f64> {
    let created_ms = md.get_f64("pair_created_at")?;
    let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_millis() as f64;
    Some(((now_ms - created_ms) / 60_000.0).max(0.0))
}

fn score_dex(liquidity: Option<f64>, volume: Option<f64>, util: Option<f64>, age_min: Option<f64>) -> f64 {
    let mut score: f64 = 0.0;
    score += match liquidity {
        None => 2.0,
        Some(l) if l >= 50_000.0 => 25.0,
        Some(l) if l >= 20_000.0 => 20.0,
        Some(l) if l >= 10_000.0 => 15.0,
        Some(l) if l >= 5_000.0 => 12.0,
        Some(l) if l >= 1_000.0 => 8.0,
        Some(l) if l >= 100.0 => 5.0,
        Some(_) => 2.0,
    };
    score += match volume {
        None => 2.0,
        Some(v) if v >= 100_000.0 => 15.0,
        Some(v) if v >= 50_000.0 => 12.0,
        Some(v) if v >= 20_000.0 => 9.0,
        Some(v) if v >= 5_000.0 => 6.0,
        Some(v) if v >= 1_000.0 => 4.0,
        Some(v) if v >= 100.0 => 2.0,
        Some(_) => 1.0,
    };
    if let Some(u) = util {
        score += if (0.5..=3.0).contains(&u) {
            8.0
        } else if (0.3..=5.0).contains(&u) {
            5.0
        } else if u > 0.0 {
            2.0
        } else {
            0.0
        };
    }
    score += match age_min {
        None => 1.0,
        Some(a) if a >= 120.0 => 5.0,
        Some(a) if a >= 60.0 => 4.0,
        Some(a) if a >= 30.0 => 3.0,
        Some(a) if a >= 10.0 => 2.0,
        Some(_) => 1.0,
    };
    score.min(45.0)
}

fn score_demand(buyers_30m: Option<i64>) -> f64 {
    match buyers_30m {
        None => 8.0,
        Some(b) if b >= 40 => 25.0,
        Some(b) if b >= 25 => 20.0,
        Some(b) if b >= 15 => 15.0,
        Some(b) if b >= 7 => 12.0,
        Some(b) if b >= 3 => 8.0,
        Some(_) => 5.0,
    }
}

fn score_structure(summary: &Summary, md: &Metadata) -> f64 {
    let mut score = 20.0;
    if is_placeholder_symbol(&summary.symbol) {
        score += 3.0;
    } else {
        score += 8.0;
    }

    if let Some(top5) = md.get_f64("holder_top5_pct") {
        if top5 >= 70.0 {
            score -= 3.0;
        } else if top5 < 30.0 {
            score += 3.0;
        }
    }
    if let Some(fresh1d) = md.get_f64("fresh_holders_1d_pct") {
        if fresh1d >= 10.0 {
            score += 2.0;
        }
    }
    if let Some(fresh7d) = md.get_f64("fresh_holders_7d_pct") {
        if fresh7d >= 20.0 {
            score += 2.0;
        }
    }
    if let Some(cg) = md.get_f64("coingecko_score") {
        score += cg;
    }
    if md.get_str("coingecko_symbol").is_some() {
        score += 3.0;
    }

    let reason = &summary.dex_reason;
    let hits = ["birdeye=ok", "dexscreener=ok", "jupiter=ok", "coingecko=ok"]
        .iter()
        .filter(|tag| reason.contains(**tag))
        .count();
    if hits >= 3 {
        score += 8.0;
    } else if hits >= 2 {
        score += 5.0;
    }

    score.clamp(0.0, 30.0)
}

fn score_momentum(price_change: Option<&serde_json::Map<String, serde_json::Value>>) -> f64 {
    let mut score = 8.0;
    let Some(pc) = price_change else {
        return score;
    };
    if let Some(m5) = pc.get("m5").and_then(serde_json::Value::as_f64) {
        score += if m5 >= 10.0 {
            12.0
        } else if m5 >= 5.0 {
            8.0
        } else if m5 >= 0.0 {
            5.0
        } else if m5 >= -10.0 {
            2.0
        } else {
            -4.0
        };
    }
    if let Some(h1) = pc.get("h1").and_then(serde_json::Value::as_f64) {
        score += if h1 >= 20.0 {
            8.0
        } else if h1 >= 10.0 {
            6.0
        } else if h1 >= 0.0 {
            3.0
        } else {
            -3.0
        };
    }
    score.clamp(0.0, 25.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candidate, DexInfo, DexStatus};
    use serde_json::json;

    fn summary_with(metadata: Metadata, source: CandidateSource, symbol: &str, dex_reason: &str) -> Summary {
        let candidate = Candidate::new("Mint111", source).with_symbol_hint(symbol);
        let info = DexInfo {
            status: Some(DexStatus::Ok),
            reason: Some(dex_reason.to_string()),
            metadata,
            ..Default::default()
        };
        Summary::from_fetch(&candidate, &info)
    }

    #[test]
    fn s1_ordinary_publish() {
        let mut md = Metadata::new();
        md.insert("price_usd".into(), json!(0.8));
        md.insert("liquidity_usd".into(), json!(2500.0));
        md.insert("volume_24h_usd".into(), json!(1500.0));
        md.insert("buyers_30m".into(), json!(12));
        md.insert(
            "pair_created_at".into(),
            json!((SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as f64) - 10.0 * 60_000.0),
        );
        md.insert("trades_24h".into(), json!(30));
        md.insert("price_change".into(), json!({"m5": 6.0, "h1": 15.0}));
        let mut summary = summary_with(md, CandidateSource::HeliusLogs, "AAA", "dexscreener=ok");

        let qualifier = Qualifier::new(RuntimeConfig::from_defaults());
        let decision = qualifier.decide(&mut summary, false, false);

        assert_eq!(decision, Decision::Publish);
        let score = summary.score.unwrap();
        assert!((40.0..=70.0).contains(&score), "score {score} out of [40,70]");
        assert!(summary.notes.contains(&"dex_ok".to_string()));
        assert!(summary.notes.contains(&"buyers_ok".to_string()));
        assert!(summary.notes.contains(&"score_threshold_passed".to_string()));
    }

    #[test]
    fn s2_stale_pool_drop() {
        let mut md = Metadata::new();
        md.insert("liquidity_usd".into(), json!(5000.0));
        md.insert("volume_24h_usd".into(), json!(8000.0));
        md.insert("last_trade_minutes".into(), json!(15.0));
        md.insert(
            "pair_created_at".into(),
            json!((SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as f64) - 120.0 * 60_000.0),
        );
        let mut summary = summary_with(md, CandidateSource::HeliusLogs, "BBB", "dexscreener=ok");

        let qualifier = Qualifier::new(RuntimeConfig::from_defaults());
        let decision = qualifier.decide(&mut summary, false, false);

        assert_eq!(decision, Decision::Drop);
        assert!(summary.notes.contains(&"stale_pool".to_string()));
    }

    #[test]
    fn risk_drop_short_circuits_everything() {
        let mut summary = summary_with(Metadata::new(), CandidateSource::HeliusLogs, "CCC", "");
        let qualifier = Qualifier::new(RuntimeConfig::from_defaults());
        let decision = qualifier.decide(&mut summary, true, false);
        assert_eq!(decision, Decision::Drop);
        assert_eq!(summary.notes, vec!["risk_drop".to_string()]);
    }

    #[test]
    fn util_boundary_is_inclusive() {
        let mut md = Metadata::new();
        md.insert("liquidity_usd".into(), json!(10_000.0));
        md.insert("volume_24h_usd".into(), json!(3_000.0)); // util == 0.3 exactly
        md.insert("trades_24h".into(), json!(30));
        md.insert(
            "pair_created_at".into(),
            json!((SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as f64) - 10.0 * 60_000.0),
        );
        let mut summary = summary_with(md, CandidateSource::HeliusLogs, "DDD", "dexscreener=ok");
        let qualifier = Qualifier::new(RuntimeConfig::from_defaults());
        qualifier.decide(&mut summary, false, false);
        assert!(!summary.notes.contains(&"util_out_of_bounds".to_string()));
    }

    #[test]
    fn strict_placeholder_drops_soft_mode_penalizes() {
        let mut md = Metadata::new();
        md.insert("liquidity_usd".into(), json!(50_000.0));
        md.insert("volume_24h_usd".into(), json!(100_000.0));
        md.insert("trades_24h".into(), json!(50));
        md.insert(
            "pair_created_at".into(),
            json!((SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as f64) - 30.0 * 60_000.0),
        );

        let mut strict_cfg = RuntimeConfig::from_defaults();
        strict_cfg.strict_placeholder = true;
        let mut summary = summary_with(md.clone(), CandidateSource::HeliusLogs, "TOKEN_ab12cd", "dexscreener=ok");
        let decision = Qualifier::new(strict_cfg).decide(&mut summary, false, false);
        assert_eq!(decision, Decision::Drop);
        assert!(summary.notes.contains(&"placeholder_symbol_strict".to_string()));

        let mut soft_cfg = RuntimeConfig::from_defaults();
        soft_cfg.strict_placeholder = false;
        let mut summary2 = summary_with(md, CandidateSource::HeliusLogs, "TOKEN_ab12cd", "dexscreener=ok");
        Qualifier::new(soft_cfg).decide(&mut summary2, false, false);
        assert!(summary2.notes.contains(&"placeholder_symbol_penalty".to_string()));
    }
}
