// =============================================================================
// PublishSink — cooldown-gated notification + append-only JSONL logs
// =============================================================================
//
// Owns the per-mint cooldown map exclusively (spec.md §3). Markdown layout
// grounded on `_send_telegram_notification`
// (helius_token_scanner_bot.py:984-1126); JSONL writers grounded on
// `_write_jsonl_entry` / `_append_reject` (lines 1262-1393, 1255-1261).
// `open_positions.json` is a write-only artifact for the external trading
// collaborator (spec.md §9): this sink never reads or mutates positions
// beyond recording a freshly published mint.
// =============================================================================

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, warn};

use crate::ports::{NotifierMessage, NotifierPort, PublishHook};
use crate::qualifier::pair_age_min;
use crate::types::{Mint, MetadataExt, Summary};

/// `dex` sub-object of the documented JSONL schema (spec.md §6).
#[derive(Debug, Serialize)]
struct DexShape<'a> {
    #[serde(rename = "primaryPairId")]
    primary_pair_id: Option<&'a str>,
    #[serde(rename = "dexId")]
    dex_id: Option<&'a str>,
    liq_usd: Option<f64>,
    vol_h24: Option<f64>,
    util: Option<f64>,
    price_usd: Option<f64>,
    fdv: Option<f64>,
    age_min: Option<f64>,
    #[serde(rename = "priceChange")]
    price_change: Option<&'a serde_json::Map<String, serde_json::Value>>,
    buyers30m: Option<i64>,
}

/// One line of `token_events.jsonl` / `dex_rejects.jsonl`, shaped to spec.md
/// §6's documented schema rather than `Summary`'s internal field layout.
#[derive(Debug, Serialize)]
struct EventRecord<'a> {
    ts: String,
    mint: &'a str,
    program: String,
    symbol: &'a str,
    decimals: Option<i64>,
    dex: DexShape<'a>,
    score: Option<f64>,
    decision: Option<String>,
    notes: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dex_reason: Option<&'a str>,
}

impl<'a> EventRecord<'a> {
    fn from_summary(summary: &'a Summary, include_reason: bool) -> Self {
        let md = &summary.metadata;
        let liq = summary.liquidity_usd;
        let vol = md.get_f64("volume_24h_usd");
        let util = match (vol, liq) {
            (Some(v), Some(l)) if l > 0.0 => Some(v / l),
            _ => None,
        };
        Self {
            ts: Utc::now().to_rfc3339(),
            mint: &summary.mint,
            program: summary.source.to_string(),
            symbol: &summary.symbol,
            decimals: md.get_i64("decimals"),
            dex: DexShape {
                primary_pair_id: summary.pair_address.as_deref(),
                dex_id: summary.dex_name.as_deref(),
                liq_usd: liq,
                vol_h24: vol,
                util,
                price_usd: md.get_f64("price_usd"),
                fdv: md.get_f64("fdv"),
                age_min: pair_age_min(md),
                price_change: md.get_map("price_change"),
                buyers30m: md.get_i64("buyers_30m"),
            },
            score: summary.score,
            decision: summary.decision.map(|d| d.to_string()),
            notes: &summary.notes,
            dex_reason: include_reason.then_some(summary.dex_reason.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct OpenPosition {
    mint: Mint,
    symbol: String,
    entry_price: Option<f64>,
    entry_time: String,
    liquidity_usd: Option<f64>,
    volume_24h_usd: Option<f64>,
    status: &'static str,
}

pub struct PublishSink {
    cooldowns: RwLock<HashMap<Mint, Instant>>,
    cooldown_duration: Duration,
    notifier: Option<Arc<dyn NotifierPort>>,
    chat_id: String,
    publish_hook: Option<Arc<dyn PublishHook>>,
    event_log: Mutex<std::fs::File>,
    reject_log: Mutex<std::fs::File>,
    positions_path: PathBuf,
    positions: Mutex<HashMap<Mint, OpenPosition>>,
}

impl PublishSink {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        cooldown_duration: Duration,
        notifier: Option<Arc<dyn NotifierPort>>,
        chat_id: String,
        publish_hook: Option<Arc<dyn PublishHook>>,
    ) -> anyhow::Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        let event_log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(data_dir.join("token_events.jsonl"))?;
        let reject_log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(data_dir.join("dex_rejects.jsonl"))?;
        Ok(Self {
            cooldowns: RwLock::new(HashMap::new()),
            cooldown_duration,
            notifier,
            chat_id,
            publish_hook,
            event_log: Mutex::new(event_log),
            reject_log: Mutex::new(reject_log),
            positions_path: data_dir.join("open_positions.json"),
            positions: Mutex::new(HashMap::new()),
        })
    }

    /// Appends one line to `token_events.jsonl`, shaped per spec.md §6.
    /// Called unconditionally for every consumer pass, publish or drop
    /// (spec.md §4.7 step 7).
    pub fn record_event(&self, summary: &Summary) {
        append_line(&self.event_log, &EventRecord::from_summary(summary, false));
    }

    /// Appends one line to `dex_rejects.jsonl` (same shape plus `dex_reason`).
    /// Called only on drop.
    pub fn record_reject(&self, summary: &Summary) {
        append_line(&self.reject_log, &EventRecord::from_summary(summary, true));
    }

    /// Cooldown-gated notify + position record for a `publish` decision.
    /// Returns `true` if the notification was actually sent.
    pub async fn publish(&self, summary: &Summary) -> bool {
        if let Some(last) = self.cooldowns.read().get(&summary.mint) {
            if last.elapsed() < self.cooldown_duration {
                info!(mint = %summary.mint, "publish suppressed by cooldown");
                return false;
            }
        }

        let text = render_notification(summary);
        if let Some(notifier) = &self.notifier {
            let message = NotifierMessage::new(self.chat_id.clone(), text);
            let notice_id = message.notice_id;
            if let Err(e) = notifier.send(message).await {
                warn!(mint = %summary.mint, notice_id = %notice_id, error = %e, "notifier send failed");
            }
        }

        self.cooldowns.write().insert(summary.mint.clone(), Instant::now());
        self.record_open_position(summary);
        if let Some(hook) = &self.publish_hook {
            hook.on_publish(summary);
        }
        true
    }

    fn record_open_position(&self, summary: &Summary) {
        let position = OpenPosition {
            mint: summary.mint.clone(),
            symbol: summary.symbol.clone(),
            entry_price: summary.metadata.get_f64("price_usd"),
            entry_time: Utc::now().to_rfc3339(),
            liquidity_usd: summary.liquidity_usd,
            volume_24h_usd: summary.metadata.get_f64("volume_24h_usd"),
            status: "open",
        };
        let mut positions = self.positions.lock();
        positions.insert(summary.mint.clone(), position);
        if let Err(e) = crate::runtime_config::RuntimeConfig::save_json_atomic(&self.positions_path, &*positions) {
            warn!(error = %e, "failed to persist open_positions.json");
        }
    }
}

fn append_line<T: Serialize>(file: &Mutex<std::fs::File>, value: &T) {
    let Ok(mut line) = serde_json::to_string(value) else {
        return;
    };
    line.push('\n');
    let mut file = file.lock();
    if let Err(e) = file.write_all(line.as_bytes()) {
        warn!(error = %e, "failed to append jsonl record");
    }
}

fn render_notification(summary: &Summary) -> String {
    let md = &summary.metadata;
    let mint = &summary.mint;
    let short_mint = if mint.len() > 16 {
        format!("{}...{}", &mint[..8], &mint[mint.len() - 8..])
    } else {
        mint.clone()
    };

    let price = md.get_f64("price_usd").map(format_price).unwrap_or_else(|| "n/a".into());
    let mc = md.get_f64("market_cap").map(format_usd).unwrap_or_else(|| "n/a".into());
    let vol = md.get_f64("volume_24h_usd").map(format_usd).unwrap_or_else(|| "n/a".into());
    let lp = summary.liquidity_usd.map(format_usd).unwrap_or_else(|| "n/a".into());
    let age = pair_age_display(md);
    let buyers = md.get_i64("buyers_30m").map(|b| b.to_string()).unwrap_or_else(|| "n/a".into());
    let top5 = md.get_f64("holder_top5_pct").map(|v| format!("{v:.1}%")).unwrap_or_else(|| "n/a".into());
    let fresh1d = md.get_f64("fresh_holders_1d_pct").map(|v| format!("{v:.1}%")).unwrap_or_else(|| "n/a".into());
    let ath = md.get_f64("ath_usd").map(format_price).unwrap_or_else(|| "n/a".into());

    let confluence: Vec<&str> = ["birdeye=ok", "dexscreener=ok", "jupiter=ok", "coingecko=ok"]
        .into_iter()
        .filter(|tag| summary.dex_reason.contains(tag))
        .map(|tag| tag.split('=').next().unwrap_or(tag))
        .collect();

    let header = if summary.attempt == 0 { "New token" } else { "Updated candidate" };

    format!(
        "*{header}*: `{symbol}`\n\
         Mint: `{short_mint}`\n\
         Price: {price} | MC: {mc} | Vol24h: {vol} | LP: {lp}\n\
         Age: {age} | Buyers30m: {buyers}\n\
         Top5 holders: {top5} | Fresh1d: {fresh1d} | ATH: {ath}\n\
         Confluence: {confluence}\n\
         Score: {score:.1} | Dex: {dex}\n\
         [DexScreener](https://dexscreener.com/solana/{mint}) | [Solscan](https://solscan.io/token/{mint})",
        symbol = summary.symbol,
        confluence = if confluence.is_empty() { "none".into() } else { confluence.join(", ") },
        score = summary.score.unwrap_or(0.0),
        dex = summary.dex_name.as_deref().unwrap_or("unknown"),
    )
}

fn pair_age_display(md: &crate::types::Metadata) -> String {
    let Some(created_ms) = md.get_f64("pair_created_at") else {
        return "n/a".into();
    };
    let Ok(now) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return "n/a".into();
    };
    let age_min = ((now.as_millis() as f64 - created_ms) / 60_000.0).max(0.0);
    if age_min >= 60.0 {
        format!("{:.1}h", age_min / 60.0)
    } else {
        format!("{age_min:.0}m")
    }
}

fn format_usd(v: f64) -> String {
    if v >= 1_000_000.0 {
        format!("${:.2}M", v / 1_000_000.0)
    } else if v >= 1_000.0 {
        format!("${:.1}k", v / 1_000.0)
    } else {
        format!("${v:.0}")
    }
}

fn format_price(v: f64) -> String {
    if v < 0.01 {
        format!("${v:.8}")
    } else {
        format!("${v:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candidate, CandidateSource, DexInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingNotifier {
        sent: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl NotifierPort for CountingNotifier {
        async fn send(&self, _message: NotifierMessage) -> anyhow::Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_summary() -> Summary {
        let candidate = Candidate::new("Mint111", CandidateSource::HeliusLogs).with_symbol_hint("AAA");
        let mut summary = Summary::from_fetch(&candidate, &DexInfo::ok("dexscreener"));
        summary.score = Some(55.0);
        summary
    }

    #[tokio::test]
    async fn cooldown_suppresses_repeat_publish() {
        let dir = tempdir().unwrap();
        let notifier = Arc::new(CountingNotifier { sent: AtomicUsize::new(0) });
        let sink = PublishSink::new(
            dir.path(),
            Duration::from_secs(60),
            Some(notifier.clone()),
            "chat1".into(),
            None,
        )
        .unwrap();

        let summary = sample_summary();
        assert!(sink.publish(&summary).await);
        assert!(!sink.publish(&summary).await);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_and_reject_logs_append_lines() {
        let dir = tempdir().unwrap();
        let sink = PublishSink::new(dir.path(), Duration::from_secs(1), None, "chat1".into(), None).unwrap();
        let summary = sample_summary();
        sink.record_event(&summary);
        sink.record_reject(&summary);
        let events = std::fs::read_to_string(dir.path().join("token_events.jsonl")).unwrap();
        let rejects = std::fs::read_to_string(dir.path().join("dex_rejects.jsonl")).unwrap();
        assert_eq!(events.lines().count(), 1);
        assert_eq!(rejects.lines().count(), 1);
    }
}
