// =============================================================================
// EventQueue consumer — single task draining candidates (C7)
// =============================================================================
//
// Exactly one consumer task, preserving per-mint ordering (spec.md §5).
// `evaluate` is the shared fetch -> rug-check -> qualify pipeline reused
// verbatim by the RetryWorker for `summary_retry` passes. Grounded on
// `_consume_queue` in helius_token_scanner_bot.py (lines 876-983).
// =============================================================================

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::pipeline_context::{PipelineContext, QueueEvent};
use crate::retry_worker;
use crate::types::{Candidate, Decision, DexStatus, Summary};

/// Runs the fetch -> rug-check -> qualify pipeline once for `candidate`,
/// tagging the resulting summary with `attempt` (0 for the first pass).
pub async fn evaluate(ctx: &PipelineContext, candidate: &Candidate, attempt: u32) -> Summary {
    let timeout = Duration::from_secs_f64(ctx.config.retry_fetch_timeout);
    let info = ctx.fetcher.fetch(&candidate.mint, timeout).await;

    let mut summary = Summary::from_fetch(candidate, &info);
    summary.attempt = attempt;
    if attempt > 0 {
        summary.evt = "summary_retry";
    }

    if let Some((symbol, confidence, _)) = ctx.resolved_symbols.read().get(&candidate.mint).cloned() {
        summary.symbol = symbol;
        summary.symbol_confidence = Some(confidence);
    }

    let rug_alert = ctx.rug_detector.check(&candidate.mint, summary.liquidity_usd);
    let blacklisted = ctx.rug_detector.is_blacklisted(&candidate.mint);
    if blacklisted {
        let now_unix = chrono::Utc::now().timestamp();
        summary.blacklisted_until = ctx.rug_detector.blacklisted_until_unix(&candidate.mint, now_unix);
    }

    ctx.qualifier.decide(&mut summary, rug_alert, blacklisted);
    summary
}

/// True when a summary's dex status means a later retry might succeed and
/// the mint isn't permanently excluded (spec.md §4.10).
fn is_retryable(summary: &Summary, blacklisted: bool) -> bool {
    if blacklisted {
        return false;
    }
    matches!(summary.dex_status, DexStatus::Pending | DexStatus::Error | DexStatus::NotFound)
}

pub async fn run_consumer(ctx: Arc<PipelineContext>, mut rx: mpsc::Receiver<QueueEvent>) {
    info!("event queue consumer started");
    while let Some(event) = rx.recv().await {
        let candidate = match event {
            QueueEvent::Candidate(c) => c,
            QueueEvent::Shutdown => {
                info!("consumer received shutdown sentinel");
                break;
            }
        };

        let summary = evaluate(&ctx, &candidate, 0).await;
        ctx.processed.fetch_add(1, Ordering::Relaxed);
        metrics::increment_counter!("mint_scout_tokens_processed_total");

        info!(
            evt = summary.evt,
            trace_id = %candidate.trace_id,
            mint = %summary.mint,
            decision = ?summary.decision,
            score = summary.score,
            notes = ?summary.notes,
            "summary"
        );

        let blacklisted = summary.blacklisted_until.is_some();
        match summary.decision {
            Some(Decision::Publish) => {
                ctx.publish_sink.publish(&summary).await;
            }
            _ => {
                ctx.publish_sink.record_reject(&summary);
                if is_retryable(&summary, blacklisted) && !ctx.rug_detector.is_blacklisted(&candidate.mint) {
                    retry_worker::schedule_retry(ctx.clone(), candidate.clone());
                }
            }
        }

        // Placeholder soft-penalty applies independent of the final decision
        // (spec.md §4.8, scenario S6): a publish-worthy candidate still needs
        // its symbol upgraded.
        if summary.symbol_confidence.is_none() && crate::types::is_placeholder_symbol(&summary.symbol) {
            ctx.enqueue_for_symbol_resolution(candidate.mint.clone());
        }

        ctx.publish_sink.record_event(&summary);
    }
    info!("event queue consumer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback_fetcher::FallbackFetcher;
    use crate::publish_sink::PublishSink;
    use crate::qualifier::Qualifier;
    use crate::rug_detector::RugDetector;
    use crate::runtime_config::RuntimeConfig;
    use crate::types::CandidateSource;

    #[tokio::test]
    async fn evaluate_tags_retry_attempts() {
        let fetcher = Arc::new(FallbackFetcher::new());
        let rug = Arc::new(RugDetector::new());
        let qualifier = Arc::new(Qualifier::new(RuntimeConfig::from_defaults()));
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(PublishSink::new(dir.path(), Duration::from_secs(1), None, "chat".into(), None).unwrap());

        let (ctx, _rx, _srx) =
            PipelineContext::new(RuntimeConfig::from_defaults(), fetcher, rug, qualifier, sink, None);
        let candidate = Candidate::new("Mint999", CandidateSource::HeliusLogs);
        let summary = evaluate(&ctx, &candidate, 2).await;
        assert_eq!(summary.attempt, 2);
        assert_eq!(summary.evt, "summary_retry");
    }
}
