// =============================================================================
// RetryWorker — at most one retry task per mint, exponential backoff
// =============================================================================
//
// Grounded on `_schedule_retry` / `_retry_fetch` in the Python prototype
// (helius_token_scanner_bot.py:1127-1244). Reuses `event_queue::evaluate` for
// each attempt so a retry pass runs the identical fetch -> rug -> qualify
// pipeline as the first pass, just tagged `summary_retry`.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::event_queue::evaluate;
use crate::pipeline_context::PipelineContext;
use crate::types::{Candidate, Decision};

/// Spawns a retry task for `candidate.mint` unless one is already running.
pub fn schedule_retry(ctx: Arc<PipelineContext>, candidate: Candidate) {
    let mint = candidate.mint.clone();
    let ctx_for_task = ctx.clone();
    let handle = tokio::spawn(async move {
        run_retry_loop(ctx_for_task, candidate).await;
    });
    if !ctx.try_register_retry(&mint, handle) {
        info!(mint = %mint, "retry already in flight, skipping duplicate schedule");
    }
}

async fn run_retry_loop(ctx: Arc<PipelineContext>, candidate: Candidate) {
    let cfg = &ctx.config;
    let mut delay = Duration::from_secs_f64(cfg.retry_initial_delay);
    let max_delay = Duration::from_secs_f64(cfg.retry_max_delay);
    let backoff = cfg.retry_backoff;

    for attempt in 1..=cfg.max_retry_attempts {
        tokio::time::sleep(delay).await;

        if ctx.rug_detector.is_blacklisted(&candidate.mint) {
            info!(mint = %candidate.mint, "retry aborted, mint now blacklisted");
            break;
        }

        let summary = evaluate(&ctx, &candidate, attempt).await;
        info!(
            evt = summary.evt,
            trace_id = %candidate.trace_id,
            mint = %summary.mint,
            attempt,
            decision = ?summary.decision,
            score = summary.score,
            "summary_retry"
        );

        let is_last = attempt == cfg.max_retry_attempts;
        let published = match summary.decision {
            Some(Decision::Publish) => {
                ctx.publish_sink.publish(&summary).await;
                ctx.publish_sink.record_event(&summary);
                true
            }
            _ => {
                ctx.publish_sink.record_event(&summary);
                if is_last || summary.blacklisted_until.is_some() {
                    ctx.publish_sink.record_reject(&summary);
                }
                false
            }
        };

        // Placeholder soft-penalty applies independent of the final decision
        // (spec.md §4.8, scenario S6): a publish-worthy candidate still needs
        // its symbol upgraded.
        if summary.symbol_confidence.is_none() && crate::types::is_placeholder_symbol(&summary.symbol) {
            ctx.enqueue_for_symbol_resolution(candidate.mint.clone());
        }

        if published {
            ctx.clear_retry(&candidate.mint);
            return;
        }
        if is_last || summary.blacklisted_until.is_some() {
            break;
        }

        let next_secs = (cfg.retry_initial_delay * backoff.powi(attempt as i32)).min(cfg.retry_max_delay);
        delay = Duration::from_secs_f64(next_secs).min(max_delay);
    }

    ctx.clear_retry(&candidate.mint);
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
    async fn duplicate_schedule_is_rejected() {
        let fetcher = Arc::new(FallbackFetcher::new());
        let rug = Arc::new(RugDetector::new());
        let mut cfg = RuntimeConfig::from_defaults();
        cfg.retry_initial_delay = 0.01;
        cfg.max_retry_attempts = 1;
        let qualifier = Arc::new(Qualifier::new(cfg.clone()));
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(PublishSink::new(dir.path(), Duration::from_secs(1), None, "chat".into(), None).unwrap());
        let (ctx, _rx, _srx) = PipelineContext::new(cfg, fetcher, rug, qualifier, sink, None);

        let candidate = Candidate::new("MintDup", CandidateSource::HeliusLogs);
        schedule_retry(ctx.clone(), candidate.clone());
        assert_eq!(ctx.active_retries(), 1);
        schedule_retry(ctx.clone(), candidate);
        assert_eq!(ctx.active_retries(), 1);
    }
}
