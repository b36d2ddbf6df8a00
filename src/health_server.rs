// =============================================================================
// HealthServer — axum health/trading endpoints + Prometheus metrics (C14)
// =============================================================================
//
// Trims `api/rest.rs`'s authenticated multi-endpoint router down to the two
// public endpoints spec.md §6 asks for (no bearer auth on either — there is
// no trading execution surface in this crate to protect). Metrics exposition
// follows the same `metrics-exporter-prometheus` builder the teacher's
// `main.rs` installs, just split onto its own configurable host/port.
// =============================================================================

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::pipeline_context::PipelineContext;

pub fn router(ctx: Arc<PipelineContext>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    Router::new()
        .route("/health", get(health))
        .route("/trading", get(trading))
        .layer(cors)
        .with_state(ctx)
}

async fn health(State(ctx): State<Arc<PipelineContext>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "queue_size": ctx.queue_depth(),
        "queue_capacity": ctx.queue_capacity(),
        "active_retries": ctx.active_retries(),
        "processed": ctx.processed.load(Ordering::Relaxed),
        "queue_dropped": ctx.queue_dropped.load(Ordering::Relaxed),
        "memory_usage": {
            "liquidity_history": ctx.rug_detector.history_len(),
            "blacklisted": ctx.rug_detector.blacklist_len(),
        },
        "uptime_secs": ctx.start_time.elapsed().as_secs(),
    }))
}

async fn trading(State(ctx): State<Arc<PipelineContext>>) -> Json<Value> {
    match &ctx.trading_view {
        Some(view) => Json(view.snapshot()),
        None => Json(json!({ "trading_available": false })),
    }
}

pub async fn serve(ctx: Arc<PipelineContext>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config.health_host, ctx.config.health_port).parse()?;
    info!(%addr, "health server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

/// Installs the Prometheus recorder and serves `/metrics` on its own port,
/// mirroring the teacher's `main.rs` bootstrap (`PrometheusBuilder::new()
/// .with_http_listener(...)`, fire-and-forget).
pub fn install_metrics_exporter(host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!(%addr, "prometheus metrics exporter installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback_fetcher::FallbackFetcher;
    use crate::publish_sink::PublishSink;
    use crate::qualifier::Qualifier;
    use crate::rug_detector::RugDetector;
    use crate::runtime_config::RuntimeConfig;
    use std::time::Duration;

    fn test_ctx() -> Arc<PipelineContext> {
        let cfg = RuntimeConfig::from_defaults();
        let fetcher = Arc::new(FallbackFetcher::new());
        let rug = Arc::new(RugDetector::new());
        let qualifier = Arc::new(Qualifier::new(cfg.clone()));
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(PublishSink::new(dir.path(), Duration::from_secs(1), None, "chat".into(), None).unwrap());
        let (ctx, _rx, _srx) = PipelineContext::new(cfg, fetcher, rug, qualifier, sink, None);
        ctx
    }

    #[tokio::test]
    async fn trading_endpoint_reports_unavailable_without_view() {
        let ctx = test_ctx();
        let Json(body) = trading(State(ctx)).await;
        assert_eq!(body["trading_available"], json!(false));
    }

    #[tokio::test]
    async fn health_endpoint_reports_queue_and_memory_fields() {
        let ctx = test_ctx();
        let Json(body) = health(State(ctx)).await;
        assert_eq!(body["status"], json!("ok"));
        assert!(body.get("memory_usage").is_some());
    }
}
