// =============================================================================
// Mint Scout — Main Entry Point
// =============================================================================
//
// Thin orchestration root, matching the teacher's `main()` shape: load env
// and config, build the shared context, spawn one task per subsystem with
// its own reconnect wrapper, wait on Ctrl+C, shut down gracefully.
// =============================================================================

mod circuit_breaker;
mod event_queue;
mod fallback_fetcher;
mod health_server;
mod lookback_sweeper;
mod memory_janitor;
mod notifier;
mod pipeline_context;
mod pool_watcher;
mod ports;
mod providers;
mod publish_sink;
mod qualifier;
mod retry_worker;
mod rpc;
mod rug_detector;
mod runtime_config;
mod symbol_resolver;
mod types;
mod ws_producer;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::pipeline_context::PipelineContext;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::fallback_fetcher::FallbackFetcher;
use crate::notifier::HttpNotifier;
use crate::ports::NotifierPort;
use crate::providers::birdeye::BirdeyeProvider;
use crate::providers::coingecko::CoinGeckoProvider;
use crate::providers::dexscreener::DexScreenerProvider;
use crate::providers::jupiter::JupiterProvider;
use crate::providers::solscan::SolscanProvider;
use crate::publish_sink::PublishSink;
use crate::qualifier::Qualifier;
use crate::rpc::SolanaRpcClient;
use crate::rug_detector::RugDetector;
use crate::runtime_config::RuntimeConfig;
use crate::types::CandidateSource;

const SPL_TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
const TOKEN_2022_PROGRAM: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";
const RAYDIUM_AMM_PROGRAM: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";
const ORCA_WHIRLPOOL_PROGRAM: &str = "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc";
const PUMPFUN_PROGRAM: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Mint Scout — Starting Up                          ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = RuntimeConfig::load_from_env();

    let helius_ws_url = std::env::var("HELIUS_WS_URL")
        .unwrap_or_else(|_| "wss://atlas-mainnet.helius-rpc.com/?api-key=".to_string());
    let solana_rpc_url =
        std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string());
    let notifier_webhook_url = std::env::var("NOTIFIER_WEBHOOK_URL").ok();
    let notifier_chat_id = std::env::var("NOTIFIER_CHAT_ID").unwrap_or_default();

    let birdeye_api_key = std::env::var("BIRDEYE_API_KEY").ok();
    let coingecko_api_key = std::env::var("COINGECKO_API_KEY").ok();
    let birdeye_base_url = std::env::var("BIRDEYE_BASE_URL").unwrap_or_else(|_| "https://public-api.birdeye.so".into());
    let coingecko_base_url =
        std::env::var("COINGECKO_BASE_URL").unwrap_or_else(|_| "https://pro-api.coingecko.com/api/v3".into());
    let dexscreener_base_url =
        std::env::var("DEXSCREENER_BASE_URL").unwrap_or_else(|_| "https://api.dexscreener.com/latest/dex".into());
    let jupiter_base_url = std::env::var("JUPITER_BASE_URL").unwrap_or_else(|_| "https://quote-api.jup.ag/v6".into());
    let solscan_base_url = std::env::var("SOLSCAN_BASE_URL").unwrap_or_else(|_| "https://public-api.solscan.io".into());

    // ── Providers ─────────────────────────────────────────────────────────
    let http_client = reqwest::Client::builder().timeout(Duration::from_secs(15)).build()?;
    let birdeye = Arc::new(BirdeyeProvider::new(http_client.clone(), birdeye_base_url, birdeye_api_key));
    let coingecko = Arc::new(CoinGeckoProvider::new(http_client.clone(), coingecko_base_url, coingecko_api_key));
    let dexscreener = Arc::new(DexScreenerProvider::new(http_client.clone(), dexscreener_base_url));
    let jupiter = Arc::new(JupiterProvider::new(http_client.clone(), jupiter_base_url));
    let solscan = Arc::new(SolscanProvider::new(http_client.clone(), solscan_base_url));

    let breaker_cfg = CircuitBreakerConfig {
        failure_threshold: config.breaker_failure_threshold,
        open_timeout: Duration::from_secs_f64(config.breaker_timeout),
    };
    let fetcher = Arc::new(
        FallbackFetcher::new()
            .with_provider(birdeye.clone(), Arc::new(CircuitBreaker::new(breaker_cfg)))
            .with_provider(dexscreener.clone(), Arc::new(CircuitBreaker::new(breaker_cfg)))
            .with_provider(jupiter.clone(), Arc::new(CircuitBreaker::new(breaker_cfg)))
            .with_provider(coingecko.clone(), Arc::new(CircuitBreaker::new(breaker_cfg)))
            .with_provider(solscan.clone(), Arc::new(CircuitBreaker::new(breaker_cfg)))
            .with_coingecko_enricher(coingecko.clone())
            .with_buyers30m_resolver(birdeye.clone())
            .with_buyers30m_resolver(dexscreener.clone()),
    );

    let rug_detector = Arc::new(RugDetector::new());
    let qualifier = Arc::new(Qualifier::new(config.clone()));

    let notifier: Option<Arc<dyn NotifierPort>> = notifier_webhook_url.map(|url| Arc::new(HttpNotifier::new(url)) as _);

    let data_dir = std::env::var("SCANNER_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    let publish_sink = Arc::new(PublishSink::new(
        &data_dir,
        Duration::from_secs_f64(config.cooldown_duration),
        notifier.clone(),
        notifier_chat_id.clone(),
        None,
    )?);

    // No external trading collaborator is wired in this crate; `/trading`
    // reports `trading_available: false` until one registers (spec.md §9).
    let (ctx, queue_rx, symbol_rx) =
        PipelineContext::new(config.clone(), fetcher, rug_detector, qualifier, publish_sink, None);

    // ── C4: Helius logs producer ─────────────────────────────────────────
    let rpc_client: Arc<dyn crate::ports::TransactionLookupPort> = Arc::new(SolanaRpcClient::new(solana_rpc_url));
    {
        let ctx = ctx.clone();
        let ws_url = helius_ws_url.clone();
        let rpc = rpc_client.clone();
        tokio::spawn(async move {
            let producer = ws_producer::WsProducer::new(
                ws_url,
                vec![SPL_TOKEN_PROGRAM.to_string(), TOKEN_2022_PROGRAM.to_string()],
                Some(rpc),
            );
            producer.run(ctx).await;
        });
    }

    // ── C5: Pool watchers (Raydium / Orca / Pump.fun) ────────────────────
    if config.enable_raydium_watcher {
        for (source, program_id) in [
            (CandidateSource::Raydium, RAYDIUM_AMM_PROGRAM),
            (CandidateSource::Orca, ORCA_WHIRLPOOL_PROGRAM),
            (CandidateSource::Pumpfun, PUMPFUN_PROGRAM),
        ] {
            let ctx = ctx.clone();
            let ws_url = helius_ws_url.clone();
            tokio::spawn(async move {
                let watcher = pool_watcher::PoolWatcher::new(ws_url, source, program_id);
                watcher.run(ctx).await;
            });
        }
        info!("pool watchers launched for raydium/orca/pumpfun");
    } else {
        info!("pool watchers disabled via SCANNER_ENABLE_RAYDIUM_WATCHER");
    }

    // ── C6: Lookback sweeper + status digest ─────────────────────────────
    {
        let ctx = ctx.clone();
        let sweeper = Arc::new(lookback_sweeper::LookbackSweeper::new(birdeye.clone(), coingecko.clone(), "solana", 20));
        tokio::spawn(async move {
            sweeper.run(ctx).await;
        });
    }
    {
        let ctx = ctx.clone();
        let notifier = notifier.clone();
        let chat_id = notifier_chat_id.clone();
        tokio::spawn(async move {
            lookback_sweeper::run_status_digest(ctx, notifier, chat_id).await;
        });
    }

    // ── C7: Event queue consumer ──────────────────────────────────────────
    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            event_queue::run_consumer(ctx, queue_rx).await;
        });
    }

    // ── C11: Symbol resolver ──────────────────────────────────────────────
    {
        let ctx = ctx.clone();
        let resolver = Arc::new(symbol_resolver::SymbolResolver::new(
            dexscreener.clone(),
            coingecko.clone(),
            birdeye.clone(),
            notifier.clone(),
            notifier_chat_id.clone(),
        ));
        tokio::spawn(async move {
            resolver.run(ctx, symbol_rx).await;
        });
    }

    // ── C12: Memory janitor ────────────────────────────────────────────────
    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            memory_janitor::run(ctx).await;
        });
    }

    // ── C14: Health server + Prometheus metrics ───────────────────────────
    if let Err(e) = health_server::install_metrics_exporter(&config.metrics_host, config.metrics_port) {
        warn!(error = %e, "failed to install prometheus metrics exporter");
    }
    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = health_server::serve(ctx).await {
                warn!(error = %e, "health server exited");
            }
        });
    }

    info!("All subsystems running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    ctx.shutdown_queue().await;
    ctx.shutdown_retries().await;

    info!("Mint Scout shut down complete.");
    Ok(())
}
