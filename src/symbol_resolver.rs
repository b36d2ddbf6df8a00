// =============================================================================
// SymbolResolver — background placeholder-to-real-symbol upgrade (C11)
// =============================================================================
//
// Grounded on `_symbol_retry_worker` / `_resolve_symbol_from_sources` /
// `_send_symbol_update` / `_check_confluence_update`
// (helius_token_scanner_bot.py:580-725). Per spec.md §9's open question,
// this implementation fixes CoinGecko's confidence at 0.95 for a contract
// hit rather than carrying the prototype's 0.9/0.95 inconsistency forward.
// Jupiter's quote API genuinely has no symbol field to surface, so
// DexScreener, CoinGecko, and Birdeye contribute candidate symbols; the
// fixed retry schedule and confidence threshold still apply exactly as
// specified.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::pipeline_context::PipelineContext;
use crate::ports::{NotifierMessage, NotifierPort};
use crate::providers::birdeye::BirdeyeProvider;
use crate::providers::coingecko::CoinGeckoProvider;
use crate::providers::dexscreener::DexScreenerProvider;
use crate::providers::DexProvider;
use crate::types::{is_placeholder_symbol, Mint, MetadataExt};

const RETRY_SCHEDULE_SECS: [u64; 5] = [30, 120, 300, 900, 1800];

pub struct SymbolResolver {
    dexscreener: Arc<DexScreenerProvider>,
    coingecko: Arc<CoinGeckoProvider>,
    birdeye: Arc<BirdeyeProvider>,
    notifier: Option<Arc<dyn NotifierPort>>,
    chat_id: String,
}

impl SymbolResolver {
    pub fn new(
        dexscreener: Arc<DexScreenerProvider>,
        coingecko: Arc<CoinGeckoProvider>,
        birdeye: Arc<BirdeyeProvider>,
        notifier: Option<Arc<dyn NotifierPort>>,
        chat_id: String,
    ) -> Self {
        Self {
            dexscreener,
            coingecko,
            birdeye,
            notifier,
            chat_id,
        }
    }

    async fn try_resolve(&self, mint: &str, timeout: Duration) -> Option<(String, f64, &'static str)> {
        if let Some((symbol, confidence)) = self.coingecko.resolve_symbol(mint, timeout).await {
            if confidence >= 0.01 {
                return Some((symbol, confidence, "coingecko"));
            }
        }
        let info = self.dexscreener.fetch(mint, timeout).await;
        if let Some(symbol) = info.metadata.get_str("base_symbol") {
            if !symbol.is_empty() {
                return Some((symbol.to_uppercase(), 0.8, "dexscreener"));
            }
        }
        if let Some((symbol, confidence)) = self.birdeye.resolve_symbol(mint, timeout).await {
            return Some((symbol, confidence, "birdeye"));
        }
        None
    }

    pub async fn run(self: Arc<Self>, ctx: Arc<PipelineContext>, mut rx: mpsc::Receiver<Mint>) {
        info!("symbol resolver started");
        while let Some(mint) = rx.recv().await {
            let resolver = Arc::clone(&self);
            let ctx = ctx.clone();
            tokio::spawn(async move {
                resolver.resolve_one(ctx, mint).await;
            });
        }
        info!("symbol resolver stopped");
    }

    async fn resolve_one(&self, ctx: Arc<PipelineContext>, mint: Mint) {
        let timeout = Duration::from_secs_f64(ctx.config.retry_fetch_timeout);
        for delay_secs in RETRY_SCHEDULE_SECS {
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;

            if ctx.resolved_symbols.read().contains_key(&mint) {
                return;
            }

            let Some((symbol, confidence, source)) = self.try_resolve(&mint, timeout).await else {
                continue;
            };
            if is_placeholder_symbol(&symbol) || confidence < ctx.config.min_symbol_confidence {
                continue;
            }
            if symbol.len() < ctx.config.min_symbol_len || symbol.len() > ctx.config.max_symbol_len {
                continue;
            }

            ctx.resolved_symbols
                .write()
                .insert(mint.clone(), (symbol.clone(), confidence, std::time::Instant::now()));
            self.notify(&format!(
                "Symbol resolved for `{mint}`: *{symbol}* (confidence {confidence:.2}, source: {source})"
            ))
            .await;

            let confluence_count = [
                self.coingecko.resolve_symbol(&mint, timeout).await.is_some(),
                self.dexscreener.fetch(&mint, timeout).await.is_ok(),
                self.birdeye.resolve_symbol(&mint, timeout).await.is_some(),
            ]
            .into_iter()
            .filter(|ok| *ok)
            .count();
            if confluence_count >= 2 {
                self.notify(&format!("Confluence update for `{mint}`: {confluence_count} sources agree on *{symbol}*"))
                    .await;
            }
            return;
        }
        info!(mint = %mint, "symbol resolution exhausted schedule without a confident match");
    }

    async fn notify(&self, text: &str) {
        if let Some(notifier) = &self.notifier {
            let message = NotifierMessage::new(self.chat_id.clone(), text.to_string());
            let notice_id = message.notice_id;
            if let Err(e) = notifier.send(message).await {
                tracing::warn!(%notice_id, error = %e, "symbol resolution notice failed to send");
            }
        }
    }
}
