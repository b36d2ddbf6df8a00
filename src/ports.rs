// =============================================================================
// External ports — narrow interfaces injected into PipelineContext
// =============================================================================
//
// Breaks the scanner/trader cycle flagged in spec.md §9: the pipeline never
// holds a concrete notifier, RPC client, or trading collaborator, only these
// trait objects. `App` wires concrete implementations in at construction.
// =============================================================================

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::types::Summary;

/// Outbound chat notification, composed by [`crate::publish_sink::PublishSink`]
/// and the symbol-resolver/status-digest loops. Transport (bot token, HTTP
/// client) is implementation detail of whatever implements this port.
#[derive(Debug, Clone)]
pub struct NotifierMessage {
    /// Per-notice id, logged alongside delivery failures so a single symbol
    /// resolution or publish notice can be traced across retries.
    pub notice_id: Uuid,
    pub chat_id: String,
    pub text: String,
}

impl NotifierMessage {
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            notice_id: Uuid::new_v4(),
            chat_id: chat_id.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
pub trait NotifierPort: Send + Sync {
    async fn send(&self, message: NotifierMessage) -> anyhow::Result<()>;
}

/// Transaction lookup fallback for mint extraction (spec.md §4.4 step 3).
#[async_trait]
pub trait TransactionLookupPort: Send + Sync {
    async fn get_transaction(&self, signature: &str) -> anyhow::Result<Value>;
}

/// Read-only view exposed to the `GET /trading` endpoint. The scanner core
/// never mutates trading state; a registered collaborator answers this port
/// if one is wired in at startup (spec.md §9, "cyclic references").
pub trait TradingView: Send + Sync {
    fn snapshot(&self) -> Value;
}

/// Invoked once per publish, after the notifier send and JSONL append
/// succeed. Lets an external trading collaborator react to a qualified
/// candidate without the pipeline depending on it directly.
pub trait PublishHook: Send + Sync {
    fn on_publish(&self, summary: &Summary);
}
