// =============================================================================
// HttpNotifier — generic chat-notifier port adapter
// =============================================================================
//
// Implements [`NotifierPort`] against the generic POST contract spec.md §6
// describes (`{chat_id, text, parse_mode, disable_web_page_preview}`).
// Transport internals (retries, rate limiting, a specific chat provider's
// quirks) are an explicit Non-goal; this is the minimal adapter the pipeline
// needs to have *a* working sink, not a feature-complete client.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use crate::ports::{NotifierMessage, NotifierPort};

pub struct HttpNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl HttpNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl NotifierPort for HttpNotifier {
    async fn send(&self, message: NotifierMessage) -> anyhow::Result<()> {
        let body = json!({
            "chat_id": message.chat_id,
            "text": message.text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });
        let resp = self.client.post(&self.webhook_url).json(&body).send().await?;
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "notifier webhook returned non-success status");
        }
        Ok(())
    }
}
