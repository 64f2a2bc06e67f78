//! Deal notification delivery.
//!
//! The engine hands a capped, price-ordered deal list to a `DealNotifier`;
//! the notifier renders the summary and delivers it to the alert's owner.
//! Delivery is confirmed or it failed — there is no fire-and-forget path.

pub mod message;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::types::{Alert, Deal};

/// A channel that can deliver a deal summary to a specific user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DealNotifier: Send + Sync {
    /// Deliver `deals` (already capped and sorted by the caller) to the
    /// alert's owner. `total_matches` is the pre-cap match count, used for
    /// the "+N more" line. `Ok` means confirmed delivery.
    async fn notify_deals(&self, alert: &Alert, deals: &[Deal], total_matches: usize)
        -> Result<()>;

    /// Channel name for logging and identification.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Webhook delivery
// ---------------------------------------------------------------------------

const CHANNEL_NAME: &str = "webhook";

/// Delivers deal summaries to the bot/UI process over HTTP.
///
/// The receiving end owns message formatting for its surface (embeds,
/// markdown); this payload carries the rendered plain-text summary plus the
/// raw identifiers it needs to route to the right user.
pub struct WebhookNotifier {
    http: Client,
    delivery_url: String,
    auth_token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(
        delivery_url: impl Into<String>,
        timeout: Duration,
        auth_token: Option<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("STAYSCOUT/0.1.0 (hotel-price-alerts)")
            .build()
            .context("Failed to build HTTP client for notifier")?;

        Ok(Self {
            http,
            delivery_url: delivery_url.into(),
            auth_token,
        })
    }
}

#[async_trait]
impl DealNotifier for WebhookNotifier {
    async fn notify_deals(
        &self,
        alert: &Alert,
        deals: &[Deal],
        total_matches: usize,
    ) -> Result<()> {
        let summary = message::render_deal_summary(alert, deals, total_matches);
        let payload = serde_json::json!({
            "owner_id": alert.owner_id,
            "alert_id": alert.id,
            "message": summary,
            "deal_count": deals.len(),
            "total_matches": total_matches,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let mut request = self.http.post(&self.delivery_url).json(&payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Notification delivery request failed")?;

        if !response.status().is_success() {
            bail!("delivery endpoint returned {}", response.status());
        }

        debug!(
            alert_id = %alert.id,
            owner_id = %alert.owner_id,
            deals = deals.len(),
            "Deal notification delivered"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        CHANNEL_NAME
    }
}
