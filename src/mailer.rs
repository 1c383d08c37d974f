use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::config::Config;
use crate::errors::AppError;
use crate::insights::{ProductRef, WeeklySummaryPayload};
use crate::templates::{self, RenderedEmail};

/// Outbound side of the weekly summary job.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tells a single recipient that the product got no completed responses this week.
    async fn send_no_live_survey_notification(
        &self,
        recipient: &str,
        product: &ProductRef,
    ) -> Result<(), AppError>;

    /// Sends the weekly summary to every recipient of a product in one email.
    async fn send_weekly_summary_notification(
        &self,
        recipients: &[String],
        payload: &WeeklySummaryPayload,
    ) -> Result<(), AppError>;
}

/// Client for a transactional mail HTTP API (`POST {base}/emails`).
#[derive(Clone)]
pub struct MailClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    from: String,
    webapp_url: String,
}

impl MailClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.mail_timeout_secs))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create mail client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.mail_api_url.clone(),
            token: config.mail_api_token.clone(),
            from: config.mail_from.clone(),
            webapp_url: config.webapp_url.clone(),
        })
    }

    async fn send(
        &self,
        to: &[String],
        email: RenderedEmail,
        idempotency_key: String,
    ) -> Result<(), AppError> {
        let url = format!("{}/emails", self.base_url);
        tracing::debug!("Sending '{}' to {} recipient(s)", email.subject, to.len());

        let body = json!({
            "from": self.from,
            "to": to,
            "subject": email.subject,
            "html": email.html,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Idempotency-Key", idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Mail request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Mail API returned {}: {}",
                status, error_text
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for MailClient {
    async fn send_no_live_survey_notification(
        &self,
        recipient: &str,
        product: &ProductRef,
    ) -> Result<(), AppError> {
        let email = templates::no_live_survey_email(product, &self.webapp_url);
        let to = vec![recipient.to_string()];
        let key = idempotency_key("no_responses", &product.id, &to, product.current_date);
        self.send(&to, email, key).await
    }

    async fn send_weekly_summary_notification(
        &self,
        recipients: &[String],
        payload: &WeeklySummaryPayload,
    ) -> Result<(), AppError> {
        let email = templates::weekly_summary_email(payload, &self.webapp_url);
        let key = idempotency_key(
            "weekly_summary",
            &payload.product_id,
            recipients,
            payload.current_date,
        );
        self.send(recipients, email, key).await
    }
}

/// Stable key for one email of one ISO week, so a scheduler retry within the
/// same week is deduplicated by the provider.
pub fn idempotency_key(
    kind: &str,
    product_id: &str,
    recipients: &[String],
    at: DateTime<Utc>,
) -> String {
    let mut sorted: Vec<&str> = recipients.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let week = at.iso_week();
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b"|");
    hasher.update(product_id.as_bytes());
    hasher.update(b"|");
    hasher.update(sorted.join(",").as_bytes());
    hasher.update(b"|");
    hasher.update(format!("{}-W{:02}", week.year(), week.week()).as_bytes());
    hex::encode(hasher.finalize())
}
