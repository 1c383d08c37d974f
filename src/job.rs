//! The weekly summary run: fetch, plan, then dispatch every email at once.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::insights::{self, Notification};
use crate::mailer::Notifier;
use crate::repository::SummarySource;

/// Outcome counters of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub run_id: Uuid,
    pub products: usize,
    pub products_skipped: usize,
    pub notifications: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct WeeklySummaryJob {
    source: Arc<dyn SummarySource>,
    notifier: Arc<dyn Notifier>,
}

impl WeeklySummaryJob {
    pub fn new(source: Arc<dyn SummarySource>, notifier: Arc<dyn Notifier>) -> Self {
        Self { source, notifier }
    }

    /// Runs one weekly summary pass as of `now`.
    ///
    /// Every planned email is attempted. If any of them failed the run
    /// returns an error after all sends have settled.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<JobReport, AppError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("weekly_summary", %run_id);
        self.run_inner(run_id, now).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, now: DateTime<Utc>) -> Result<JobReport, AppError> {
        let since = insights::window_start(now);
        tracing::info!("Starting weekly summary for responses since {}", since);

        let products = self
            .source
            .fetch_products(since)
            .await
            .context("fetching weekly summary data")?;
        tracing::info!("Loaded {} products", products.len());

        let plan = insights::plan_notifications(&products, now)?;

        let sends = plan
            .notifications
            .iter()
            .map(|notification| self.dispatch(notification));
        let outcomes = join_all(sends).await;

        let mut failures = Vec::new();
        for (notification, outcome) in plan.notifications.iter().zip(outcomes) {
            if let Err(e) = outcome {
                tracing::error!(
                    "Failed to send {} email for product {}: {}",
                    notification.kind(),
                    notification.product_id(),
                    e
                );
                failures.push(format!("{} ({})", notification.product_id(), e));
            }
        }

        let report = JobReport {
            run_id,
            products: plan.products,
            products_skipped: plan.products_skipped,
            notifications: plan.notifications.len(),
            delivered: plan.notifications.len() - failures.len(),
            failed: failures.len(),
        };

        tracing::info!(
            "Weekly summary complete: {} products, {} skipped, {} delivered, {} failed",
            report.products,
            report.products_skipped,
            report.delivered,
            report.failed
        );

        if !failures.is_empty() {
            return Err(AppError::ExternalApiError(format!(
                "{} of {} notifications failed: {}",
                report.failed,
                report.notifications,
                failures.join("; ")
            )));
        }

        Ok(report)
    }

    async fn dispatch(&self, notification: &Notification) -> Result<(), AppError> {
        tracing::debug!(
            "Dispatching {} email for product {}",
            notification.kind(),
            notification.product_id()
        );
        match notification {
            Notification::NoResponses { recipient, product } => {
                self.notifier
                    .send_no_live_survey_notification(recipient, product)
                    .await
            }
            Notification::WeeklySummary {
                recipients,
                payload,
            } => {
                self.notifier
                    .send_weekly_summary_notification(recipients, payload)
                    .await
            }
        }
    }
}
