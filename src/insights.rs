//! Per-product aggregation for the weekly summary.
//!
//! Everything here is pure: given the fetched products and "now", decide who
//! gets which email and with what payload. No I/O happens in this module.

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::errors::AppError;
use crate::models::{Product, Survey, SurveyStatus};

/// Length of the reporting window, in days.
pub const WINDOW_DAYS: i64 = 7;

/// Start of the reporting window ending at `now`.
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(WINDOW_DAYS)
}

/// Running counters over the surveys of one environment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub total_completed_responses: u64,
    pub total_displays: u64,
    pub total_responses: u64,
    pub num_live_survey: u64,
    /// Recomputed from the running totals after every survey, so it is NaN
    /// (or infinite) until at least one display has been counted.
    #[serde(serialize_with = "serialize_rate")]
    pub completion_rate: f64,
}

impl Default for Insights {
    fn default() -> Self {
        Self {
            total_completed_responses: 0,
            total_displays: 0,
            total_responses: 0,
            num_live_survey: 0,
            completion_rate: f64::NAN,
        }
    }
}

impl Insights {
    /// Folds one survey into the running totals.
    ///
    /// The completion rate is taken from the cumulative totals at this point,
    /// not averaged with earlier values: after surveys with 4 of 10 and 6 of
    /// 30 displays finished it reads 25 (10/40), not the mean of 40 and 20.
    pub fn fold_survey(&mut self, survey: &Survey) {
        if survey.status.is_live() {
            self.num_live_survey += 1;
        }

        let completed = survey.responses.iter().filter(|r| r.finished).count() as u64;
        self.total_completed_responses += completed;
        self.total_displays += survey.displays.len() as u64;
        self.total_responses += survey.responses.len() as u64;

        self.completion_rate = completion_rate(self.total_completed_responses, self.total_displays);
    }

    /// The completion rate when it is a real percentage.
    pub fn finite_completion_rate(&self) -> Option<f64> {
        self.completion_rate
            .is_finite()
            .then_some(self.completion_rate)
    }
}

/// `round(100 * completed / displays)`. Not finite when `displays` is zero.
pub fn completion_rate(completed: u64, displays: u64) -> f64 {
    (100.0 * completed as f64 / displays as f64).round()
}

fn serialize_rate<S: Serializer>(rate: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if rate.is_finite() {
        serializer.serialize_some(rate)
    } else {
        serializer.serialize_none()
    }
}

/// One question headline paired with one response's answer to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEntry {
    pub headline: String,
    pub answer: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySummary {
    pub id: String,
    pub name: String,
    pub status: SurveyStatus,
    pub response_count: usize,
    /// Question-major cross product of headlines and responses.
    pub responses: Vec<ResponseEntry>,
}

/// Pairs every question headline with every response's answer to it.
pub fn flatten_survey(survey: &Survey) -> SurveySummary {
    let mut responses = Vec::with_capacity(survey.questions.len() * survey.responses.len());

    for question in &survey.questions {
        for response in &survey.responses {
            responses.push(ResponseEntry {
                headline: question.headline.clone(),
                answer: response.data.get(&question.id).cloned(),
            });
        }
    }

    SurveySummary {
        id: survey.id.clone(),
        name: survey.name.clone(),
        status: survey.status,
        response_count: survey.responses.len(),
        responses,
    }
}

/// Product fields the "no responses" email needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub id: String,
    pub name: String,
    pub environment_id: String,
    /// Time of the run that planned this email.
    pub current_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummaryPayload {
    pub environment_id: String,
    pub current_date: DateTime<Utc>,
    pub last_week_date: DateTime<Utc>,
    pub product_id: String,
    pub product_name: String,
    pub surveys: Vec<SurveySummary>,
    pub insights: Insights,
}

/// A single email send decided by the planner.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Sent once per recipient when the product had no completed responses.
    NoResponses { recipient: String, product: ProductRef },
    /// Sent once per product, addressed to every recipient.
    WeeklySummary {
        recipients: Vec<String>,
        payload: WeeklySummaryPayload,
    },
}

impl Notification {
    pub fn product_id(&self) -> &str {
        match self {
            Notification::NoResponses { product, .. } => &product.id,
            Notification::WeeklySummary { payload, .. } => &payload.product_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::NoResponses { .. } => "no_responses",
            Notification::WeeklySummary { .. } => "weekly_summary",
        }
    }
}

/// Team members who enabled the weekly summary for this product, in membership order.
pub fn recipients(product: &Product) -> Vec<String> {
    product
        .team
        .memberships
        .iter()
        .filter(|m| m.user.notification_settings.weekly_summary_enabled(&product.id))
        .map(|m| m.user.email.clone())
        .collect()
}

/// Decides which emails one product produces.
///
/// Products nobody subscribed to yield nothing and are not aggregated.
pub fn plan_product(product: &Product, now: DateTime<Utc>) -> Result<Vec<Notification>, AppError> {
    let recipients = recipients(product);
    if recipients.is_empty() {
        return Ok(Vec::new());
    }

    let environment = product.production_environment().ok_or_else(|| {
        AppError::InternalError(format!(
            "product {} has no production environment",
            product.id
        ))
    })?;

    let mut insights = Insights::default();
    let mut surveys = Vec::with_capacity(environment.surveys.len());
    for survey in environment
        .surveys
        .iter()
        .filter(|s| s.status != SurveyStatus::Draft)
    {
        surveys.push(flatten_survey(survey));
        insights.fold_survey(survey);
    }

    if insights.total_completed_responses == 0 {
        let product_ref = ProductRef {
            id: product.id.clone(),
            name: product.name.clone(),
            environment_id: environment.id.clone(),
            current_date: now,
        };
        return Ok(recipients
            .into_iter()
            .map(|recipient| Notification::NoResponses {
                recipient,
                product: product_ref.clone(),
            })
            .collect());
    }

    Ok(vec![Notification::WeeklySummary {
        recipients,
        payload: WeeklySummaryPayload {
            environment_id: environment.id.clone(),
            current_date: now,
            last_week_date: window_start(now),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            surveys,
            insights,
        },
    }])
}

/// Result of planning a whole run.
#[derive(Debug, Default)]
pub struct Plan {
    pub notifications: Vec<Notification>,
    pub products: usize,
    pub products_skipped: usize,
}

/// Plans every product in order. The first malformed product aborts planning.
pub fn plan_notifications(products: &[Product], now: DateTime<Utc>) -> Result<Plan, AppError> {
    let mut plan = Plan {
        products: products.len(),
        ..Plan::default()
    };

    for product in products {
        let notifications = plan_product(product, now)?;
        if notifications.is_empty() {
            tracing::debug!("Skipping product {}: no weekly summary recipients", product.id);
            plan.products_skipped += 1;
            continue;
        }
        plan.notifications.extend(notifications);
    }

    Ok(plan)
}
