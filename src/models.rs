use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

// ============ Survey Platform Entities ============
//
// All of these are read-only snapshots for the duration of one job run.

/// A product and everything the weekly summary needs to know about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub environments: Vec<Environment>,
    pub team: Team,
}

impl Product {
    /// The first production environment, if the product has one.
    pub fn production_environment(&self) -> Option<&Environment> {
        self.environments
            .iter()
            .find(|env| env.environment_type == EnvironmentType::Production)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentType {
    Production,
    Development,
}

/// A deployment scope under a product, containing surveys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    #[serde(rename = "type")]
    pub environment_type: EnvironmentType,
    pub surveys: Vec<Survey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SurveyStatus {
    Draft,
    Scheduled,
    InProgress,
    Paused,
    Completed,
}

impl SurveyStatus {
    /// A survey is live while it is collecting responses.
    pub fn is_live(self) -> bool {
        matches!(self, SurveyStatus::InProgress)
    }

    /// Human-readable label used in emails.
    pub fn label(self) -> &'static str {
        match self {
            SurveyStatus::Draft => "Draft",
            SurveyStatus::Scheduled => "Scheduled",
            SurveyStatus::InProgress => "In progress",
            SurveyStatus::Paused => "Paused",
            SurveyStatus::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: String,
    pub name: String,
    pub status: SurveyStatus,
    pub questions: Vec<Question>,
    pub responses: Vec<SurveyResponse>,
    pub displays: Vec<Display>,
}

/// A survey question; only the headline is needed to label answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub headline: String,
}

/// A recorded, possibly partial, set of answers keyed by question id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub finished: bool,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Seen,
    Responded,
}

/// One recorded instance of a survey being shown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Display {
    pub status: DisplayStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub memberships: Vec<Membership>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
}

/// Per-user notification preferences, keyed by product id (weekly summary)
/// or survey id (response alerts). Absent keys mean disabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default)]
    pub weekly_summary: HashMap<String, bool>,
    #[serde(default)]
    pub alert: HashMap<String, bool>,
}

impl NotificationSettings {
    pub fn weekly_summary_enabled(&self, product_id: &str) -> bool {
        self.weekly_summary
            .get(product_id)
            .copied()
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekly_summary_defaults_to_disabled() {
        let settings = NotificationSettings::default();
        assert!(!settings.weekly_summary_enabled("prod_1"));
    }

    #[test]
    fn test_notification_settings_from_stored_json() {
        let settings: NotificationSettings = serde_json::from_value(serde_json::json!({
            "alert": { "survey_1": true },
            "weeklySummary": { "prod_1": true, "prod_2": false }
        }))
        .unwrap();

        assert!(settings.weekly_summary_enabled("prod_1"));
        assert!(!settings.weekly_summary_enabled("prod_2"));
        assert!(!settings.weekly_summary_enabled("prod_3"));
    }

    #[test]
    fn test_missing_settings_sections_are_empty() {
        let user: User = serde_json::from_value(serde_json::json!({
            "email": "ana@example.com",
            "notificationSettings": {}
        }))
        .unwrap();
        assert_eq!(user.notification_settings, NotificationSettings::default());
    }

    #[test]
    fn test_survey_status_uses_stored_labels() {
        let status: SurveyStatus = serde_json::from_value(serde_json::json!("inProgress")).unwrap();
        assert_eq!(status, SurveyStatus::InProgress);
        assert!(serde_json::from_value::<SurveyStatus>(serde_json::json!("archived")).is_err());
        assert!(status.is_live());
        assert!(!SurveyStatus::Paused.is_live());
        assert_eq!(SurveyStatus::InProgress.label(), "In progress");
    }
}
