use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;

use crate::errors::{AppError, ResultExt};
use crate::models::*;

/// Read port for the weekly summary: every product with the nested records
/// the job aggregates over.
#[async_trait]
pub trait SummarySource: Send + Sync {
    /// Loads all products. Responses are limited to those created at or after `since`.
    async fn fetch_products(&self, since: DateTime<Utc>) -> Result<Vec<Product>, AppError>;
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    name: String,
    team_id: String,
}

#[derive(Debug, FromRow)]
struct EnvironmentRow {
    id: String,
    product_id: String,
    environment_type: String,
}

#[derive(Debug, FromRow)]
struct SurveyRow {
    id: String,
    environment_id: String,
    name: String,
    status: String,
    questions: Json<Vec<Question>>,
}

#[derive(Debug, FromRow)]
struct ResponseRow {
    id: String,
    survey_id: String,
    created_at: DateTime<Utc>,
    finished: bool,
    data: Json<Map<String, Value>>,
}

#[derive(Debug, FromRow)]
struct DisplayRow {
    survey_id: String,
    status: String,
}

#[derive(Debug, FromRow)]
struct MemberRow {
    team_id: String,
    email: String,
    notification_settings: Option<Json<NotificationSettings>>,
}

/// PostgreSQL implementation over the platform's tables.
///
/// Runs one query per level of the hierarchy and stitches the rows together
/// in memory. Nothing is paginated.
#[derive(Clone)]
pub struct PgSummarySource {
    pool: PgPool,
}

impl PgSummarySource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummarySource for PgSummarySource {
    async fn fetch_products(&self, since: DateTime<Utc>) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, ProductRow>(
            r#"SELECT id, name, "teamId" AS team_id FROM "Product" ORDER BY "createdAt", id"#,
        )
        .fetch_all(&self.pool)
        .await
        .context("loading products")?;

        let product_ids: Vec<String> = products.iter().map(|p| p.id.clone()).collect();
        let team_ids: Vec<String> = products.iter().map(|p| p.team_id.clone()).collect();

        let environments = sqlx::query_as::<_, EnvironmentRow>(
            r#"
            SELECT id, "productId" AS product_id, type::text AS environment_type
            FROM "Environment"
            WHERE "productId" = ANY($1) AND type = 'production'
            ORDER BY "createdAt", id
            "#,
        )
        .bind(&product_ids)
        .fetch_all(&self.pool)
        .await
        .context("loading production environments")?;

        let environment_ids: Vec<String> = environments.iter().map(|e| e.id.clone()).collect();

        let surveys = sqlx::query_as::<_, SurveyRow>(
            r#"
            SELECT id, "environmentId" AS environment_id, name, status::text AS status, questions
            FROM "Survey"
            WHERE "environmentId" = ANY($1) AND status <> 'draft'
            ORDER BY "createdAt", id
            "#,
        )
        .bind(&environment_ids)
        .fetch_all(&self.pool)
        .await
        .context("loading surveys")?;

        let survey_ids: Vec<String> = surveys.iter().map(|s| s.id.clone()).collect();

        let responses = sqlx::query_as::<_, ResponseRow>(
            r#"
            SELECT id, "surveyId" AS survey_id, "createdAt" AS created_at, finished, data
            FROM "Response"
            WHERE "surveyId" = ANY($1) AND "createdAt" >= $2
            ORDER BY "createdAt", id
            "#,
        )
        .bind(&survey_ids)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("loading responses")?;

        let displays = sqlx::query_as::<_, DisplayRow>(
            r#"
            SELECT "surveyId" AS survey_id, status::text AS status
            FROM "Display"
            WHERE "surveyId" = ANY($1)
            "#,
        )
        .bind(&survey_ids)
        .fetch_all(&self.pool)
        .await
        .context("loading displays")?;

        let members = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT m."teamId" AS team_id, u.email, u."notificationSettings" AS notification_settings
            FROM "Membership" m
            JOIN "User" u ON u.id = m."userId"
            WHERE m."teamId" = ANY($1)
            ORDER BY u.email
            "#,
        )
        .bind(&team_ids)
        .fetch_all(&self.pool)
        .await
        .context("loading team memberships")?;

        tracing::debug!(
            "Fetched {} products, {} environments, {} surveys, {} responses, {} displays",
            products.len(),
            environments.len(),
            surveys.len(),
            responses.len(),
            displays.len()
        );

        assemble(products, environments, surveys, responses, displays, members)
    }
}

/// Groups flat rows into the nested product shape, preserving row order.
fn assemble(
    products: Vec<ProductRow>,
    environments: Vec<EnvironmentRow>,
    surveys: Vec<SurveyRow>,
    responses: Vec<ResponseRow>,
    displays: Vec<DisplayRow>,
    members: Vec<MemberRow>,
) -> Result<Vec<Product>, AppError> {
    let mut responses_by_survey: HashMap<String, Vec<SurveyResponse>> = HashMap::new();
    for row in responses {
        responses_by_survey
            .entry(row.survey_id)
            .or_default()
            .push(SurveyResponse {
                id: row.id,
                created_at: row.created_at,
                finished: row.finished,
                data: row.data.0,
            });
    }

    let mut displays_by_survey: HashMap<String, Vec<Display>> = HashMap::new();
    for row in displays {
        let status = parse_enum::<DisplayStatus>("display status", &row.status)?;
        displays_by_survey
            .entry(row.survey_id)
            .or_default()
            .push(Display { status });
    }

    let mut surveys_by_environment: HashMap<String, Vec<Survey>> = HashMap::new();
    for row in surveys {
        let status = parse_enum::<SurveyStatus>("survey status", &row.status)?;
        // Drafts never take part in the summary, whatever the query returned.
        if status == SurveyStatus::Draft {
            tracing::debug!("Dropping draft survey {}", row.id);
            continue;
        }
        let survey = Survey {
            responses: responses_by_survey.remove(&row.id).unwrap_or_default(),
            displays: displays_by_survey.remove(&row.id).unwrap_or_default(),
            id: row.id,
            name: row.name,
            status,
            questions: row.questions.0,
        };
        surveys_by_environment
            .entry(row.environment_id)
            .or_default()
            .push(survey);
    }

    let mut environments_by_product: HashMap<String, Vec<Environment>> = HashMap::new();
    for row in environments {
        let environment_type =
            parse_enum::<EnvironmentType>("environment type", &row.environment_type)?;
        let environment = Environment {
            surveys: surveys_by_environment.remove(&row.id).unwrap_or_default(),
            id: row.id,
            environment_type,
        };
        environments_by_product
            .entry(row.product_id)
            .or_default()
            .push(environment);
    }

    let mut memberships_by_team: HashMap<String, Vec<Membership>> = HashMap::new();
    for row in members {
        memberships_by_team
            .entry(row.team_id)
            .or_default()
            .push(Membership {
                user: User {
                    email: row.email,
                    notification_settings: row
                        .notification_settings
                        .map(|settings| settings.0)
                        .unwrap_or_default(),
                },
            });
    }

    Ok(products
        .into_iter()
        .map(|row| Product {
            environments: environments_by_product.remove(&row.id).unwrap_or_default(),
            team: Team {
                // Several products can share a team, so memberships are cloned.
                memberships: memberships_by_team
                    .get(&row.team_id)
                    .cloned()
                    .unwrap_or_default(),
                id: row.team_id,
            },
            id: row.id,
            name: row.name,
        })
        .collect())
}

/// Parses a database enum label through its serde representation.
fn parse_enum<T: serde::de::DeserializeOwned>(what: &str, label: &str) -> Result<T, AppError> {
    serde_json::from_value(Value::String(label.to_string()))
        .map_err(|_| AppError::InternalError(format!("unknown {} '{}'", what, label)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product_row(id: &str, team_id: &str) -> ProductRow {
        ProductRow {
            id: id.to_string(),
            name: format!("Product {}", id),
            team_id: team_id.to_string(),
        }
    }

    #[test]
    fn test_assemble_nests_rows_under_their_parents() {
        let products = vec![product_row("p1", "t1"), product_row("p2", "t1")];
        let environments = vec![EnvironmentRow {
            id: "e1".to_string(),
            product_id: "p1".to_string(),
            environment_type: "production".to_string(),
        }];
        let surveys = vec![SurveyRow {
            id: "s1".to_string(),
            environment_id: "e1".to_string(),
            name: "NPS".to_string(),
            status: "inProgress".to_string(),
            questions: Json(vec![Question {
                id: "q1".to_string(),
                headline: "Score?".to_string(),
            }]),
        }];
        let responses = vec![ResponseRow {
            id: "r1".to_string(),
            survey_id: "s1".to_string(),
            created_at: Utc::now(),
            finished: true,
            data: Json(json!({"q1": 10}).as_object().cloned().unwrap()),
        }];
        let displays = vec![
            DisplayRow {
                survey_id: "s1".to_string(),
                status: "seen".to_string(),
            },
            DisplayRow {
                survey_id: "s1".to_string(),
                status: "responded".to_string(),
            },
        ];
        let members = vec![MemberRow {
            team_id: "t1".to_string(),
            email: "ana@example.com".to_string(),
            notification_settings: None,
        }];

        let assembled =
            assemble(products, environments, surveys, responses, displays, members).unwrap();

        assert_eq!(assembled.len(), 2);
        let p1 = &assembled[0];
        let survey = &p1.environments[0].surveys[0];
        assert_eq!(survey.status, SurveyStatus::InProgress);
        assert_eq!(survey.responses.len(), 1);
        assert_eq!(survey.displays.len(), 2);
        assert_eq!(p1.team.memberships[0].user.email, "ana@example.com");

        // Shared team, no environments of its own.
        let p2 = &assembled[1];
        assert!(p2.environments.is_empty());
        assert_eq!(p2.team.memberships.len(), 1);
    }

    #[test]
    fn test_assemble_drops_draft_surveys() {
        let products = vec![product_row("p1", "t1")];
        let environments = vec![EnvironmentRow {
            id: "e1".to_string(),
            product_id: "p1".to_string(),
            environment_type: "production".to_string(),
        }];
        let surveys = ["draft", "inProgress"]
            .iter()
            .enumerate()
            .map(|(i, status)| SurveyRow {
                id: format!("s{}", i),
                environment_id: "e1".to_string(),
                name: "NPS".to_string(),
                status: status.to_string(),
                questions: Json(Vec::new()),
            })
            .collect();
        let displays = vec![DisplayRow {
            survey_id: "s0".to_string(),
            status: "seen".to_string(),
        }];

        let assembled =
            assemble(products, environments, surveys, Vec::new(), displays, Vec::new()).unwrap();

        let surveys = &assembled[0].environments[0].surveys;
        assert_eq!(surveys.len(), 1);
        assert_eq!(surveys[0].id, "s1");
        assert_eq!(surveys[0].status, SurveyStatus::InProgress);
        assert!(surveys[0].displays.is_empty());
    }

    #[test]
    fn test_assemble_rejects_unknown_survey_status() {
        let surveys = vec![SurveyRow {
            id: "s1".to_string(),
            environment_id: "e1".to_string(),
            name: "NPS".to_string(),
            status: "archived".to_string(),
            questions: Json(Vec::new()),
        }];

        let err = assemble(Vec::new(), Vec::new(), surveys, Vec::new(), Vec::new(), Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("unknown survey status"));
    }
}
