use chrono::Utc;
use std::env;

use survey_weekly_digest::db::Database;
use survey_weekly_digest::insights::window_start;
use survey_weekly_digest::models::{EnvironmentType, SurveyStatus};
use survey_weekly_digest::repository::{PgSummarySource, SummarySource};

/// Smoke test for the PostgreSQL summary source against a platform database.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn fetch_products_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let source = PgSummarySource::new(db.pool.clone());

    let since = window_start(Utc::now());
    let products = source.fetch_products(since).await?;

    for product in &products {
        for environment in &product.environments {
            assert_eq!(environment.environment_type, EnvironmentType::Production);
            for survey in &environment.surveys {
                assert_ne!(survey.status, SurveyStatus::Draft);
                assert!(survey.responses.iter().all(|r| r.created_at >= since));
            }
        }
    }
    Ok(())
}
