//! Runs the weekly summary once, without going through the HTTP trigger.
//!
//! Useful from a plain crontab or to re-send after a failed run.

use std::sync::Arc;

use survey_weekly_digest::config::Config;
use survey_weekly_digest::db::Database;
use survey_weekly_digest::job::WeeklySummaryJob;
use survey_weekly_digest::mailer::MailClient;
use survey_weekly_digest::repository::PgSummarySource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "survey_weekly_digest=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;

    let job = WeeklySummaryJob::new(
        Arc::new(PgSummarySource::new(db.pool.clone())),
        Arc::new(MailClient::new(&config)?),
    );

    let report = job.run(chrono::Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
