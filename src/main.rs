use std::net::SocketAddr;
use std::sync::Arc;

use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use survey_weekly_digest::config::Config;
use survey_weekly_digest::db::Database;
use survey_weekly_digest::handlers::{self, AppState};
use survey_weekly_digest::job::WeeklySummaryJob;
use survey_weekly_digest::mailer::MailClient;
use survey_weekly_digest::repository::PgSummarySource;

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the database pool and the mail
/// client, then serves the health check and the rate-limited cron trigger.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "survey_weekly_digest=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let mailer = MailClient::new(&config)?;
    tracing::info!("Mail client initialized: {}", config.mail_api_url);

    let job = WeeklySummaryJob::new(
        Arc::new(PgSummarySource::new(db.pool.clone())),
        Arc::new(mailer),
    );

    let app_state = Arc::new(AppState {
        config: config.clone(),
        job,
    });

    // A scheduler calls once a week; anything more than a trickle is abuse.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(30)
            .burst_size(5)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
    );

    let protected_routes = handlers::api_routes().layer(ServiceBuilder::new().layer(GovernorLayer {
        config: governor_conf,
    }));

    // Health check bypasses rate limiting
    let app = handlers::build_router(app_state, protected_routes);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
