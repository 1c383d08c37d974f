use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Shared secret the scheduler sends in the `x-api-key` header.
    pub cron_secret: String,
    pub mail_api_url: String,
    pub mail_api_token: String,
    pub mail_from: String,
    /// Public URL of the web app, used for links inside emails.
    pub webapp_url: String,
    pub mail_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("DB_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            cron_secret: std::env::var("CRON_SECRET")
                .map_err(|_| anyhow::anyhow!("CRON_SECRET environment variable required"))
                .and_then(|secret| {
                    if secret.trim().is_empty() {
                        anyhow::bail!("CRON_SECRET cannot be empty");
                    }
                    Ok(secret)
                })?,
            mail_api_url: std::env::var("MAIL_API_URL")
                .map_err(|_| anyhow::anyhow!("MAIL_API_URL environment variable required"))
                .and_then(|url| validate_http_url("MAIL_API_URL", url))?,
            mail_api_token: std::env::var("MAIL_API_TOKEN")
                .map_err(|_| anyhow::anyhow!("MAIL_API_TOKEN environment variable required"))
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("MAIL_API_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            mail_from: std::env::var("MAIL_FROM")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "noreply@example.com".to_string()),
            webapp_url: std::env::var("WEBAPP_URL")
                .map_err(|_| anyhow::anyhow!("WEBAPP_URL environment variable required"))
                .and_then(|url| validate_http_url("WEBAPP_URL", url))?,
            mail_timeout_secs: std::env::var("MAIL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAIL_TIMEOUT_SECS must be a whole number"))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database URL: {}...", url_prefix(&config.database_url));
        tracing::debug!("Mail API URL: {}", config.mail_api_url);
        tracing::debug!("Web app URL: {}", config.webapp_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

/// First characters of a URL, enough to tell hosts apart without leaking credentials.
fn url_prefix(url: &str) -> String {
    url.chars().take(20).collect()
}

/// Checks that `value` is a parseable http(s) URL and strips any trailing slash.
fn validate_http_url(name: &str, value: String) -> anyhow::Result<String> {
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    let parsed =
        Url::parse(value.trim()).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(value.trim().trim_end_matches('/').to_string())
}
