/// Mail client tests against a mocked mail provider.
use chrono::{TimeZone, Utc};
use survey_weekly_digest::config::Config;
use survey_weekly_digest::errors::AppError;
use survey_weekly_digest::insights::{Insights, ProductRef, WeeklySummaryPayload};
use survey_weekly_digest::mailer::{idempotency_key, MailClient, Notifier};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(mail_api_url: String) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 8080,
        cron_secret: "cron".to_string(),
        mail_api_url,
        mail_api_token: "mail_token".to_string(),
        mail_from: "digest@example.com".to_string(),
        webapp_url: "https://app.example.com".to_string(),
        mail_timeout_secs: 5,
    }
}

fn product() -> ProductRef {
    ProductRef {
        id: "prod_1".to_string(),
        name: "Acme".to_string(),
        environment_id: "env_prod".to_string(),
        current_date: Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_no_live_survey_email_is_posted_to_single_recipient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("Authorization", "Bearer mail_token"))
        .and(header_exists("Idempotency-Key"))
        .and(body_partial_json(serde_json::json!({
            "from": "digest@example.com",
            "to": ["ana@example.com"],
            "subject": "Acme User Insights - Last Week"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "em_1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = MailClient::new(&create_test_config(mock_server.uri())).unwrap();
    let result = client
        .send_no_live_survey_notification("ana@example.com", &product())
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_weekly_summary_is_one_email_to_all_recipients() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(body_partial_json(serde_json::json!({
            "to": ["ana@example.com", "bo@example.com"]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let now = Utc::now();
    let payload = WeeklySummaryPayload {
        environment_id: "env_prod".to_string(),
        current_date: now,
        last_week_date: now - chrono::Duration::days(7),
        product_id: "prod_1".to_string(),
        product_name: "Acme".to_string(),
        surveys: Vec::new(),
        insights: Insights::default(),
    };

    let client = MailClient::new(&create_test_config(mock_server.uri())).unwrap();
    let recipients = vec!["ana@example.com".to_string(), "bo@example.com".to_string()];
    let result = client
        .send_weekly_summary_notification(&recipients, &payload)
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_provider_error_becomes_external_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid recipient"))
        .mount(&mock_server)
        .await;

    let client = MailClient::new(&create_test_config(mock_server.uri())).unwrap();
    let result = client
        .send_no_live_survey_notification("not-an-email", &product())
        .await;

    match result {
        Err(AppError::ExternalApiError(msg)) => {
            assert!(msg.contains("422"));
            assert!(msg.contains("invalid recipient"));
        }
        other => panic!("expected external API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_live_survey_key_uses_the_run_date() {
    let mock_server = MockServer::start().await;
    let product = product();
    let expected_key = idempotency_key(
        "no_responses",
        &product.id,
        &["ana@example.com".to_string()],
        product.current_date,
    );

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("Idempotency-Key", expected_key.as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = MailClient::new(&create_test_config(mock_server.uri())).unwrap();
    let result = client
        .send_no_live_survey_notification("ana@example.com", &product)
        .await;

    assert!(result.is_ok());
}
