use std::fmt::Write;

use serde_json::Value;

use crate::insights::{Insights, ProductRef, SurveySummary, WeeklySummaryPayload};

/// Response entries shown per survey before linking out to the web app.
pub const MAX_RESPONSES_IN_EMAIL: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub fn no_live_survey_email(product: &ProductRef, webapp_url: &str) -> RenderedEmail {
    let mut html = String::new();
    let _ = writeln!(html, "<h1>Hey 👋</h1>");
    let _ = writeln!(
        html,
        "<p>Your weekly survey report for <strong>{}</strong> is here, but there were no completed responses in the last 7 days.</p>",
        escape_html(&product.name)
    );
    let _ = writeln!(
        html,
        "<p>Make sure a survey is live and shown to your users to start collecting feedback.</p>"
    );
    let _ = writeln!(
        html,
        r#"<p><a href="{}">Set up a survey</a></p>"#,
        surveys_link(webapp_url, &product.environment_id)
    );
    push_footer(&mut html, webapp_url, &product.environment_id);

    RenderedEmail {
        subject: format!("{} User Insights - Last Week", product.name),
        html,
    }
}

pub fn weekly_summary_email(payload: &WeeklySummaryPayload, webapp_url: &str) -> RenderedEmail {
    let mut html = String::new();
    let _ = writeln!(html, "<h1>Hey 👋</h1>");
    let _ = writeln!(
        html,
        "<p>Weekly report for <strong>{}</strong>, {} to {}</p>",
        escape_html(&payload.product_name),
        payload.last_week_date.format("%b %-d"),
        payload.current_date.format("%b %-d, %Y")
    );

    push_insights(&mut html, &payload.insights);

    for survey in &payload.surveys {
        push_survey(&mut html, survey);
    }

    let _ = writeln!(
        html,
        r#"<p><a href="{}">View all surveys</a></p>"#,
        surveys_link(webapp_url, &payload.environment_id)
    );
    push_footer(&mut html, webapp_url, &payload.environment_id);

    RenderedEmail {
        subject: format!("{} User Insights - Last Week", payload.product_name),
        html,
    }
}

fn push_insights(html: &mut String, insights: &Insights) {
    let completion = insights
        .finite_completion_rate()
        .map(|rate| format!("{}%", rate))
        .unwrap_or_else(|| "-".to_string());

    let _ = writeln!(html, "<table>");
    for (label, value) in [
        ("Live surveys", insights.num_live_survey.to_string()),
        ("Displays", insights.total_displays.to_string()),
        ("Responses", insights.total_responses.to_string()),
        ("Completed", insights.total_completed_responses.to_string()),
        ("Completion rate", completion),
    ] {
        let _ = writeln!(html, "<tr><td>{}</td><td>{}</td></tr>", label, value);
    }
    let _ = writeln!(html, "</table>");
}

fn push_survey(html: &mut String, survey: &SurveySummary) {
    let _ = writeln!(
        html,
        "<h2>{} <small>({}, {} responses)</small></h2>",
        escape_html(&survey.name),
        survey.status.label(),
        survey.response_count
    );

    if survey.responses.is_empty() {
        let _ = writeln!(html, "<p>No responses this week.</p>");
        return;
    }

    let _ = writeln!(html, "<ul>");
    for entry in survey.responses.iter().take(MAX_RESPONSES_IN_EMAIL) {
        let _ = writeln!(
            html,
            "<li><strong>{}</strong>: {}</li>",
            escape_html(&entry.headline),
            escape_html(&render_answer(entry.answer.as_ref()))
        );
    }
    let _ = writeln!(html, "</ul>");

    if survey.responses.len() > MAX_RESPONSES_IN_EMAIL {
        let _ = writeln!(
            html,
            "<p>and {} more</p>",
            survey.responses.len() - MAX_RESPONSES_IN_EMAIL
        );
    }
}

fn push_footer(html: &mut String, webapp_url: &str, environment_id: &str) {
    let _ = writeln!(
        html,
        r#"<p><small>You receive this because weekly summaries are enabled. <a href="{}/environments/{}/settings/notifications">Manage notifications</a></small></p>"#,
        webapp_url, environment_id
    );
}

fn surveys_link(webapp_url: &str, environment_id: &str) -> String {
    format!("{}/environments/{}/surveys", webapp_url, environment_id)
}

/// Human-readable form of a stored answer.
pub fn render_answer(answer: Option<&Value>) -> String {
    match answer {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| render_answer(Some(item)))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
