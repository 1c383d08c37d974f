//! Weekly Survey Digest Library
//!
//! Sends the weekly survey summary emails of the feedback platform: a
//! scheduler hits an authenticated HTTP endpoint, the job loads the last
//! seven days of survey activity per product, aggregates it, and emails every
//! team member who subscribed to the product's weekly summary.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP handlers and router assembly.
//! - `insights`: Per-product aggregation and notification planning.
//! - `job`: The weekly summary run (fetch, plan, dispatch).
//! - `mailer`: Notifier trait and the mail API client.
//! - `models`: Survey platform entities.
//! - `repository`: Read-only data access for the job.
//! - `templates`: Email rendering.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod insights;
pub mod job;
pub mod mailer;
pub mod models;
pub mod repository;
pub mod templates;
