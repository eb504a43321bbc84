//! Tally subscriber service.
//!
//! Accepts form-submission webhooks from Tally, persists subscribers and
//! raw submissions in SQLite, and broadcasts newsletters to active
//! subscribers over SMTP.
//!
//! ## Architecture
//!
//! ```text
//! Webhook → signature check → audit log → field extraction → upsert → welcome email
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod mailer;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::ApiError;
pub use ingest::{IngestOutcome, IngestPipeline, TallyWebhook};
pub use mailer::{Notifier, SmtpMailer};
pub use store::Database;
pub use web::AppState;
