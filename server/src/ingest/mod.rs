//! Webhook ingestion pipeline.
//!
//! One inbound webhook flows through a fixed sequence:
//!
//! ```text
//! verified body → store submission → extract fields → upsert subscriber → welcome email
//! ```
//!
//! The raw submission is stored unconditionally, before extraction, so
//! the audit trail covers every webhook call even when no email is found.
//! Store failures abort the request; a failed welcome email does not.

pub mod extract;
pub mod payload;

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::info;

use crate::ingest::extract::extract_contact;
use crate::mailer::Notifier;
use crate::store::Database;

pub use extract::ExtractedContact;
pub use payload::{TallyData, TallyField, TallyWebhook, EMAIL_FIELD_TYPE};

/// Outcome of one ingested webhook.
#[derive(Debug)]
pub struct IngestOutcome {
    /// Id of the stored audit record (always present)
    pub submission_id: String,
    /// Id of the created or updated subscriber, when an email was found
    pub subscriber_id: Option<String>,
    /// Whether the welcome email went out
    pub welcome_sent: bool,
}

/// The ingestion orchestrator. Owns nothing; both collaborators are
/// injected by the process entry point.
pub struct IngestPipeline {
    db: Arc<Database>,
    mailer: Arc<dyn Notifier>,
}

impl IngestPipeline {
    pub fn new(db: Arc<Database>, mailer: Arc<dyn Notifier>) -> Self {
        Self { db, mailer }
    }

    /// Ingest one verified webhook.
    ///
    /// `raw` is the payload exactly as received, stored verbatim in the
    /// audit log; `envelope` is its typed projection.
    pub async fn ingest(&self, raw: &Value, envelope: &TallyWebhook) -> Result<IngestOutcome> {
        let form_id = envelope.data.form_id.as_deref();

        let submission_id = self.db.insert_submission(form_id, raw)?;
        info!(
            submission_id = %submission_id,
            form_id = form_id.unwrap_or(""),
            field_count = envelope.data.fields.len(),
            "submission_stored"
        );

        let contact = extract_contact(&envelope.data.fields);

        let Some(email) = contact.email.as_deref() else {
            info!(submission_id = %submission_id, "no_email_field_found");
            return Ok(IngestOutcome {
                submission_id,
                subscriber_id: None,
                welcome_sent: false,
            });
        };

        let subscriber_id = self
            .db
            .upsert_subscriber(email, contact.name.as_deref(), &contact.data)?;
        info!(
            subscriber_id = %subscriber_id,
            email = %email,
            "subscriber_upserted"
        );

        // A failed send never rolls back the stored records.
        let welcome_sent = self
            .mailer
            .send_welcome(email, contact.name.as_deref())
            .await;

        info!(
            submission_id = %submission_id,
            subscriber_id = %subscriber_id,
            welcome_sent = welcome_sent,
            "ingest_complete"
        );

        Ok(IngestOutcome {
            submission_id,
            subscriber_id: Some(subscriber_id),
            welcome_sent,
        })
    }
}
