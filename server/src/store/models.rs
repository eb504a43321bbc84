//! Database row types, serialized as-is in API responses.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// A durable contact record keyed by email.
///
/// `data` holds every form field ever submitted for this address,
/// keyed by lower-cased field label. Unsubscribing flips `active`;
/// rows are never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct Subscriber {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub subscribed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
    pub data: Map<String, Value>,
}

/// Immutable audit record of one inbound webhook payload.
#[derive(Debug, Clone, Serialize)]
pub struct FormSubmission {
    pub id: String,
    pub form_id: Option<String>,
    pub submission_data: Value,
    pub received_at: DateTime<Utc>,
}
