//! Field extraction: normalize a Tally field list into `(email, name, data)`.
//!
//! Pure function, no store or transport access. Policy:
//! - every field lands in `data` under its lower-cased label
//!   (label collisions are last-write-wins);
//! - `email` binds to the first `INPUT_EMAIL`-typed field with a string value;
//! - `name` binds to the first non-email field whose label is one of the
//!   recognized name labels.

use serde_json::{Map, Value};
use tracing::debug;

use crate::ingest::payload::{TallyField, EMAIL_FIELD_TYPE};

/// Labels (lower-cased) treated as the subscriber's name.
const NAME_LABELS: [&str; 3] = ["name", "full name", "first name"];

/// Normalized contact data extracted from one submission.
#[derive(Debug, Default, PartialEq)]
pub struct ExtractedContact {
    pub email: Option<String>,
    pub name: Option<String>,
    pub data: Map<String, Value>,
}

/// Extract a contact from the submitted fields.
///
/// A submission without an email-typed field yields `email: None`; the
/// caller records the raw submission but skips the subscriber upsert.
pub fn extract_contact(fields: &[TallyField]) -> ExtractedContact {
    let mut contact = ExtractedContact::default();
    let mut email_bound = false;

    for field in fields {
        let label = field
            .label
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        let value = field.value.clone().unwrap_or(Value::Null);

        contact.data.insert(label.clone(), value);

        if field.field_type.as_deref() == Some(EMAIL_FIELD_TYPE) {
            if !email_bound {
                email_bound = true;
                contact.email = field
                    .value
                    .as_ref()
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
        } else if NAME_LABELS.contains(&label.as_str()) && contact.name.is_none() {
            contact.name = field
                .value
                .as_ref()
                .and_then(Value::as_str)
                .map(str::to_string);
        }
    }

    debug!(
        has_email = contact.email.is_some(),
        has_name = contact.name.is_some(),
        field_count = contact.data.len(),
        "contact_extracted"
    );

    contact
}
