//! Typed Tally webhook envelope.
//!
//! Tally posts a JSON envelope of the shape
//! `{"data": {"formId", "formName", "fields": [{"type", "label", "value"}]}}`.
//! Every key is optional: providers drift, and a missing key must degrade
//! to an absent value rather than reject the whole webhook.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field type tag Tally uses for email inputs.
pub const EMAIL_FIELD_TYPE: &str = "INPUT_EMAIL";

/// Top-level webhook envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyWebhook {
    #[serde(default)]
    pub data: TallyData,
}

/// The `data` object of the envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyData {
    #[serde(default, rename = "formId")]
    pub form_id: Option<String>,
    #[serde(default, rename = "formName")]
    pub form_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<TallyField>,
}

/// One submitted form field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyField {
    /// Provider field type tag (e.g. `INPUT_EMAIL`, `INPUT_TEXT`)
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
    /// Human-readable field label as configured in the form
    #[serde(default)]
    pub label: Option<String>,
    /// Submitted value; arbitrary JSON scalar
    #[serde(default)]
    pub value: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_envelope_deserializes() {
        let raw = json!({
            "data": {
                "formId": "f1",
                "formName": "Signup",
                "fields": [
                    {"type": "INPUT_EMAIL", "label": "Email", "value": "a@x.com"},
                    {"type": "TEXT", "label": "Name", "value": "Ada"}
                ]
            }
        });

        let envelope: TallyWebhook = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.data.form_id.as_deref(), Some("f1"));
        assert_eq!(envelope.data.fields.len(), 2);
        assert_eq!(
            envelope.data.fields[0].field_type.as_deref(),
            Some(EMAIL_FIELD_TYPE)
        );
    }

    #[test]
    fn test_missing_keys_default() {
        let envelope: TallyWebhook = serde_json::from_value(json!({})).unwrap();
        assert!(envelope.data.form_id.is_none());
        assert!(envelope.data.fields.is_empty());

        let envelope: TallyWebhook =
            serde_json::from_value(json!({"data": {"fields": [{}]}})).unwrap();
        let field = &envelope.data.fields[0];
        assert!(field.field_type.is_none());
        assert!(field.label.is_none());
        assert!(field.value.is_none());
    }
}
