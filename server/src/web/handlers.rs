//! HTTP endpoint handlers.
//!
//! The webhook handler takes the raw body as [`Bytes`] so signature
//! verification runs over exactly the bytes Tally signed, before any
//! JSON parsing. Everything else is a thin layer over the store and
//! the notifier.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ApiError;
use crate::ingest::payload::TallyWebhook;
use crate::ingest::IngestPipeline;
use crate::mailer::Notifier;
use crate::store::models::Subscriber;
use crate::store::Database;
use crate::web::signature::{
    is_signature_verification_enabled, verify_signature, SIGNATURE_HEADER,
};

/// Shared application state. All collaborators are constructed by the
/// process entry point and injected here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub mailer: Arc<dyn Notifier>,
    pub pipeline: Arc<IngestPipeline>,
}

impl AppState {
    pub fn new(config: Config, db: Arc<Database>, mailer: Arc<dyn Notifier>) -> Self {
        let pipeline = Arc::new(IngestPipeline::new(db.clone(), mailer.clone()));
        Self {
            config: Arc::new(config),
            db,
            mailer,
            pipeline,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Tally Webhook
// =============================================================================

#[derive(Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Tally webhook endpoint.
///
/// 1. Verifies the HMAC signature when both a configured secret and a
///    `tally-signature` header are present
/// 2. Runs the ingestion pipeline
/// 3. Returns 200 even when the payload carries no email field
pub async fn tally_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    info!(
        body_length = body.len(),
        has_signature = signature.is_some(),
        "webhook_received"
    );

    if is_signature_verification_enabled(&state.config.tally_webhook_secret) {
        let secret = state.config.tally_webhook_secret.as_deref().unwrap_or_default();
        match signature {
            Some(sig) => {
                if !verify_signature(secret, &body, sig) {
                    warn!("tally_signature_invalid");
                    return Err(ApiError::Unauthorized);
                }
            }
            // Secret configured but no header presented: trusted.
            None => warn!("tally_signature_header_missing"),
        }
    }

    let raw: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::Validation("Invalid JSON payload".to_string()))?;
    let envelope: TallyWebhook = serde_json::from_value(raw.clone())
        .map_err(|_| ApiError::Validation("Invalid webhook payload".to_string()))?;

    state.pipeline.ingest(&raw, &envelope).await?;

    Ok(Json(WebhookResponse {
        success: true,
        message: "Webhook processed successfully",
    }))
}

// =============================================================================
// Subscribers
// =============================================================================

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_true")]
    pub active_only: bool,
}

fn default_true() -> bool {
    true
}

pub async fn list_subscribers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Subscriber>>, ApiError> {
    let subscribers = state.db.list_subscribers(query.active_only)?;
    Ok(Json(subscribers))
}

#[derive(Deserialize)]
pub struct UnsubscribeRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(request): Json<UnsubscribeRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let email = request
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("Email is required".to_string()))?;

    state.db.unsubscribe(email)?;
    info!(email = %email, "subscriber_unsubscribed");

    Ok(Json(SuccessResponse { success: true }))
}

// =============================================================================
// Newsletter
// =============================================================================

#[derive(Deserialize)]
pub struct NewsletterRequest {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Serialize)]
pub struct NewsletterResponse {
    pub success: bool,
    pub recipients_count: usize,
}

#[derive(Serialize)]
struct NewsletterError {
    error: &'static str,
}

/// Send a newsletter to every active subscriber.
pub async fn send_newsletter(
    State(state): State<AppState>,
    Json(request): Json<NewsletterRequest>,
) -> Result<Response, ApiError> {
    let subject = request
        .subject
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("Subject and content are required".to_string()))?;
    let content = request
        .content
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("Subject and content are required".to_string()))?;

    let recipients: Vec<String> = state
        .db
        .list_subscribers(true)?
        .into_iter()
        .map(|s| s.email)
        .collect();

    if recipients.is_empty() {
        return Err(ApiError::Validation(
            "No active subscribers found".to_string(),
        ));
    }

    info!(
        recipient_count = recipients.len(),
        subject = %subject,
        "newsletter_send_start"
    );

    let sent = state
        .mailer
        .send_bulk(subject, content, &recipients, None)
        .await;

    if !sent {
        return Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(NewsletterError {
                error: "Failed to send newsletter",
            }),
        )
            .into_response());
    }

    Ok(Json(NewsletterResponse {
        success: true,
        recipients_count: recipients.len(),
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use hmac::{Hmac, Mac};
    use serde_json::json;
    use sha2::Sha256;
    use std::path::Path;

    struct NullNotifier;

    #[async_trait]
    impl Notifier for NullNotifier {
        async fn send_welcome(&self, _email: &str, _name: Option<&str>) -> bool {
            true
        }

        async fn send_bulk(
            &self,
            _subject: &str,
            _body: &str,
            _recipients: &[String],
            _attachment: Option<&Path>,
        ) -> bool {
            true
        }
    }

    fn state_with_secret(secret: Option<&str>) -> AppState {
        let mut config = Config::from_env();
        config.tally_webhook_secret = secret.map(str::to_string);
        let db = Arc::new(Database::open_in_memory().unwrap());
        AppState::new(config, db, Arc::new(NullNotifier))
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        BASE64.encode(mac.finalize().into_bytes())
    }

    fn signed_headers(secret: &str, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, sign(secret, body).parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn test_webhook_bad_signature_stores_nothing() {
        let state = state_with_secret(Some("real-secret"));
        let body = Bytes::from(r#"{"data":{"formId":"f1","fields":[]}}"#);
        let headers = signed_headers("wrong-secret", &body);

        let result = tally_webhook(State(state.clone()), headers, body).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
        assert_eq!(state.db.count_submissions().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_webhook_valid_signature_accepted() {
        let state = state_with_secret(Some("real-secret"));
        let body = Bytes::from(r#"{"data":{"formId":"f1","fields":[]}}"#);
        let headers = signed_headers("real-secret", &body);

        let response = tally_webhook(State(state.clone()), headers, body)
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(state.db.count_submissions().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_webhook_missing_header_trusted_when_secret_set() {
        let state = state_with_secret(Some("real-secret"));
        let body = Bytes::from(r#"{"data":{}}"#);

        let response = tally_webhook(State(state.clone()), HeaderMap::new(), body)
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(state.db.count_submissions().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_webhook_invalid_json_rejected() {
        let state = state_with_secret(None);
        let body = Bytes::from("not json");

        let result = tally_webhook(State(state.clone()), HeaderMap::new(), body).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert_eq!(state.db.count_submissions().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_webhook_without_email_returns_success() {
        let state = state_with_secret(None);
        let body = Bytes::from(
            json!({
                "data": {
                    "formId": "f1",
                    "fields": [{"type": "TEXT", "label": "Comment", "value": "hi"}]
                }
            })
            .to_string(),
        );

        let response = tally_webhook(State(state.clone()), HeaderMap::new(), body)
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(state.db.count_submissions().unwrap(), 1);
        assert!(state.db.list_subscribers(false).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_requires_email() {
        let state = state_with_secret(None);

        let result = unsubscribe(
            State(state),
            Json(UnsubscribeRequest { email: None }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_newsletter_requires_subject_and_content() {
        let state = state_with_secret(None);

        let result = send_newsletter(
            State(state),
            Json(NewsletterRequest {
                subject: Some("Hello".to_string()),
                content: None,
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_newsletter_requires_active_subscribers() {
        let state = state_with_secret(None);

        let result = send_newsletter(
            State(state),
            Json(NewsletterRequest {
                subject: Some("Hello".to_string()),
                content: Some("World".to_string()),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_newsletter_sends_to_active_only() {
        let state = state_with_secret(None);
        state
            .db
            .upsert_subscriber("a@x.com", None, &serde_json::Map::new())
            .unwrap();
        state
            .db
            .upsert_subscriber("b@x.com", None, &serde_json::Map::new())
            .unwrap();
        state.db.unsubscribe("b@x.com").unwrap();

        let response = send_newsletter(
            State(state),
            Json(NewsletterRequest {
                subject: Some("Hello".to_string()),
                content: Some("World".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
