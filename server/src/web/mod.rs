//! HTTP surface: webhook ingestion, subscriber management, newsletter send.

pub mod handlers;
pub mod signature;

pub use handlers::{
    health, list_subscribers, send_newsletter, tally_webhook, unsubscribe, AppState,
};
pub use signature::{is_signature_verification_enabled, verify_signature, SIGNATURE_HEADER};
