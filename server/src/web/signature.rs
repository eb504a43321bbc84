//! Tally webhook signature verification.
//!
//! Tally signs the raw request body with HMAC-SHA256 and sends the
//! base64-encoded digest in the `tally-signature` header.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "tally-signature";

/// Verify a Tally webhook signature against the raw request body.
///
/// The expected value is `base64(HMAC-SHA256(secret, body))`. Returns
/// `true` when the presented signature matches.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    if secret.is_empty() || signature.is_empty() {
        warn!(
            has_secret = !secret.is_empty(),
            has_signature = !signature.is_empty(),
            "tally_signature_missing_fields"
        );
        return false;
    }

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("tally_signature_invalid_key");
            return false;
        }
    };

    mac.update(body);
    let expected = BASE64.encode(mac.finalize().into_bytes());

    // Constant-time comparison to prevent timing attacks
    let valid = constant_time_compare(&expected, signature);

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = signature.len(),
            "tally_signature_mismatch"
        );
    }

    valid
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Check if signature verification is enabled.
pub fn is_signature_verification_enabled(secret: &Option<String>) -> bool {
    secret
        .as_ref()
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        BASE64.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_verify_signature_valid() {
        let secret = "test-webhook-secret";
        let body = br#"{"data":{"formId":"f1","fields":[]}}"#;
        let signature = sign(secret, body);

        assert!(verify_signature(secret, body, &signature));
    }

    #[test]
    fn test_verify_signature_wrong_secret() {
        let body = br#"{"data":{}}"#;
        let signature = sign("other-secret", body);

        assert!(!verify_signature("test-secret", body, &signature));
    }

    #[test]
    fn test_verify_signature_tampered_body() {
        let secret = "test-secret";
        let signature = sign(secret, br#"{"data":{"formId":"f1"}}"#);

        assert!(!verify_signature(secret, br#"{"data":{"formId":"f2"}}"#, &signature));
    }

    #[test]
    fn test_verify_signature_missing_fields() {
        assert!(!verify_signature("", b"body", "sig"));
        assert!(!verify_signature("key", b"body", ""));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_is_signature_verification_enabled() {
        assert!(!is_signature_verification_enabled(&None));
        assert!(!is_signature_verification_enabled(&Some("".to_string())));
        assert!(!is_signature_verification_enabled(&Some("   ".to_string())));
        assert!(is_signature_verification_enabled(&Some(
            "key123".to_string()
        )));
    }
}
