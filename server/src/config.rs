//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables at startup.
//! Missing variables fall back to development defaults; malformed
//! values are logged and replaced by the default.

use std::env;
use tracing::warn;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Path to the SQLite database file
    pub database_path: String,

    /// Shared secret for Tally webhook signature verification.
    /// When unset, inbound webhooks are trusted without verification.
    pub tally_webhook_secret: Option<String>,

    // =========================================================================
    // Outbound mail (SMTP)
    // =========================================================================

    /// SMTP relay host
    pub smtp_host: String,

    /// SMTP relay port (implicit TLS)
    pub smtp_port: u16,

    /// SMTP username
    pub smtp_username: Option<String>,

    /// SMTP password (app password for Gmail-style relays)
    pub smtp_password: Option<String>,

    /// From address for all outbound mail; defaults to the SMTP username
    pub mail_from: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let smtp_username = env::var("SMTP_USERNAME").ok().filter(|v| !v.is_empty());
        let mail_from = env::var("MAIL_FROM")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| smtp_username.clone())
            .unwrap_or_else(|| "newsletter@localhost".to_string());

        Config {
            port: parse_or("PORT", 8080),

            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "subscribers.db".to_string()),

            tally_webhook_secret: env::var("TALLY_WEBHOOK_SECRET")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),

            smtp_port: parse_or("SMTP_PORT", 465),

            smtp_username,

            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty()),

            mail_from,
        }
    }
}

/// Parse an environment variable, falling back to a default on absence
/// or parse failure.
fn parse_or<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(env_var = name, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_valid() {
        env::set_var("TEST_PARSE_OR_PORT", "9000");
        let result: u16 = parse_or("TEST_PARSE_OR_PORT", 8080);
        assert_eq!(result, 9000);
        env::remove_var("TEST_PARSE_OR_PORT");
    }

    #[test]
    fn test_parse_or_malformed() {
        env::set_var("TEST_PARSE_OR_BAD", "not-a-number");
        let result: u16 = parse_or("TEST_PARSE_OR_BAD", 8080);
        assert_eq!(result, 8080);
        env::remove_var("TEST_PARSE_OR_BAD");
    }

    #[test]
    fn test_parse_or_default() {
        let result: u16 = parse_or("NONEXISTENT_VAR", 1234);
        assert_eq!(result, 1234);
    }
}
