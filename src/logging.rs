//! Tracing setup and log redaction.
//!
//! Any log line that can carry a secret-bearing string must pass through
//! [`redact`] first. The secret value is replaced with a fixed marker rather
//! than dropped, so the log shape stays stable for downstream tooling.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Fixed marker substituted for secret values in log output.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Filter directives for the subscriber: an explicit `RUST_LOG` wins,
/// otherwise the validated `LOG_LEVEL` from configuration applies.
fn filter_directives(rust_log: Option<&str>, configured_level: &str) -> String {
    match rust_log {
        Some(directives) if !directives.is_empty() => directives.to_string(),
        _ => configured_level.to_lowercase(),
    }
}

/// Initialize the global tracing subscriber from the logging configuration.
pub fn init_tracing(config: &LoggingConfig) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = EnvFilter::new(filter_directives(rust_log.as_deref(), &config.level));

    match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Plain => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Replace every occurrence of each secret value in `message` with the
/// redaction marker. Empty secrets are ignored so a blank config value can
/// never turn into a replace-everything rule.
pub fn redact(message: &str, secrets: &[&str]) -> String {
    let mut redacted = message.to_string();
    for secret in secrets {
        if secret.is_empty() {
            continue;
        }
        redacted = redacted.replace(secret, REDACTION_MARKER);
    }
    redacted
}
