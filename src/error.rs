// =============================================================================
// error.rs — EVERYTHING THAT CAN GO WRONG, NAMED
// =============================================================================
//
// Three families of failure. Configuration errors stop the process before it
// starts. Fetch errors never leave the Chartink client; they get folded into
// a FetchOutcome and shouted at the chat. Notify errors get logged and
// dropped, since there is nobody left to shout at when the shouting channel
// itself is broken.
// =============================================================================

use thiserror::Error;

/// Raised by `Config::validate` when a required variable is absent or a
/// value is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {var} is not set")]
    Missing { var: &'static str },

    #[error("environment variable {var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Failures inside one fetch sequence (GET page, scrape token, POST scan).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("csrf-token meta tag not found on screener page")]
    MissingCsrfToken,

    #[error("invalid screener response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures delivering a message to the chat.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telegram rejected message (HTTP {status}): {description}")]
    Api { status: u16, description: String },
}
