//! Chat delivery errors.

use thiserror::Error;

/// Errors returned by a [`ChatChannel`](crate::ChatChannel).
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Transport failure or undecodable response
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A required setting (token or channel) is missing
    #[error("Channel not configured: {0} is not set")]
    NotConfigured(String),

    /// Slack answered `ok: false` with this error code
    #[error("Slack API error: {0}")]
    Api(String),

    /// HTTP 429
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Any other non-success response
    #[error("{0}")]
    Other(String),
}
