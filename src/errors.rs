use serde::Serialize;

/// Standard error payload handed to the presentation layer.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Engine error taxonomy.
///
/// `Clone` is deliberate: coalesced in-flight fetches share one result
/// between every attached caller, so the error side must be cloneable.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    /// A critical upstream feed failed (network error or non-2xx).
    /// Carries the failed source name per the propagation policy — only
    /// the weather feed surfaces this; the seeing feed degrades silently.
    #[error("{source_name} unavailable: {message}")]
    Upstream {
        source_name: &'static str,
        message: String,
    },

    /// An upstream fetch exceeded the per-request deadline.
    #[error("{source_name} timed out after {seconds}s")]
    Timeout {
        source_name: &'static str,
        seconds: u64,
    },

    /// Input validation failed before any fetch was attempted.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Classify a `reqwest` failure for a named upstream source.
    pub fn from_reqwest(source_name: &'static str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout {
                source_name,
                seconds: timeout_secs,
            }
        } else {
            AppError::Upstream {
                source_name,
                message: err.to_string(),
            }
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }
}
