//! # forma-providers
//!
//! LLM provider implementations for Forma.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use forma_core::error::FormaError;
use reqwest::StatusCode;

/// Map a non-success HTTP status to the right error variant. Quota and
/// rate-limit rejections are distinguished so the classifier cascade can
/// retry the same model instead of advancing.
pub(crate) fn status_error(provider: &str, status: StatusCode, body: String) -> FormaError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        FormaError::RateLimited(format!("{provider} returned {status}: {body}"))
    } else {
        FormaError::Provider(format!("{provider} returned {status}: {body}"))
    }
}

/// Build a reqwest client with the given request timeout.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_maps_to_rate_limited() {
        let err = status_error("anthropic", StatusCode::TOO_MANY_REQUESTS, "quota".into());
        assert!(matches!(err, FormaError::RateLimited(_)));
    }

    #[test]
    fn test_other_status_maps_to_provider() {
        let err = status_error("openai", StatusCode::INTERNAL_SERVER_ERROR, "oops".into());
        assert!(matches!(err, FormaError::Provider(_)));
    }
}
