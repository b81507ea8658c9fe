//! Typed errors for brickql.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// A structured error returned by the Databricks REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code of the failed response.
    pub status: u16,
    /// Platform error code, e.g. `RESOURCE_DOES_NOT_EXIST` or `SCIM_404`.
    pub error_code: String,
    pub message: String,
}

/// Body shape shared by the REST 2.x endpoints and the SCIM endpoints.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_code: Option<String>,
    message: Option<String>,
    // SCIM
    status: Option<String>,
    detail: Option<String>,
}

impl ApiError {
    pub fn new(status: u16, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code: error_code.into(),
            message: message.into(),
        }
    }

    /// Decode an error response body.
    ///
    /// REST 2.x endpoints answer `{"error_code": ..., "message": ...}`; SCIM
    /// endpoints answer `{"status": "404", "detail": ...}`, which maps to the
    /// error code `SCIM_404`. Unparseable bodies keep the raw text as message.
    pub fn from_body(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

        let error_code = match (parsed.error_code, parsed.status) {
            (Some(code), _) => code,
            (None, Some(scim_status)) => format!("SCIM_{}", scim_status),
            (None, None) => String::new(),
        };

        let message = parsed
            .message
            .or(parsed.detail)
            .unwrap_or_else(|| body.trim().to_string());

        Self {
            status,
            error_code,
            message,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.error_code.is_empty() {
            write!(f, "HTTP {}: {}", self.status, self.message)
        } else {
            write!(f, "{} (HTTP {}): {}", self.error_code, self.status, self.message)
        }
    }
}

impl std::error::Error for ApiError {}

/// Errors surfaced by connections and table scans.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// A required identifier is missing from both config and environment.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Client construction failed (bad host, unusable credentials).
    #[error("connection failed: {0}")]
    Connection(String),
    /// A retryable error persisted past the retry policy.
    #[error("rate limited after {attempts} attempts: {last}")]
    RateLimited { attempts: u32, last: ApiError },
    /// Any API error that is not classified as ignorable or retryable.
    #[error("api error: {0}")]
    Api(ApiError),
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ConnectorError {
    /// The structured API error behind this failure, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ConnectorError::Api(e) => Some(e),
            ConnectorError::RateLimited { last, .. } => Some(last),
            _ => None,
        }
    }
}

impl From<ApiError> for ConnectorError {
    fn from(e: ApiError) -> Self {
        ConnectorError::Api(e)
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ConnectorError::Decode(e.to_string())
        } else {
            ConnectorError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(e: serde_json::Error) -> Self {
        ConnectorError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_body_rest_shape() {
        let err = ApiError::from_body(
            404,
            r#"{"error_code":"RESOURCE_DOES_NOT_EXIST","message":"Cluster 1 does not exist"}"#,
        );
        assert_eq!(err.status, 404);
        assert_eq!(err.error_code, "RESOURCE_DOES_NOT_EXIST");
        assert_eq!(err.message, "Cluster 1 does not exist");
    }

    #[test]
    fn test_from_body_scim_shape() {
        let err = ApiError::from_body(
            404,
            r#"{"schemas":["urn:ietf:params:scim:api:messages:2.0:Error"],"detail":"User not found","status":"404"}"#,
        );
        assert_eq!(err.error_code, "SCIM_404");
        assert_eq!(err.message, "User not found");
    }

    #[test]
    fn test_from_body_plain_text() {
        let err = ApiError::from_body(502, "Bad Gateway\n");
        assert_eq!(err.error_code, "");
        assert_eq!(err.message, "Bad Gateway");
        assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");
    }

    #[test]
    fn test_display_with_code() {
        let err = ApiError::new(429, "REQUEST_LIMIT_EXCEEDED", "slow down");
        assert_eq!(err.to_string(), "REQUEST_LIMIT_EXCEEDED (HTTP 429): slow down");
    }

    #[test]
    fn test_api_error_accessor() {
        let api = ApiError::new(500, "INTERNAL_ERROR", "boom");
        let err = ConnectorError::Api(api.clone());
        assert_eq!(err.api_error(), Some(&api));

        let limited = ConnectorError::RateLimited {
            attempts: 9,
            last: ApiError::new(429, "", "too many"),
        };
        assert_eq!(limited.api_error().map(|e| e.status), Some(429));

        assert!(ConnectorError::Configuration("x".into()).api_error().is_none());
    }
}
