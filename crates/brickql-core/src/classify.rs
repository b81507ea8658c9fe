//! Error classification predicates.
//!
//! Both predicates match an API error's code, or its stringified HTTP status,
//! against a configured list. Errors without a structured API error never
//! match, so they propagate as hard failures.

use crate::error::{ApiError, ConnectorError};

/// Codes that make a keyed lookup return no row instead of failing.
pub const DEFAULT_NOT_FOUND_CODES: &[&str] = &[
    "INVALID_PARAMETER_VALUE",
    "RESOURCE_DOES_NOT_EXIST",
    "DOES_NOT_EXIST",
    "404",
];

/// Codes retried with backoff.
pub const DEFAULT_RETRY_CODES: &[&str] = &["429"];

fn matches_codes(codes: &[String], err: &ApiError) -> bool {
    let status = err.status.to_string();
    codes
        .iter()
        .any(|code| *code == err.error_code || *code == status)
}

/// Returns true when an error means "the requested resource is absent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundPredicate {
    codes: Vec<String>,
}

impl NotFoundPredicate {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn matches(&self, err: &ConnectorError) -> bool {
        err.api_error()
            .is_some_and(|api| matches_codes(&self.codes, api))
    }
}

impl Default for NotFoundPredicate {
    fn default() -> Self {
        Self::new(DEFAULT_NOT_FOUND_CODES.iter().copied())
    }
}

/// Returns true when an error should be retried with backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryablePredicate {
    codes: Vec<String>,
}

impl RetryablePredicate {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, err: &ConnectorError) -> bool {
        match err {
            ConnectorError::Api(api) => matches_codes(&self.codes, api),
            _ => false,
        }
    }
}

impl Default for RetryablePredicate {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_CODES.iter().copied())
    }
}
