//! Connection configuration and the environment snapshot it falls back to.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::classify::{
    NotFoundPredicate, RetryablePredicate, DEFAULT_NOT_FOUND_CODES, DEFAULT_RETRY_CODES,
};

pub const ENV_HOST: &str = "DATABRICKS_HOST";
pub const ENV_TOKEN: &str = "DATABRICKS_TOKEN";
pub const ENV_ACCOUNT_ID: &str = "DATABRICKS_ACCOUNT_ID";
pub const ENV_CONFIG_PROFILE: &str = "DATABRICKS_CONFIG_PROFILE";
pub const ENV_CONFIG_FILE: &str = "DATABRICKS_CONFIG_FILE";
pub const ENV_CLIENT_ID: &str = "DATABRICKS_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "DATABRICKS_CLIENT_SECRET";
pub const ENV_USERNAME: &str = "DATABRICKS_USERNAME";
pub const ENV_PASSWORD: &str = "DATABRICKS_PASSWORD";

const ENV_KEYS: &[&str] = &[
    ENV_HOST,
    ENV_TOKEN,
    ENV_ACCOUNT_ID,
    ENV_CONFIG_PROFILE,
    ENV_CONFIG_FILE,
    ENV_CLIENT_ID,
    ENV_CLIENT_SECRET,
    ENV_USERNAME,
    ENV_PASSWORD,
    "HOME",
];

/// Connection-level settings. Every field is optional; missing values fall
/// back to the environment and then to the profile file.
///
/// Secrets are redacted in `Debug` output.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub account_id: Option<String>,
    pub account_host: Option<String>,
    pub account_token: Option<String>,
    pub workspace_host: Option<String>,
    pub workspace_token: Option<String>,
    pub config_profile: Option<String>,
    pub config_file: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    /// Error codes treated as "no row" on keyed lookups.
    pub not_found_error_codes: Option<Vec<String>>,
    /// Error codes retried with backoff.
    pub retry_error_codes: Option<Vec<String>>,
    pub max_retry_attempts: Option<u32>,
    pub retry_min_delay_ms: Option<u64>,
    pub retry_max_delay_ms: Option<u64>,
}

fn redact(v: &Option<String>) -> Option<&'static str> {
    v.as_ref().map(|_| "***")
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("account_id", &self.account_id)
            .field("account_host", &self.account_host)
            .field("account_token", &redact(&self.account_token))
            .field("workspace_host", &self.workspace_host)
            .field("workspace_token", &redact(&self.workspace_token))
            .field("config_profile", &self.config_profile)
            .field("config_file", &self.config_file)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("not_found_error_codes", &self.not_found_error_codes)
            .field("retry_error_codes", &self.retry_error_codes)
            .field("max_retry_attempts", &self.max_retry_attempts)
            .field("retry_min_delay_ms", &self.retry_min_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .finish()
    }
}

impl ConnectionConfig {
    /// Load a connection config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read connection config {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid connection config {:?}", path))
    }

    pub fn not_found_predicate(&self) -> NotFoundPredicate {
        match &self.not_found_error_codes {
            Some(codes) => NotFoundPredicate::new(codes.iter().cloned()),
            None => NotFoundPredicate::new(DEFAULT_NOT_FOUND_CODES.iter().copied()),
        }
    }

    pub fn retryable_predicate(&self) -> RetryablePredicate {
        match &self.retry_error_codes {
            Some(codes) => RetryablePredicate::new(codes.iter().cloned()),
            None => RetryablePredicate::new(DEFAULT_RETRY_CODES.iter().copied()),
        }
    }

    pub fn retry_settings(&self) -> RetrySettings {
        let defaults = RetrySettings::default();
        RetrySettings {
            max_attempts: self.max_retry_attempts.unwrap_or(defaults.max_attempts).max(1),
            min_delay: self
                .retry_min_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_delay),
            max_delay: self
                .retry_max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
        }
    }
}

/// Backoff bounds for retryable API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 9,
            min_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(3),
        }
    }
}

/// Snapshot of the environment variables consulted as fallback.
///
/// Taken once per connection so resolution never races with later changes to
/// the process environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the relevant variables from the process environment.
    pub fn capture() -> Self {
        let vars = ENV_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();
        Self { vars }
    }

    /// Build an environment from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a variable; empty values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}
