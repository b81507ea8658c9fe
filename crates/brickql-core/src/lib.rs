//! brickql core - connection handling for the Databricks REST API
//!
//! This crate provides:
//! - connection configuration with environment and profile-file fallback
//! - credential resolution for account and workspace scope
//! - a REST client per scope, memoized per connection
//! - error classification (not-found, retryable)

pub mod classify;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod profile;
pub mod provider;

pub use classify::{NotFoundPredicate, RetryablePredicate};
pub use client::ApiClient;
pub use config::{ConnectionConfig, Environment, RetrySettings};
pub use credentials::{resolve, Credentials, ResolvedConfig, Scope};
pub use error::{ApiError, ConnectorError};
pub use provider::{ClientFactory, ConnectionContext, HttpClientFactory};
