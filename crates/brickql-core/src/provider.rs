//! Connection-scoped client provider.
//!
//! `ConnectionContext` owns one memoized client per scope. The first caller
//! for a scope builds the client; concurrent callers wait on the same
//! initialization and receive the same `Arc`.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::error;

use crate::classify::{NotFoundPredicate, RetryablePredicate};
use crate::client::ApiClient;
use crate::config::{ConnectionConfig, Environment, RetrySettings, ENV_ACCOUNT_ID};
use crate::credentials::{resolve, ResolvedConfig, Scope};
use crate::error::ConnectorError;

/// Builds API clients from resolved settings.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn build(&self, resolved: &ResolvedConfig) -> Result<ApiClient, ConnectorError>;
}

/// Default factory: a reqwest-backed [`ApiClient`].
#[derive(Debug, Default)]
pub struct HttpClientFactory;

#[async_trait]
impl ClientFactory for HttpClientFactory {
    async fn build(&self, resolved: &ResolvedConfig) -> Result<ApiClient, ConnectorError> {
        ApiClient::new(resolved)
    }
}

/// Everything that lives for the lifetime of one connection.
pub struct ConnectionContext {
    name: String,
    config: ConnectionConfig,
    env: Environment,
    factory: Arc<dyn ClientFactory>,
    account_client: OnceCell<Arc<ApiClient>>,
    workspace_client: OnceCell<Arc<ApiClient>>,
    account_id: OnceLock<String>,
}

impl std::fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("account_client", &self.account_client.initialized())
            .field("workspace_client", &self.workspace_client.initialized())
            .finish()
    }
}

impl ConnectionContext {
    /// Create a context that falls back to the current process environment.
    pub fn new(name: impl Into<String>, config: ConnectionConfig) -> Self {
        Self::with_environment(name, config, Environment::capture())
    }

    pub fn with_environment(
        name: impl Into<String>,
        config: ConnectionConfig,
        env: Environment,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            env,
            factory: Arc::new(HttpClientFactory),
            account_client: OnceCell::new(),
            workspace_client: OnceCell::new(),
            account_id: OnceLock::new(),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Return the memoized client for `scope`, building it on first use.
    pub async fn client(&self, scope: Scope) -> Result<Arc<ApiClient>, ConnectorError> {
        let cell = match scope {
            Scope::Account => &self.account_client,
            Scope::Workspace => &self.workspace_client,
        };

        cell.get_or_try_init(|| async {
            let resolved = resolve(scope, &self.config, &self.env)?;
            self.factory.build(&resolved).await.map(Arc::new)
        })
        .await
        .cloned()
        .inspect_err(|e| {
            error!(
                connection = %self.name,
                cache_key = scope.cache_key(),
                error = %e,
                "connection_error"
            )
        })
    }

    pub async fn account_client(&self) -> Result<Arc<ApiClient>, ConnectorError> {
        self.client(Scope::Account).await
    }

    pub async fn workspace_client(&self) -> Result<Arc<ApiClient>, ConnectorError> {
        self.client(Scope::Workspace).await
    }

    /// The connection's account id, memoized. Feeds the `account_id` column.
    pub fn account_id(&self) -> Result<&str, ConnectorError> {
        if let Some(id) = self.account_id.get() {
            return Ok(id);
        }
        let id = self
            .config
            .account_id
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| self.env.get(ENV_ACCOUNT_ID).map(str::to_string))
            .ok_or_else(|| ConnectorError::Configuration("account_id must be configured".into()))?;
        Ok(self.account_id.get_or_init(|| id))
    }

    pub fn not_found_predicate(&self) -> NotFoundPredicate {
        self.config.not_found_predicate()
    }

    pub fn retryable_predicate(&self) -> RetryablePredicate {
        self.config.retryable_predicate()
    }

    pub fn retry_settings(&self) -> RetrySettings {
        self.config.retry_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingFactory {
        builds: AtomicUsize,
    }

    #[async_trait]
    impl ClientFactory for CountingFactory {
        async fn build(&self, resolved: &ResolvedConfig) -> Result<ApiClient, ConnectorError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            // widen the race window
            tokio::time::sleep(Duration::from_millis(20)).await;
            ApiClient::new(resolved)
        }
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            account_id: Some("acc-1".into()),
            workspace_host: Some("https://dbc-1.cloud.databricks.com".into()),
            workspace_token: Some("dapi".into()),
            account_token: Some("acct".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_use_builds_once() {
        let factory = Arc::new(CountingFactory::default());
        let ctx = Arc::new(
            ConnectionContext::with_environment("test", config(), Environment::default())
                .with_factory(factory.clone()),
        );

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move { ctx.workspace_client().await.unwrap() })
            })
            .collect();

        let clients: Vec<Arc<ApiClient>> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        for client in &clients[1..] {
            assert!(Arc::ptr_eq(&clients[0], client));
        }
    }

    #[tokio::test]
    async fn test_scopes_are_cached_separately() {
        let factory = Arc::new(CountingFactory::default());
        let ctx = ConnectionContext::with_environment("test", config(), Environment::default())
            .with_factory(factory.clone());

        let account = ctx.account_client().await.unwrap();
        let workspace = ctx.workspace_client().await.unwrap();
        let account_again = ctx.account_client().await.unwrap();

        assert_eq!(account.scope(), Scope::Account);
        assert_eq!(workspace.scope(), Scope::Workspace);
        assert!(Arc::ptr_eq(&account, &account_again));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_account_id_fails_before_construction() {
        let factory = Arc::new(CountingFactory::default());
        let ctx = ConnectionContext::with_environment(
            "test",
            ConnectionConfig {
                account_id: None,
                ..config()
            },
            Environment::default(),
        )
        .with_factory(factory.clone());

        let err = ctx.account_client().await.unwrap_err();
        assert!(matches!(err, ConnectorError::Configuration(_)));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 0);
        assert!(ctx.account_id().is_err());
    }

    #[tokio::test]
    async fn test_failed_construction_is_not_cached() {
        let ctx = ConnectionContext::with_environment(
            "test",
            ConnectionConfig {
                workspace_host: Some("not a url".into()),
                ..config()
            },
            Environment::default(),
        );
        for _ in 0..2 {
            let err = ctx.workspace_client().await.unwrap_err();
            assert!(matches!(err, ConnectorError::Connection(_)));
        }
    }

    #[tokio::test]
    async fn test_profile_account_id_does_not_satisfy_account_scope() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[dev]\ntoken = profile-token\naccount_id = prof-acc\n").unwrap();
        let ctx = ConnectionContext::with_environment(
            "test",
            ConnectionConfig {
                config_profile: Some("dev".into()),
                config_file: Some(file.path().to_string_lossy().into_owned()),
                ..Default::default()
            },
            Environment::default(),
        );

        let err = ctx.account_client().await.unwrap_err();
        assert!(matches!(err, ConnectorError::Configuration(_)));
        assert!(ctx.account_id().is_err());
    }

    #[test]
    fn test_account_id_from_env() {
        let ctx = ConnectionContext::with_environment(
            "test",
            ConnectionConfig::default(),
            Environment::from_pairs([(ENV_ACCOUNT_ID, "env-acc")]),
        );
        assert_eq!(ctx.account_id().unwrap(), "env-acc");
    }
}
