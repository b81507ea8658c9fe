//! Credential resolution for account and workspace scope.
//!
//! Precedence, first match wins:
//! 1. explicit `config_profile` (optionally with `config_file`)
//! 2. the scope's token (`account_token` / `workspace_token`)
//! 3. `client_id` + `client_secret` (OAuth machine-to-machine)
//! 4. `username` + `password`
//! 5. the same chain from `DATABRICKS_*` environment variables
//! 6. the `DEFAULT` profile of the config file, when the file exists

use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use crate::config::{
    ConnectionConfig, Environment, ENV_ACCOUNT_ID, ENV_CLIENT_ID, ENV_CLIENT_SECRET,
    ENV_CONFIG_FILE, ENV_CONFIG_PROFILE, ENV_HOST, ENV_PASSWORD, ENV_TOKEN, ENV_USERNAME,
};
use crate::error::ConnectorError;
use crate::profile::{Profile, ProfileFile, DEFAULT_PROFILE};

pub const DEFAULT_ACCOUNT_HOST: &str = "https://accounts.cloud.databricks.com";

/// One of the two API surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Account,
    Workspace,
}

impl Scope {
    /// Fixed key under which the scope's client is memoized.
    pub fn cache_key(&self) -> &'static str {
        match self {
            Scope::Account => "databricks_account_client",
            Scope::Workspace => "databricks_workspace_client",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Account => write!(f, "account"),
            Scope::Workspace => write!(f, "workspace"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    OAuthClientCredentials {
        client_id: String,
        client_secret: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Token(_) => f.debug_tuple("Token").field(&"***").finish(),
            Credentials::OAuthClientCredentials { client_id, .. } => f
                .debug_struct("OAuthClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"***")
                .finish(),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Everything needed to build a client for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub scope: Scope,
    pub host: String,
    pub account_id: String,
    pub credentials: Credentials,
    /// Where the credentials came from, for logs.
    pub source: String,
}

fn owned(v: Option<&str>) -> Option<String> {
    v.filter(|s| !s.is_empty()).map(str::to_string)
}

fn pair(a: Option<&str>, b: Option<&str>) -> Option<(String, String)> {
    match (owned(a), owned(b)) {
        (Some(a), Some(b)) => Some((a, b)),
        _ => None,
    }
}

fn scope_token(config: &ConnectionConfig, scope: Scope) -> Option<String> {
    match scope {
        Scope::Account => owned(config.account_token.as_deref()),
        Scope::Workspace => owned(config.workspace_token.as_deref()),
    }
}

fn scope_host(config: &ConnectionConfig, scope: Scope) -> Option<String> {
    match scope {
        Scope::Account => owned(config.account_host.as_deref()),
        Scope::Workspace => owned(config.workspace_host.as_deref()),
    }
}

fn credentials_from_profile(profile: &Profile) -> Result<Credentials, ConnectorError> {
    if let Some(token) = owned(profile.token()) {
        return Ok(Credentials::Token(token));
    }
    if let Some((client_id, client_secret)) = pair(profile.client_id(), profile.client_secret()) {
        return Ok(Credentials::OAuthClientCredentials {
            client_id,
            client_secret,
        });
    }
    if let Some((username, password)) = pair(profile.username(), profile.password()) {
        return Ok(Credentials::Basic { username, password });
    }
    Err(ConnectorError::Configuration(format!(
        "profile '{}' has no token, client_id/client_secret or username/password",
        profile.name
    )))
}

/// Locates and loads the profile file on demand.
struct ProfileSource<'a> {
    config: &'a ConnectionConfig,
    env: &'a Environment,
}

impl ProfileSource<'_> {
    fn explicit_path(&self) -> Option<PathBuf> {
        owned(self.config.config_file.as_deref())
            .or_else(|| owned(self.env.get(ENV_CONFIG_FILE)))
            .map(PathBuf::from)
    }

    /// Load a named profile; the file must exist.
    fn require(&self, name: &str) -> Result<Profile, ConnectorError> {
        let path = self
            .explicit_path()
            .or_else(|| ProfileFile::default_path(self.env.get("HOME")))
            .ok_or_else(|| {
                ConnectorError::Configuration(format!(
                    "profile '{}' requested but no config file location is known",
                    name
                ))
            })?;
        let file = ProfileFile::load(&path)?;
        Ok(file.require(name)?.clone())
    }

    /// The `DEFAULT` profile, if the file exists and has one.
    fn fallback(&self) -> Result<Option<Profile>, ConnectorError> {
        let path = match self.explicit_path() {
            Some(p) => p,
            None => match ProfileFile::default_path(self.env.get("HOME")) {
                Some(p) if p.exists() => p,
                _ => return Ok(None),
            },
        };
        let file = ProfileFile::load(&path)?;
        Ok(file.profile(DEFAULT_PROFILE).cloned())
    }
}

/// Resolve host, account id and credentials for one scope.
pub fn resolve(
    scope: Scope,
    config: &ConnectionConfig,
    env: &Environment,
) -> Result<ResolvedConfig, ConnectorError> {
    let profiles = ProfileSource { config, env };

    let account_id = owned(config.account_id.as_deref())
        .or_else(|| owned(env.get(ENV_ACCOUNT_ID)))
        .ok_or_else(|| ConnectorError::Configuration("account_id must be configured".into()))?;

    let (credentials, profile, source) = resolve_credentials(scope, config, env, &profiles)?;

    let host = scope_host(config, scope)
        .or_else(|| profile.as_ref().and_then(|p| owned(p.host())))
        .or_else(|| owned(env.get(ENV_HOST)));

    let host = match (host, scope) {
        (Some(h), _) => h,
        (None, Scope::Account) => DEFAULT_ACCOUNT_HOST.to_string(),
        (None, Scope::Workspace) => {
            return Err(ConnectorError::Configuration(
                "workspace_host must be configured".into(),
            ))
        }
    };

    debug!("Resolved {} credentials from {}", scope, source);

    Ok(ResolvedConfig {
        scope,
        host: host.trim_end_matches('/').to_string(),
        account_id,
        credentials,
        source,
    })
}

type Resolved = (Credentials, Option<Profile>, String);

fn resolve_credentials(
    scope: Scope,
    config: &ConnectionConfig,
    env: &Environment,
    profiles: &ProfileSource<'_>,
) -> Result<Resolved, ConnectorError> {
    // 1-4: explicit configuration
    if let Some(name) = owned(config.config_profile.as_deref()) {
        let profile = profiles.require(&name)?;
        let creds = credentials_from_profile(&profile)?;
        return Ok((creds, Some(profile), format!("config profile '{}'", name)));
    }
    if let Some(token) = scope_token(config, scope) {
        return Ok((Credentials::Token(token), None, format!("config {}_token", scope)));
    }
    if let Some((client_id, client_secret)) =
        pair(config.client_id.as_deref(), config.client_secret.as_deref())
    {
        return Ok((
            Credentials::OAuthClientCredentials {
                client_id,
                client_secret,
            },
            None,
            "config client_id/client_secret".into(),
        ));
    }
    if let Some((username, password)) =
        pair(config.username.as_deref(), config.password.as_deref())
    {
        return Ok((
            Credentials::Basic { username, password },
            None,
            "config username/password".into(),
        ));
    }

    // 5: environment
    if let Some(name) = owned(env.get(ENV_CONFIG_PROFILE)) {
        let profile = profiles.require(&name)?;
        let creds = credentials_from_profile(&profile)?;
        return Ok((creds, Some(profile), format!("{} '{}'", ENV_CONFIG_PROFILE, name)));
    }
    if let Some(token) = owned(env.get(ENV_TOKEN)) {
        return Ok((Credentials::Token(token), None, ENV_TOKEN.into()));
    }
    if let Some((client_id, client_secret)) =
        pair(env.get(ENV_CLIENT_ID), env.get(ENV_CLIENT_SECRET))
    {
        return Ok((
            Credentials::OAuthClientCredentials {
                client_id,
                client_secret,
            },
            None,
            format!("{}/{}", ENV_CLIENT_ID, ENV_CLIENT_SECRET),
        ));
    }
    if let Some((username, password)) = pair(env.get(ENV_USERNAME), env.get(ENV_PASSWORD)) {
        return Ok((
            Credentials::Basic { username, password },
            None,
            format!("{}/{}", ENV_USERNAME, ENV_PASSWORD),
        ));
    }

    // 6: DEFAULT profile
    if let Some(profile) = profiles.fallback()? {
        let creds = credentials_from_profile(&profile)?;
        return Ok((creds, Some(profile), format!("profile '{}'", DEFAULT_PROFILE)));
    }

    Err(ConnectorError::Configuration(format!(
        "no credentials configured for {} scope: set a profile, token, client_id/client_secret or username/password",
        scope
    )))
}
