//! REST API client for one scope.

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::credentials::{Credentials, ResolvedConfig, Scope};
use crate::error::{ApiError, ConnectorError};

const USER_AGENT: &str = concat!("brickql/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Refresh OAuth tokens this long before they expire.
const TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// OAuth client-credentials token, fetched on first use and shared by all
/// requests made through the client.
#[derive(Debug)]
struct OAuthTokenSource {
    client_id: String,
    client_secret: String,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl OAuthTokenSource {
    async fn token(&self, http: &reqwest::Client) -> Result<String, ConnectorError> {
        let mut cached = self.cached.lock().await;
        if let Some(tok) = cached.as_ref() {
            if tok.expires_at > Instant::now() + TOKEN_EXPIRY_SKEW {
                return Ok(tok.access_token.clone());
            }
        }

        debug!("Fetching OAuth token from {}", self.token_url);
        let response = http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", "all-apis")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Api(ApiError::from_body(status, &body)));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}

#[derive(Debug)]
enum Auth {
    Bearer(String),
    Basic { username: String, password: String },
    OAuth(OAuthTokenSource),
}

/// A ready-to-use client for the account or workspace API.
///
/// Safe for concurrent use; clone the `Arc` it is handed out in.
#[derive(Debug)]
pub struct ApiClient {
    scope: Scope,
    host: String,
    account_id: String,
    http: reqwest::Client,
    auth: Auth,
}

fn validate_host(host: &str) -> Result<String, ConnectorError> {
    let url = Url::parse(host)
        .map_err(|e| ConnectorError::Connection(format!("invalid host '{}': {}", host, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConnectorError::Connection(format!(
            "invalid host '{}': expected an http(s) URL",
            host
        )));
    }
    Ok(host.trim_end_matches('/').to_string())
}

impl ApiClient {
    /// Build a client from resolved settings. Does not touch the network.
    pub fn new(resolved: &ResolvedConfig) -> Result<Self, ConnectorError> {
        let host = validate_host(&resolved.host)?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConnectorError::Connection(e.to_string()))?;

        let auth = match &resolved.credentials {
            Credentials::Token(token) => Auth::Bearer(token.clone()),
            Credentials::Basic { username, password } => Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            Credentials::OAuthClientCredentials {
                client_id,
                client_secret,
            } => {
                let token_url = match resolved.scope {
                    Scope::Workspace => format!("{}/oidc/v1/token", host),
                    Scope::Account => format!(
                        "{}/oidc/accounts/{}/v1/token",
                        host, resolved.account_id
                    ),
                };
                Auth::OAuth(OAuthTokenSource {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    token_url,
                    cached: Mutex::new(None),
                })
            }
        };

        info!(
            "Initialized {} client for {} ({})",
            resolved.scope, host, resolved.source
        );

        Ok(Self {
            scope: resolved.scope,
            host,
            account_id: resolved.account_id.clone(),
            http,
            auth,
        })
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Substitute `{account_id}` in an endpoint path template.
    pub fn expand_path(&self, template: &str) -> String {
        template.replace("{account_id}", &urlencoding::encode(&self.account_id))
    }

    /// GET a JSON document. Non-2xx responses become `ConnectorError::Api`.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Value, ConnectorError> {
        let url = format!("{}{}", self.host, self.expand_path(path));
        let mut request = self.http.get(&url).query(query);

        request = match &self.auth {
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::OAuth(source) => request.bearer_auth(source.token(&self.http).await?),
        };

        debug!("GET {} {:?}", url, query);
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Api(ApiError::from_body(status.as_u16(), &body)));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
