//! Ambient identity for the project APIs.
//!
//! Tokens come from the first source in the chain that can produce one:
//! a service principal from `AZURE_TENANT_ID` / `AZURE_CLIENT_ID` /
//! `AZURE_CLIENT_SECRET`, then the signed-in Azure CLI. Tokens are cached per
//! scope until they are close to expiry.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crate::config::{get_env, Environment};
use crate::errors::{AgentError, AgentResult};

pub const AZURE_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const AZURE_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const AZURE_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
pub const AZURE_AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";

pub const AGENTS_SCOPE: &str = "https://ml.azure.com/.default";
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const REFRESH_MARGIN_MINUTES: i64 = 5;

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.expires_on - Duration::minutes(REFRESH_MARGIN_MINUTES) > Utc::now()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    fn name(&self) -> &str;

    async fn get_token(&self, scope: &str) -> AgentResult<AccessToken>;
}

/// A fixed bearer token, for pre-issued tokens and local test servers.
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    fn name(&self) -> &str {
        "StaticTokenCredential"
    }

    async fn get_token(&self, _scope: &str) -> AgentResult<AccessToken> {
        Ok(AccessToken::new(
            self.token.clone(),
            Utc::now() + Duration::hours(1),
        ))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Service principal client-credentials flow against the identity authority.
pub struct ClientSecretCredential {
    client: Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Returns `None` unless all three service principal variables are set.
    pub fn from_environment(environment: &dyn Environment) -> AgentResult<Option<Self>> {
        let tenant_id = get_env(environment, AZURE_TENANT_ID, false, None)?;
        let client_id = get_env(environment, AZURE_CLIENT_ID, false, None)?;
        let client_secret = get_env(environment, AZURE_CLIENT_SECRET, false, None)?;
        let authority_host = get_env(
            environment,
            AZURE_AUTHORITY_HOST,
            false,
            Some(DEFAULT_AUTHORITY_HOST.to_string()),
        )?
        .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());

        Ok(match (tenant_id, client_id, client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Some(Self::new(
                authority_host,
                tenant_id,
                client_id,
                client_secret,
            )),
            _ => None,
        })
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &str {
        "ClientSecretCredential"
    }

    async fn get_token(&self, scope: &str) -> AgentResult<AccessToken> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        );
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self.client.post(&url).form(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Credential(format!(
                "token request failed with {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(AccessToken::new(
            token.access_token,
            Utc::now() + Duration::seconds(token.expires_in),
        ))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
    #[serde(rename = "expires_on")]
    expires_on: Option<i64>,
}

/// Borrows the identity of the user signed in with `az login`.
pub struct AzureCliCredential {
    program: String,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        Self {
            program: program.to_string(),
        }
    }
}

impl AzureCliCredential {
    fn parse_output(stdout: &[u8]) -> AgentResult<AccessToken> {
        let parsed: CliTokenResponse = serde_json::from_slice(stdout)?;
        // Older CLI releases only report a local-time `expiresOn`; assume the
        // minimum lifetime the CLI hands out in that case.
        let expires_on = parsed
            .expires_on
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(|| Utc::now() + Duration::minutes(REFRESH_MARGIN_MINUTES + 5));
        Ok(AccessToken::new(parsed.access_token, expires_on))
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &str {
        "AzureCliCredential"
    }

    async fn get_token(&self, scope: &str) -> AgentResult<AccessToken> {
        let output = tokio::process::Command::new(&self.program)
            .args(["account", "get-access-token", "--output", "json", "--scope", scope])
            .output()
            .await
            .map_err(|e| AgentError::Credential(format!("could not run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::Credential(format!(
                "az account get-access-token failed: {}",
                stderr.trim()
            )));
        }

        Self::parse_output(&output.stdout)
    }
}

/// Tries each source in order and caches the first token obtained per scope.
pub struct DefaultCredential {
    sources: Vec<Box<dyn TokenCredential>>,
    cache: Mutex<HashMap<String, AccessToken>>,
}

impl DefaultCredential {
    pub fn with_sources(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self {
            sources,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_environment(environment: &dyn Environment) -> AgentResult<Self> {
        let mut sources: Vec<Box<dyn TokenCredential>> = Vec::new();
        if let Some(secret) = ClientSecretCredential::from_environment(environment)? {
            sources.push(Box::new(secret));
        }
        sources.push(Box::new(AzureCliCredential::default()));
        Ok(Self::with_sources(sources))
    }

    fn cached(&self, scope: &str) -> Option<AccessToken> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(scope).filter(|t| t.is_fresh()).cloned()
    }

    fn store(&self, scope: &str, token: &AccessToken) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(scope.to_string(), token.clone());
    }
}

#[async_trait]
impl TokenCredential for DefaultCredential {
    fn name(&self) -> &str {
        "DefaultCredential"
    }

    async fn get_token(&self, scope: &str) -> AgentResult<AccessToken> {
        if let Some(token) = self.cached(scope) {
            return Ok(token);
        }

        let mut failures = Vec::new();
        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    tracing::debug!(source = source.name(), scope, "acquired access token");
                    self.store(scope, &token);
                    return Ok(token);
                }
                Err(e) => {
                    tracing::debug!(source = source.name(), error = %e, "credential source failed");
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        if failures.is_empty() {
            failures.push("no credential sources configured".to_string());
        }
        Err(AgentError::Credential(failures.join("; ")))
    }
}
