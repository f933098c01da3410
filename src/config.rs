use std::env;
use std::fmt;
use std::str::FromStr;

use crate::errors::{AgentError, AgentResult};

pub const PROJECT_CONNECTION_STRING: &str = "PROJECT_CONNECTION_STRING";
pub const BING_CONNECTION_NAME: &str = "BING_CONNECTION_NAME";
pub const AGENT_ID: &str = "AGENT_ID";
pub const AGENT_MODEL: &str = "AGENT_MODEL";
pub const QUEUE_SERVICE_URI: &str = "QUEUE_SERVICE_URI";
pub const SALES_REP_NAME: &str = "SALES_REP_NAME";

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_SALES_REP: &str = "Mona Whalin";

const AGENTS_API_VERSION: &str = "2024-12-01-preview";
const MANAGEMENT_API_VERSION: &str = "2024-07-01-preview";
const MANAGEMENT_HOST: &str = "https://management.azure.com";

/// Source of process configuration. Kept behind a trait so tests can supply
/// variables without touching the real process environment.
pub trait Environment: Send + Sync {
    fn get_var(&self, key: &str) -> Result<String, env::VarError>;
}

pub struct RealEnvironment;

impl Environment for RealEnvironment {
    fn get_var(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }
}

/// Helper to get environment variables with error handling
pub fn get_env(
    environment: &dyn Environment,
    key: &str,
    required: bool,
    default: Option<String>,
) -> AgentResult<Option<String>> {
    match environment.get_var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
        Ok(_) | Err(env::VarError::NotPresent) if !required => Ok(default),
        Ok(_) | Err(env::VarError::NotPresent) => Err(AgentError::MissingEnv(key.to_string())),
        Err(e) => Err(AgentError::Internal(format!("{}: {}", key, e))),
    }
}

/// `<HostName>;<SubscriptionId>;<ResourceGroup>;<ProjectName>`, as copied
/// from the project overview page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub host: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub project_name: String,
}

impl FromStr for ConnectionString {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(';').map(str::trim).collect();
        if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
            return Err(AgentError::InvalidConnectionString(format!(
                "expected '<HostName>;<SubscriptionId>;<ResourceGroup>;<ProjectName>', got {} part(s)",
                parts.len()
            )));
        }

        Ok(Self {
            host: parts[0].to_string(),
            subscription_id: parts[1].to_string(),
            resource_group: parts[2].to_string(),
            project_name: parts[3].to_string(),
        })
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{}",
            self.host, self.subscription_id, self.resource_group, self.project_name
        )
    }
}

impl ConnectionString {
    fn workspace_path(&self) -> String {
        format!(
            "subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}",
            self.subscription_id, self.resource_group, self.project_name
        )
    }
}

/// Base URLs and API versions the project client talks to.
#[derive(Debug, Clone)]
pub struct ProjectEndpoints {
    pub agents: String,
    pub agents_api_version: String,
    pub management: String,
    pub management_api_version: String,
}

impl ProjectEndpoints {
    pub fn from_connection_string(conn: &ConnectionString) -> Self {
        let host = conn.host.trim_start_matches("https://").trim_end_matches('/');
        Self {
            agents: format!("https://{}/agents/v1.0/{}", host, conn.workspace_path()),
            agents_api_version: AGENTS_API_VERSION.to_string(),
            management: format!("{}/{}", MANAGEMENT_HOST, conn.workspace_path()),
            management_api_version: MANAGEMENT_API_VERSION.to_string(),
        }
    }

    /// Point both surfaces at one base URL, used against local test servers.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            agents: format!("{}/agents", base),
            agents_api_version: AGENTS_API_VERSION.to_string(),
            management: format!("{}/management", base),
            management_api_version: MANAGEMENT_API_VERSION.to_string(),
        }
    }
}

/// Everything the session needs from the process environment, read once at
/// startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub connection_string: ConnectionString,
    pub search_connection_name: String,
    pub agent_id: Option<String>,
    pub model: String,
    pub queue_service_uri: Option<String>,
    pub sales_rep: String,
}

impl ProjectConfig {
    pub fn from_environment(environment: &dyn Environment) -> AgentResult<Self> {
        // Collect both required variables so the error names every missing one.
        let required = [PROJECT_CONNECTION_STRING, BING_CONNECTION_NAME];
        let mut values = Vec::with_capacity(required.len());
        let mut missing = Vec::new();
        for key in required {
            match get_env(environment, key, true, None) {
                Ok(Some(value)) => values.push(value),
                Ok(None) | Err(AgentError::MissingEnv(_)) => missing.push(key),
                Err(e) => return Err(e),
            }
        }
        if !missing.is_empty() {
            return Err(AgentError::MissingEnv(missing.join(", ")));
        }

        let connection_string = values[0].parse::<ConnectionString>()?;
        let search_connection_name = values[1].clone();

        let agent_id = get_env(environment, AGENT_ID, false, None)?;
        let model = get_env(environment, AGENT_MODEL, false, Some(DEFAULT_MODEL.to_string()))?
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let queue_service_uri = get_env(environment, QUEUE_SERVICE_URI, false, None)?;
        let sales_rep = get_env(
            environment,
            SALES_REP_NAME,
            false,
            Some(DEFAULT_SALES_REP.to_string()),
        )?
        .unwrap_or_else(|| DEFAULT_SALES_REP.to_string());

        Ok(Self {
            connection_string,
            search_connection_name,
            agent_id,
            model,
            queue_service_uri,
            sales_rep,
        })
    }
}
