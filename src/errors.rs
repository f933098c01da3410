use reqwest::StatusCode;
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Environment variable '{0}' is required but not set.")]
    MissingEnv(String),

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Failed to resolve credential: {0}")]
    Credential(String),

    #[error("Invalid tool definition: {0}")]
    InvalidTool(String),

    #[error("Request to {url} was rejected with {status}: {body}")]
    Rejected {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to render instructions: {0}")]
    Template(#[from] tera::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
