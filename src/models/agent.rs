use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tool::ToolDefinition;

pub const DEFAULT_FEATURE_HEADERS: [(&str, &str); 2] = [
    ("x-ms-enable-preview", "true"),
    ("x-aml-bing-grounding-runsteps", "true"),
];

/// Replace-configuration request body. Fields not present here are left to
/// the service. `headers` travel as HTTP headers, not in the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentUpdate {
    pub model: String,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
    #[serde(skip)]
    pub headers: Vec<(String, String)>,
}

impl AgentUpdate {
    pub fn new(model: impl Into<String>, instructions: impl Into<String>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            model: model.into(),
            instructions: instructions.into(),
            tools,
            headers: DEFAULT_FEATURE_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Agent {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub model: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Connection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub role: Role,
    pub content: String,
}

impl MessageRequest {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RunRequest<'a> {
    pub assistant_id: &'a str,
    pub stream: bool,
}
