use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::errors::{AgentError, AgentResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Remaining JSON-schema keywords (`items`, `enum`, `format`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// JSON-schema object describing a function's arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type", default = "object_kind")]
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

fn object_kind() -> String {
    "object".to_string()
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self {
            kind: object_kind(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property<S: Into<String>>(mut self, name: S, kind: &str, description: &str) -> Self {
        self.properties.insert(
            name.into(),
            PropertySchema {
                kind: kind.to_string(),
                description: Some(description.to_string()),
                extra: Map::new(),
            },
        );
        self
    }

    pub fn with_required<S: Into<String>>(mut self, name: S) -> Self {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name);
        }
        self
    }

    /// Every `required` entry must name a declared property.
    pub fn validate(&self) -> AgentResult<()> {
        if self.kind != "object" {
            return Err(AgentError::InvalidTool(format!(
                "parameter schema must be of type 'object', got '{}'",
                self.kind
            )));
        }
        let undeclared: Vec<&str> = self
            .required
            .iter()
            .filter(|name| !self.properties.contains_key(name.as_str()))
            .map(String::as_str)
            .collect();
        if !undeclared.is_empty() {
            return Err(AgentError::InvalidTool(format!(
                "required parameter(s) not declared in properties: {}",
                undeclared.join(", ")
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

/// Address of one storage queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueBinding {
    pub queue_service_uri: String,
    pub queue_name: String,
}

impl QueueBinding {
    pub fn new(queue_service_uri: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            queue_service_uri: queue_service_uri.into(),
            queue_name: queue_name.into(),
        }
    }
}

/// A function the agent calls by dropping a message on `input_queue` and
/// reading the result from `output_queue`. This is the local shape, also
/// accepted from a tools file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    pub function: FunctionDefinition,
    pub input_queue: QueueBinding,
    pub output_queue: QueueBinding,
}

impl FunctionTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
        input_queue: QueueBinding,
        output_queue: QueueBinding,
    ) -> Self {
        Self {
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
            input_queue,
            output_queue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageBinding {
    StorageQueue { storage_queue: QueueBinding },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzureFunctionSpec {
    pub function: FunctionDefinition,
    pub input_binding: StorageBinding,
    pub output_binding: StorageBinding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRef {
    pub connection_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BingGroundingSpec {
    pub connections: Vec<ConnectionRef>,
}

/// Tool definitions in the shape the agent service expects on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDefinition {
    BingGrounding { bing_grounding: BingGroundingSpec },
    AzureFunction { azure_function: AzureFunctionSpec },
    /// Tool kinds this client never configures but may read back.
    #[serde(other)]
    Unknown,
}

impl ToolDefinition {
    pub fn bing_grounding(connection_id: impl Into<String>) -> Self {
        ToolDefinition::BingGrounding {
            bing_grounding: BingGroundingSpec {
                connections: vec![ConnectionRef {
                    connection_id: connection_id.into(),
                }],
            },
        }
    }

    pub fn azure_function(tool: FunctionTool) -> Self {
        ToolDefinition::AzureFunction {
            azure_function: AzureFunctionSpec {
                function: tool.function,
                input_binding: StorageBinding::StorageQueue {
                    storage_queue: tool.input_queue,
                },
                output_binding: StorageBinding::StorageQueue {
                    storage_queue: tool.output_queue,
                },
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ToolDefinition::BingGrounding { .. } => "bing_grounding",
            ToolDefinition::AzureFunction { .. } => "azure_function",
            ToolDefinition::Unknown => "unknown",
        }
    }

    pub fn function_name(&self) -> Option<&str> {
        match self {
            ToolDefinition::AzureFunction { azure_function } => {
                Some(azure_function.function.name.as_str())
            }
            _ => None,
        }
    }
}

lazy_static! {
    static ref FUNCTION_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

fn is_valid_function_name(name: &str) -> bool {
    FUNCTION_NAME.is_match(name)
}

fn validate_queue(function: &str, side: &str, queue: &QueueBinding) -> AgentResult<()> {
    if queue.queue_service_uri.trim().is_empty() || queue.queue_name.trim().is_empty() {
        return Err(AgentError::InvalidTool(format!(
            "{} of '{}' needs both a queue service URI and a queue name",
            side, function
        )));
    }
    Ok(())
}

/// Checks a tool list before it is submitted: schema invariants, name rules
/// and unique function names.
pub fn validate_tools(tools: &[ToolDefinition]) -> AgentResult<()> {
    let mut names = HashSet::new();
    for tool in tools {
        match tool {
            ToolDefinition::BingGrounding { bing_grounding } => {
                if bing_grounding.connections.is_empty() {
                    return Err(AgentError::InvalidTool(
                        "bing_grounding needs a connection".to_string(),
                    ));
                }
            }
            ToolDefinition::AzureFunction { azure_function } => {
                let function = &azure_function.function;
                if !is_valid_function_name(&function.name) {
                    return Err(AgentError::InvalidTool(format!(
                        "function name '{}' must match [a-zA-Z0-9_-]+",
                        function.name
                    )));
                }
                if !names.insert(function.name.as_str()) {
                    return Err(AgentError::InvalidTool(format!(
                        "duplicate function name: {}",
                        function.name
                    )));
                }
                function.parameters.validate().map_err(|e| {
                    AgentError::InvalidTool(format!("{}: {}", function.name, e))
                })?;
                let StorageBinding::StorageQueue { storage_queue } = &azure_function.input_binding;
                validate_queue(&function.name, "input binding", storage_queue)?;
                let StorageBinding::StorageQueue { storage_queue } = &azure_function.output_binding;
                validate_queue(&function.name, "output binding", storage_queue)?;
            }
            ToolDefinition::Unknown => {
                return Err(AgentError::InvalidTool(
                    "cannot submit a tool of unknown type".to_string(),
                ));
            }
        }
    }
    Ok(())
}
