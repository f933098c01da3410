//! Replace a hosted agent's configuration.
//!
//! Both the `run` and `configure` commands go through [`configure_agent`]:
//! resolve the search connection, assemble and validate the tool list, then
//! submit one replace request. Nothing is submitted if any step before the
//! submit fails.

use std::fs;
use std::path::Path;

use crate::api::AgentsApi;
use crate::errors::{AgentError, AgentResult};
use crate::models::agent::{Agent, AgentUpdate};
use crate::models::tool::{validate_tools, FunctionTool, ParameterSchema, QueueBinding, ToolDefinition};

pub const SEND_EMAIL_TOOL: &str = "SendEmailWithMessage";
pub const APPROVAL_INPUT_QUEUE: &str = "agents-sample-approval-input";
pub const APPROVAL_OUTPUT_QUEUE: &str = "agents-sample-approval-output";

/// The email function backed by the approval workflow listening on the
/// approval queues.
pub fn send_email_tool(queue_service_uri: &str) -> FunctionTool {
    let only_without_form = "(only required if formInputId is not provided).";
    let parameters = ParameterSchema::new()
        .with_property("formInputId", "string", "The ID of the form (required if provided).")
        .with_property("subject", "string", "The subject of the email.")
        .with_property("message", "string", "The message to email.")
        .with_property("name", "string", &format!("Name of customer {}", only_without_form))
        .with_property("industry", "string", &format!("Industry of business {}", only_without_form))
        .with_property(
            "businessProcessDescription",
            "string",
            &format!("Description of business process {}", only_without_form),
        )
        .with_property(
            "processFrequency",
            "string",
            &format!("Current frequency of process {}", only_without_form),
        )
        .with_property(
            "processDuration",
            "string",
            &format!("Current duration of process {}", only_without_form),
        )
        .with_required("subject")
        .with_required("message");

    FunctionTool::new(
        SEND_EMAIL_TOOL,
        "Allows you to send an email with a message.",
        parameters,
        QueueBinding::new(queue_service_uri, APPROVAL_INPUT_QUEUE),
        QueueBinding::new(queue_service_uri, APPROVAL_OUTPUT_QUEUE),
    )
}

/// Read extra function tools from a JSON array of [`FunctionTool`].
pub fn load_function_tools(path: &Path) -> AgentResult<Vec<FunctionTool>> {
    let contents = fs::read_to_string(path).map_err(|e| {
        AgentError::InvalidTool(format!("could not read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&contents)?)
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub agent_id: String,
    pub model: String,
    pub instructions: String,
    pub search_connection_name: String,
    pub functions: Vec<FunctionTool>,
}

/// Search tool first, then the function tools in the order given.
pub fn build_tools(search_connection_id: &str, functions: &[FunctionTool]) -> AgentResult<Vec<ToolDefinition>> {
    if functions.is_empty() {
        return Err(AgentError::InvalidTool(
            "at least one queue-bound function tool is required".to_string(),
        ));
    }

    let mut tools = Vec::with_capacity(functions.len() + 1);
    tools.push(ToolDefinition::bing_grounding(search_connection_id));
    tools.extend(functions.iter().cloned().map(ToolDefinition::azure_function));
    validate_tools(&tools)?;
    Ok(tools)
}

pub async fn configure_agent(api: &dyn AgentsApi, settings: &AgentSettings) -> AgentResult<Agent> {
    let connection = api.get_connection(&settings.search_connection_name).await?;
    tracing::debug!(connection = %connection.name, "resolved search connection");

    let tools = build_tools(&connection.id, &settings.functions)?;
    let update = AgentUpdate::new(&settings.model, &settings.instructions, tools);
    api.update_agent(&settings.agent_id, &update).await
}
