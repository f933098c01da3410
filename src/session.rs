use crate::api::AgentsApi;
use crate::config::{Environment, ProjectConfig};
use crate::errors::AgentResult;
use crate::models::agent::MessageRequest;
use crate::models::event::RunStatus;
use crate::sink::EventSink;

/// Read the process configuration and only then build the remote client, so
/// a missing variable fails before anything is sent.
pub fn prepare<A, F>(environment: &dyn Environment, connect: F) -> AgentResult<(ProjectConfig, A)>
where
    F: FnOnce(&ProjectConfig) -> AgentResult<A>,
{
    let config = ProjectConfig::from_environment(environment)?;
    let api = connect(&config)?;
    Ok((config, api))
}

/// One conversation against an already-configured agent.
pub struct Session<'a> {
    api: &'a dyn AgentsApi,
    agent_id: String,
}

impl<'a> Session<'a> {
    pub fn new(api: &'a dyn AgentsApi, agent_id: impl Into<String>) -> Self {
        Self {
            api,
            agent_id: agent_id.into(),
        }
    }

    /// Post `content` to a fresh thread and stream the agent's run into
    /// `sink` until the service reports done. Returns the last run status
    /// seen; a failed run is reported through the sink, not as an error.
    pub async fn run(
        &self,
        content: &str,
        sink: &mut dyn EventSink,
    ) -> AgentResult<Option<RunStatus>> {
        let thread = self.api.create_thread().await?;
        sink.progress(&format!("Created thread, ID: {}", thread.id));

        let message = self
            .api
            .create_message(&thread.id, &MessageRequest::user(content))
            .await?;
        sink.progress(&format!("Created message, ID: {}", message.id));

        let mut stream = self.api.create_stream(&thread.id, &self.agent_id).await?;
        let status = stream.until_done(sink).await?;
        tracing::info!(thread_id = %thread.id, status = ?status, "run finished");
        Ok(status)
    }
}
