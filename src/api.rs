use async_trait::async_trait;

use crate::errors::AgentResult;
use crate::models::agent::{Agent, AgentUpdate, Connection, MessageRequest, Thread};
use crate::models::event::ThreadMessage;
use crate::stream::RunStream;

/// Remote operations of an agent project (OpenAI-assistants style surface
/// plus connection lookup).
#[async_trait]
pub trait AgentsApi: Send + Sync {
    /// Resolve a named project connection to its identifier.
    async fn get_connection(&self, name: &str) -> AgentResult<Connection>;

    async fn get_agent(&self, agent_id: &str) -> AgentResult<Agent>;

    /// Replace the agent's model, instructions and tools wholesale.
    async fn update_agent(&self, agent_id: &str, update: &AgentUpdate) -> AgentResult<Agent>;

    async fn create_thread(&self) -> AgentResult<Thread>;

    async fn create_message(
        &self,
        thread_id: &str,
        message: &MessageRequest,
    ) -> AgentResult<ThreadMessage>;

    /// Start a run on the thread and return its event stream.
    async fn create_stream(&self, thread_id: &str, agent_id: &str) -> AgentResult<RunStream>;
}
