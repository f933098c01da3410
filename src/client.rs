use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::api::AgentsApi;
use crate::config::{ConnectionString, ProjectEndpoints};
use crate::credential::{TokenCredential, AGENTS_SCOPE, MANAGEMENT_SCOPE};
use crate::errors::{AgentError, AgentResult};
use crate::models::agent::{Agent, AgentUpdate, Connection, MessageRequest, RunRequest, Thread};
use crate::models::event::ThreadMessage;
use crate::stream::RunStream;

const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";

/// HTTP client for one agent project.
pub struct ProjectClient {
    client: Client,
    endpoints: ProjectEndpoints,
    credential: Arc<dyn TokenCredential>,
}

impl ProjectClient {
    pub fn new(endpoints: ProjectEndpoints, credential: Arc<dyn TokenCredential>) -> AgentResult<Self> {
        // Only the connect phase is bounded; a run stream may stay open as
        // long as the service keeps it open.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoints,
            credential,
        })
    }

    pub fn from_connection_string(
        connection_string: &ConnectionString,
        credential: Arc<dyn TokenCredential>,
    ) -> AgentResult<Self> {
        Self::new(
            ProjectEndpoints::from_connection_string(connection_string),
            credential,
        )
    }

    /// Acquire tokens for both scopes up front so a missing identity fails
    /// before any remote call is attempted.
    pub async fn resolve_credential(&self) -> AgentResult<()> {
        self.credential.get_token(MANAGEMENT_SCOPE).await?;
        self.credential.get_token(AGENTS_SCOPE).await?;
        Ok(())
    }

    fn agents_url(&self, segments: &[&str]) -> AgentResult<Url> {
        build_url(
            &self.endpoints.agents,
            segments,
            &self.endpoints.agents_api_version,
        )
    }

    fn management_url(&self, segments: &[&str]) -> AgentResult<Url> {
        build_url(
            &self.endpoints.management,
            segments,
            &self.endpoints.management_api_version,
        )
    }

    async fn execute(&self, request: RequestBuilder, scope: &str) -> AgentResult<Response> {
        let token = self.credential.get_token(scope).await?;
        let request = request
            .bearer_auth(&token.token)
            .header(CLIENT_REQUEST_ID, Uuid::new_v4().to_string())
            .build()?;

        let url = request.url().to_string();
        tracing::debug!(method = %request.method(), %url, "sending request");

        let response = self.client.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Rejected { url, status, body });
        }
        Ok(response)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, scope: &str) -> AgentResult<T> {
        let response = self.execute(request, scope).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn build_url(base: &str, segments: &[&str], api_version: &str) -> AgentResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| AgentError::Internal(format!("invalid endpoint '{}': {}", base, e)))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| AgentError::Internal(format!("endpoint '{}' cannot be a base", base)))?;
        path.pop_if_empty().extend(segments);
    }
    url.query_pairs_mut().append_pair("api-version", api_version);
    Ok(url)
}

#[async_trait]
impl AgentsApi for ProjectClient {
    async fn get_connection(&self, name: &str) -> AgentResult<Connection> {
        let url = self.management_url(&["connections", name])?;
        self.send(self.client.get(url), MANAGEMENT_SCOPE).await
    }

    async fn get_agent(&self, agent_id: &str) -> AgentResult<Agent> {
        let url = self.agents_url(&["assistants", agent_id])?;
        self.send(self.client.get(url), AGENTS_SCOPE).await
    }

    async fn update_agent(&self, agent_id: &str, update: &AgentUpdate) -> AgentResult<Agent> {
        let url = self.agents_url(&["assistants", agent_id])?;
        let mut request = self.client.post(url).json(update);
        for (name, value) in &update.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let agent: Agent = self.send(request, AGENTS_SCOPE).await?;
        tracing::info!(agent_id = %agent.id, tools = agent.tools.len(), "replaced agent configuration");
        Ok(agent)
    }

    async fn create_thread(&self) -> AgentResult<Thread> {
        let url = self.agents_url(&["threads"])?;
        self.send(self.client.post(url).json(&json!({})), AGENTS_SCOPE)
            .await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        message: &MessageRequest,
    ) -> AgentResult<ThreadMessage> {
        let url = self.agents_url(&["threads", thread_id, "messages"])?;
        self.send(self.client.post(url).json(message), AGENTS_SCOPE)
            .await
    }

    async fn create_stream(&self, thread_id: &str, agent_id: &str) -> AgentResult<RunStream> {
        let url = self.agents_url(&["threads", thread_id, "runs"])?;
        let request = self
            .client
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(&RunRequest {
                assistant_id: agent_id,
                stream: true,
            });
        let response = self.execute(request, AGENTS_SCOPE).await?;
        Ok(RunStream::from_response(response))
    }
}
