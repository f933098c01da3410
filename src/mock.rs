use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::api::AgentsApi;
use crate::errors::{AgentError, AgentResult};
use crate::models::agent::{Agent, AgentUpdate, Connection, MessageRequest, Thread};
use crate::models::event::{StreamEvent, ThreadMessage};
use crate::stream::RunStream;

/// An in-memory project that records every call and replays scripted run
/// events.
pub struct MockAgentsApi {
    pub calls: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<AgentUpdate>>,
    pub messages: Mutex<Vec<MessageRequest>>,
    pub releases: Arc<AtomicUsize>,
    events: Mutex<Vec<AgentResult<StreamEvent>>>,
    missing_connection: bool,
}

impl MockAgentsApi {
    pub fn new(events: Vec<AgentResult<StreamEvent>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            releases: Arc::new(AtomicUsize::new(0)),
            events: Mutex::new(events),
            missing_connection: false,
        }
    }

    pub fn without_connection(mut self) -> Self {
        self.missing_connection = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AgentsApi for MockAgentsApi {
    async fn get_connection(&self, name: &str) -> AgentResult<Connection> {
        self.record(format!("get_connection:{}", name));
        if self.missing_connection {
            return Err(AgentError::Internal(format!("connection {} not found", name)));
        }
        Ok(Connection {
            id: format!("/connections/{}", name),
            name: name.to_string(),
            properties: None,
        })
    }

    async fn get_agent(&self, agent_id: &str) -> AgentResult<Agent> {
        self.record(format!("get_agent:{}", agent_id));
        Ok(Agent {
            id: agent_id.to_string(),
            name: None,
            model: "gpt-4o".to_string(),
            instructions: None,
            tools: Vec::new(),
        })
    }

    async fn update_agent(&self, agent_id: &str, update: &AgentUpdate) -> AgentResult<Agent> {
        self.record(format!("update_agent:{}", agent_id));
        self.updates.lock().unwrap().push(update.clone());
        Ok(Agent {
            id: agent_id.to_string(),
            name: None,
            model: update.model.clone(),
            instructions: Some(update.instructions.clone()),
            tools: update.tools.clone(),
        })
    }

    async fn create_thread(&self) -> AgentResult<Thread> {
        self.record("create_thread".to_string());
        Ok(Thread {
            id: "thread_1".to_string(),
        })
    }

    async fn create_message(
        &self,
        thread_id: &str,
        message: &MessageRequest,
    ) -> AgentResult<ThreadMessage> {
        self.record(format!("create_message:{}", thread_id));
        self.messages.lock().unwrap().push(message.clone());
        Ok(ThreadMessage {
            id: "msg_1".to_string(),
            status: None,
        })
    }

    async fn create_stream(&self, thread_id: &str, agent_id: &str) -> AgentResult<RunStream> {
        self.record(format!("create_stream:{}:{}", thread_id, agent_id));
        let events = std::mem::take(&mut *self.events.lock().unwrap());
        let releases = self.releases.clone();
        Ok(
            RunStream::new(crate::stream::tests::scripted(events)).on_release(move || {
                releases.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }
}
