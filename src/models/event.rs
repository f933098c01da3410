//! Events carried by a streaming run.
//!
//! The service frames events as server-sent events whose `event:` name
//! selects the payload type. Names are grouped by prefix, so any
//! `thread.run.*` status transition is a [`StreamEvent::ThreadRun`], and so on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Expired,
    Incomplete,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Expired => "expired",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Cancelled
                | RunStatus::Failed
                | RunStatus::Completed
                | RunStatus::Expired
                | RunStatus::Incomplete
        )
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "requires_action" => RunStatus::RequiresAction,
            "cancelling" => RunStatus::Cancelling,
            "cancelled" => RunStatus::Cancelled,
            "failed" => RunStatus::Failed,
            "completed" => RunStatus::Completed,
            "expired" => RunStatus::Expired,
            "incomplete" => RunStatus::Incomplete,
            _ => RunStatus::Other(s),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadRun {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeltaText {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageDeltaContent {
    Text {
        #[serde(default)]
        index: usize,
        #[serde(default)]
        text: Option<DeltaText>,
    },
    ImageFile {
        #[serde(default)]
        index: usize,
        #[serde(default)]
        image_file: Option<Value>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub content: Vec<MessageDeltaContent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageDeltaChunk {
    pub id: String,
    pub delta: MessageDelta,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    MessageDelta(MessageDeltaChunk),
    ThreadMessage(ThreadMessage),
    ThreadRun(ThreadRun),
    RunStep(RunStep),
    RunStepDelta(Value),
    Error(String),
    Done,
    Unrecognized { event_type: String, data: String },
}

impl StreamEvent {
    /// Decode one SSE frame. Never fails: payloads that do not match their
    /// declared event type come back as [`StreamEvent::Unrecognized`].
    pub fn from_sse(event_type: &str, data: &str) -> Self {
        let decoded = match event_type {
            "done" => Ok(StreamEvent::Done),
            "error" => Ok(StreamEvent::Error(data.to_string())),
            "thread.message.delta" => serde_json::from_str(data).map(StreamEvent::MessageDelta),
            t if t.starts_with("thread.message.") => {
                serde_json::from_str(data).map(StreamEvent::ThreadMessage)
            }
            "thread.run.step.delta" => serde_json::from_str(data).map(StreamEvent::RunStepDelta),
            t if t.starts_with("thread.run.step.") => {
                serde_json::from_str(data).map(StreamEvent::RunStep)
            }
            t if t.starts_with("thread.run.") => {
                serde_json::from_str(data).map(StreamEvent::ThreadRun)
            }
            _ => return Self::unrecognized(event_type, data),
        };

        decoded.unwrap_or_else(|e| {
            tracing::warn!(event_type, error = %e, "could not decode stream event payload");
            Self::unrecognized(event_type, data)
        })
    }

    fn unrecognized(event_type: &str, data: &str) -> Self {
        StreamEvent::Unrecognized {
            event_type: event_type.to_string(),
            data: data.to_string(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }
}
