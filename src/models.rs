//! Objects exchanged with the agent service.
//!
//! `tool` holds the tool definitions we submit, `agent` the request and
//! response bodies of the management, thread and message calls, and `event`
//! the typed payloads of a streaming run.
pub mod agent;
pub mod event;
pub mod tool;
