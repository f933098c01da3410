use std::io::{self, Write};

use crate::models::event::{MessageDeltaContent, RunStatus, StreamEvent};

/// Receives stream events in arrival order. Implementations observe only;
/// they cannot fail the stream.
pub trait EventSink {
    fn handle(&mut self, event: &StreamEvent);

    /// A session progress line that is not part of the stream.
    fn progress(&mut self, _line: &str) {}
}

/// Human-readable rendering of one event. Message deltas render without a
/// trailing newline so consecutive fragments join into the reply text.
pub fn render(event: &StreamEvent) -> String {
    match event {
        StreamEvent::MessageDelta(chunk) => chunk
            .delta
            .content
            .iter()
            .filter_map(|part| match part {
                MessageDeltaContent::Text { text, .. } => Some(
                    text.as_ref()
                        .and_then(|t| t.value.as_deref())
                        .unwrap_or("No text"),
                ),
                _ => None,
            })
            .collect(),
        StreamEvent::ThreadMessage(message) => format!(
            "ThreadMessage created. ID: {}, Status: {}\n",
            message.id,
            message.status.as_deref().unwrap_or("unknown")
        ),
        StreamEvent::ThreadRun(run) => {
            let mut out = format!("ThreadRun status: {}\n", run.status);
            if run.status == RunStatus::Failed {
                match &run.last_error {
                    Some(error) => out.push_str(&format!("Run failed. Error: {}\n", error)),
                    None => out.push_str("Run failed. Error: none reported\n"),
                }
            }
            out
        }
        StreamEvent::RunStep(step) => {
            format!("RunStep type: {}, Status: {}\n", step.step_type, step.status)
        }
        StreamEvent::RunStepDelta(_) => String::new(),
        StreamEvent::Error(data) => format!("An error occurred. Data: {}\n", data),
        StreamEvent::Done => "Stream completed.\n".to_string(),
        StreamEvent::Unrecognized { event_type, data } => {
            format!("Unhandled Event Type: {}, Data: {}\n", event_type, data)
        }
    }
}

/// Writes rendered events to a console-like writer, stdout by default.
pub struct ConsoleSink<W: Write = io::Stdout> {
    out: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        // Deltas have no newline, so flush to show them as they arrive.
        if let Err(e) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
        {
            tracing::warn!(error = %e, "failed to write to console");
        }
    }
}

impl<W: Write> EventSink for ConsoleSink<W> {
    fn handle(&mut self, event: &StreamEvent) {
        let rendered = render(event);
        if !rendered.is_empty() {
            self.emit(&rendered);
        }
    }

    fn progress(&mut self, line: &str) {
        self.emit(&format!("{}\n", line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{
        DeltaText, MessageDelta, MessageDeltaChunk, RunError, RunStep, ThreadMessage, ThreadRun,
    };

    fn run(status: &str, last_error: Option<RunError>) -> StreamEvent {
        StreamEvent::ThreadRun(ThreadRun {
            id: "run_1".to_string(),
            status: RunStatus::from(status.to_string()),
            thread_id: None,
            assistant_id: None,
            last_error,
        })
    }

    fn delta(content: Vec<MessageDeltaContent>) -> StreamEvent {
        StreamEvent::MessageDelta(MessageDeltaChunk {
            id: "msg_1".to_string(),
            delta: MessageDelta { content },
        })
    }

    fn text(value: Option<&str>) -> MessageDeltaContent {
        MessageDeltaContent::Text {
            index: 0,
            text: Some(DeltaText {
                value: value.map(str::to_string),
            }),
        }
    }

    #[test]
    fn test_render_each_variant() {
        assert_eq!(render(&delta(vec![text(Some("Hello"))])), "Hello");
        assert_eq!(
            render(&StreamEvent::ThreadMessage(ThreadMessage {
                id: "msg_1".to_string(),
                status: Some("in_progress".to_string()),
            })),
            "ThreadMessage created. ID: msg_1, Status: in_progress\n"
        );
        assert_eq!(
            render(&run("queued", None)),
            "ThreadRun status: queued\n"
        );
        assert_eq!(
            render(&StreamEvent::RunStep(RunStep {
                id: "step_1".to_string(),
                step_type: "tool_calls".to_string(),
                status: "in_progress".to_string(),
            })),
            "RunStep type: tool_calls, Status: in_progress\n"
        );
        assert_eq!(
            render(&StreamEvent::Error("{\"message\":\"boom\"}".to_string())),
            "An error occurred. Data: {\"message\":\"boom\"}\n"
        );
        assert_eq!(render(&StreamEvent::Done), "Stream completed.\n");
        assert_eq!(
            render(&StreamEvent::Unrecognized {
                event_type: "thread.created".to_string(),
                data: "{}".to_string()
            }),
            "Unhandled Event Type: thread.created, Data: {}\n"
        );
        assert_eq!(render(&StreamEvent::RunStepDelta(serde_json::json!({}))), "");
    }

    #[test]
    fn test_non_text_delta_parts_are_silent() {
        let event = delta(vec![
            MessageDeltaContent::ImageFile {
                index: 0,
                image_file: None,
            },
            MessageDeltaContent::Other,
        ]);
        assert_eq!(render(&event), "");

        let mixed = delta(vec![
            text(Some("a")),
            MessageDeltaContent::Other,
            text(Some("b")),
        ]);
        assert_eq!(render(&mixed), "ab");
    }

    #[test]
    fn test_text_part_without_value() {
        let missing = MessageDeltaContent::Text {
            index: 0,
            text: None,
        };
        assert_eq!(render(&delta(vec![missing])), "No text");
        assert_eq!(render(&delta(vec![text(None)])), "No text");
    }

    #[test]
    fn test_failed_run_prints_error_line() {
        let failed = run(
            "failed",
            Some(RunError {
                code: "rate_limit_exceeded".to_string(),
                message: "Try again later".to_string(),
            }),
        );
        let rendered = render(&failed);
        assert_eq!(rendered.lines().count(), 2);
        assert_eq!(
            rendered,
            "ThreadRun status: failed\nRun failed. Error: rate_limit_exceeded: Try again later\n"
        );

        // An error on a non-failed run is not printed.
        let completed = run(
            "completed",
            Some(RunError {
                code: "x".to_string(),
                message: "y".to_string(),
            }),
        );
        assert_eq!(render(&completed).lines().count(), 1);
    }

    #[test]
    fn test_console_sink_concatenates_in_order() {
        let mut sink = ConsoleSink::new(Vec::new());
        let events = vec![
            run("in_progress", None),
            delta(vec![text(Some("Hi "))]),
            delta(vec![text(Some("there"))]),
            StreamEvent::RunStepDelta(serde_json::json!({})),
            run("completed", None),
            StreamEvent::Done,
        ];
        for event in &events {
            sink.handle(event);
        }

        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            output,
            "ThreadRun status: in_progress\nHi thereThreadRun status: completed\nStream completed.\n"
        );
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_console_sink_swallows_write_errors() {
        let mut sink = ConsoleSink::new(BrokenPipe);
        sink.handle(&StreamEvent::Done);
        sink.handle(&StreamEvent::Unrecognized {
            event_type: "x".to_string(),
            data: "y".to_string(),
        });
    }
}
