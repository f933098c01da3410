use eventsource_stream::Eventsource;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::errors::{AgentError, AgentResult};
use crate::models::event::{RunStatus, StreamEvent};
use crate::sink::EventSink;

pub type EventStream = BoxStream<'static, AgentResult<StreamEvent>>;

/// Scoped handle on one streaming run.
///
/// The underlying connection is released exactly once: when [`until_done`]
/// returns (on success or error), on an explicit [`close`], or when the
/// handle is dropped, whichever comes first.
///
/// [`until_done`]: RunStream::until_done
/// [`close`]: RunStream::close
pub struct RunStream {
    events: Option<EventStream>,
    on_release: Option<Box<dyn FnOnce() + Send>>,
    last_status: Option<RunStatus>,
}

impl RunStream {
    pub fn new(events: EventStream) -> Self {
        Self {
            events: Some(events),
            on_release: None,
            last_status: None,
        }
    }

    /// Decode a `text/event-stream` response body.
    pub fn from_response(response: reqwest::Response) -> Self {
        let events = response
            .bytes_stream()
            .eventsource()
            .map(|frame| match frame {
                Ok(frame) => Ok(StreamEvent::from_sse(&frame.event, &frame.data)),
                Err(e) => Err(AgentError::Stream(e.to_string())),
            })
            .boxed();
        Self::new(events)
    }

    /// Run `hook` once when the connection is released.
    pub fn on_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    pub fn is_released(&self) -> bool {
        self.events.is_none()
    }

    /// Last run status seen on the stream so far.
    pub fn last_status(&self) -> Option<&RunStatus> {
        self.last_status.as_ref()
    }

    /// Feed every event to `sink` until the service signals done, then
    /// release the connection. Returns the last observed run status.
    pub async fn until_done(
        &mut self,
        sink: &mut dyn EventSink,
    ) -> AgentResult<Option<RunStatus>> {
        let result = self.pump(sink).await;
        self.close();
        result.map(|_| self.last_status.clone())
    }

    async fn pump(&mut self, sink: &mut dyn EventSink) -> AgentResult<()> {
        let events = self
            .events
            .as_mut()
            .ok_or_else(|| AgentError::Stream("stream already released".to_string()))?;

        while let Some(event) = events.next().await {
            let event = event?;
            if let StreamEvent::ThreadRun(run) = &event {
                self.last_status = Some(run.status.clone());
            }
            sink.handle(&event);
            if event.is_done() {
                return Ok(());
            }
        }

        match &self.last_status {
            Some(status) if status.is_terminal() => {
                tracing::debug!(%status, "stream closed without done after terminal status");
                Ok(())
            }
            _ => Err(AgentError::Stream(
                "connection closed before the run finished".to_string(),
            )),
        }
    }

    pub fn close(&mut self) {
        if let Some(events) = self.events.take() {
            drop(events);
            tracing::debug!("released run stream");
            if let Some(hook) = self.on_release.take() {
                hook();
            }
        }
    }
}

impl Drop for RunStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::event::ThreadRun;
    use crate::sink::ConsoleSink;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    pub(crate) fn run_event(status: &str) -> StreamEvent {
        StreamEvent::ThreadRun(ThreadRun {
            id: "run_1".to_string(),
            status: RunStatus::from(status.to_string()),
            thread_id: Some("thread_1".to_string()),
            assistant_id: Some("asst_1".to_string()),
            last_error: None,
        })
    }

    pub(crate) fn scripted(items: Vec<AgentResult<StreamEvent>>) -> EventStream {
        stream::iter(items).boxed()
    }

    fn counted(items: Vec<AgentResult<StreamEvent>>) -> (RunStream, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let counter = releases.clone();
        let stream = RunStream::new(scripted(items)).on_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (stream, releases)
    }

    #[tokio::test]
    async fn test_until_done_releases_on_done() {
        let (mut stream, releases) = counted(vec![
            Ok(run_event("queued")),
            Ok(run_event("completed")),
            Ok(StreamEvent::Done),
            Ok(run_event("in_progress")),
        ]);
        let mut sink = ConsoleSink::new(Vec::new());

        let status = stream.until_done(&mut sink).await.unwrap();
        assert_eq!(status, Some(RunStatus::Completed));
        assert!(stream.is_released());
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        // Nothing after done is consumed.
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(!output.contains("in_progress"));

        drop(stream);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_until_done_releases_on_fault() {
        let (mut stream, releases) = counted(vec![
            Ok(run_event("in_progress")),
            Err(AgentError::Stream("connection reset".to_string())),
            Ok(StreamEvent::Done),
        ]);
        let mut sink = ConsoleSink::new(Vec::new());

        let err = stream.until_done(&mut sink).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert!(stream.is_released());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(stream.last_status(), Some(&RunStatus::InProgress));
    }

    #[tokio::test]
    async fn test_drop_releases_unconsumed_stream() {
        let (stream, releases) = counted(vec![Ok(StreamEvent::Done)]);
        drop(stream);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_status_does_not_abort() {
        let (mut stream, _) = counted(vec![
            Ok(run_event("failed")),
            Ok(StreamEvent::Error("later".to_string())),
            Ok(StreamEvent::Done),
        ]);
        let mut sink = ConsoleSink::new(Vec::new());
        let status = stream.until_done(&mut sink).await.unwrap();
        assert_eq!(status, Some(RunStatus::Failed));

        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.ends_with("An error occurred. Data: later\nStream completed.\n"));
    }

    #[tokio::test]
    async fn test_truncated_stream() {
        let (mut stream, releases) = counted(vec![Ok(run_event("in_progress"))]);
        let mut sink = ConsoleSink::new(Vec::new());
        assert!(stream.until_done(&mut sink).await.is_err());
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        let (mut stream, _) = counted(vec![Ok(run_event("completed"))]);
        let status = stream.until_done(&mut sink).await.unwrap();
        assert_eq!(status, Some(RunStatus::Completed));
    }

    #[tokio::test]
    async fn test_until_done_twice_is_an_error() {
        let (mut stream, _) = counted(vec![Ok(StreamEvent::Done)]);
        let mut sink = ConsoleSink::new(Vec::new());
        stream.until_done(&mut sink).await.unwrap();
        assert!(stream.until_done(&mut sink).await.is_err());
    }
}
