//! Task event stream: named event schemas and the SSE adapter

use crate::error::{Error, Result};
use crate::types::{Step, StepKind, TaskStatus, de_text};
use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use std::pin::Pin;
use tokio_stream::Stream;

/// Payload of a `status` event: the full current step list
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusSnapshot {
    pub steps: Vec<Step>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

/// Payload of the typed step events (`think`, `tool`, `act`, `log`, `run`)
#[derive(Debug, Clone, Deserialize)]
struct StepPayload {
    #[serde(deserialize_with = "de_text")]
    result: String,
}

/// Payload of a generic `message` event
#[derive(Debug, Clone, Deserialize)]
struct MessagePayload {
    #[serde(rename = "type", default)]
    kind: StepKind,
    #[serde(deserialize_with = "de_text")]
    result: String,
}

/// Payload of a terminal `error` event
#[derive(Debug, Clone, Deserialize)]
struct ErrorPayload {
    #[serde(deserialize_with = "de_text")]
    message: String,
}

/// Events delivered on `GET /tasks/{id}/events`
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// Full snapshot; replaces the rendered step list
    Status(StatusSnapshot),
    /// A typed step, appended in arrival order
    Step { kind: StepKind, result: String },
    /// A generic message, rendered at the top of the list
    Message { kind: StepKind, result: String },
    /// Task finished successfully
    Complete,
    /// Task failed
    Error { message: String },
}

impl TaskEvent {
    /// Parse a named server-sent event into its typed form.
    ///
    /// Payloads are validated against the schema of their event name; a
    /// mismatch is reported as [`Error::MalformedEvent`].
    pub fn parse(event: &str, data: &str) -> Result<Self> {
        match event {
            "status" => serde_json::from_str::<StatusSnapshot>(data)
                .map(TaskEvent::Status)
                .map_err(|e| Error::malformed(event, e)),
            "think" | "tool" | "act" | "log" | "run" => serde_json::from_str::<StepPayload>(data)
                .map(|p| TaskEvent::Step {
                    kind: StepKind::from(event),
                    result: p.result,
                })
                .map_err(|e| Error::malformed(event, e)),
            "message" => serde_json::from_str::<MessagePayload>(data)
                .map(|p| TaskEvent::Message {
                    kind: p.kind,
                    result: p.result,
                })
                .map_err(|e| Error::malformed(event, e)),
            "complete" => Ok(TaskEvent::Complete),
            "error" => serde_json::from_str::<ErrorPayload>(data)
                .map(|p| TaskEvent::Error { message: p.message })
                .map_err(|e| Error::malformed(event, e)),
            other => Err(Error::UnknownEvent(other.to_string())),
        }
    }

    /// Event name on the wire
    pub fn name(&self) -> &str {
        match self {
            TaskEvent::Status(_) => "status",
            TaskEvent::Step { kind, .. } => kind.as_str(),
            TaskEvent::Message { .. } => "message",
            TaskEvent::Complete => "complete",
            TaskEvent::Error { .. } => "error",
        }
    }

    /// Check if this is a terminal event (Complete or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskEvent::Complete | TaskEvent::Error { .. })
    }

    /// Typed step events prompt an immediate status refresh
    pub fn is_typed_step(&self) -> bool {
        matches!(self, TaskEvent::Step { .. })
    }
}

/// A stream of task events.
///
/// Items that are `Err` with [`Error::is_transport`] end the stream; other
/// errors describe a single dropped event.
pub type TaskEventStream = Pin<Box<dyn Stream<Item = Result<TaskEvent>> + Send>>;

/// Adapt an [`EventSource`] into a [`TaskEventStream`].
///
/// The event source is closed on the first transport error so that its own
/// reconnect logic never runs; reconnection is the caller's decision.
pub(crate) fn create_stream(mut event_source: EventSource) -> impl Stream<Item = Result<TaskEvent>> {
    stream! {
        while let Some(event_result) = event_source.next().await {
            match event_result {
                Ok(Event::Open) => {
                    tracing::debug!("event stream opened");
                }
                Ok(Event::Message(message)) => {
                    yield TaskEvent::parse(&message.event, &message.data);
                }
                Err(e) => {
                    event_source.close();
                    yield Err(Error::Sse(e.to_string()));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typed_steps() {
        for name in ["think", "tool", "act", "log", "run"] {
            let event = TaskEvent::parse(name, r#"{"result": "hello"}"#).unwrap();
            assert_eq!(
                event,
                TaskEvent::Step {
                    kind: StepKind::from(name),
                    result: "hello".into()
                }
            );
            assert!(event.is_typed_step());
            assert_eq!(event.name(), name);
        }
    }

    #[test]
    fn test_parse_status_snapshot() {
        let event = TaskEvent::parse(
            "status",
            r#"{"status": "running", "steps": [{"type": "think", "result": "a"}, {"type": "result", "result": "b"}]}"#,
        )
        .unwrap();
        match event {
            TaskEvent::Status(snapshot) => {
                assert_eq!(snapshot.steps.len(), 2);
                assert_eq!(snapshot.status, Some(TaskStatus::Running));
            }
            other => panic!("expected status, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_message_without_type() {
        let event = TaskEvent::parse("message", r#"{"result": "plain"}"#).unwrap();
        assert_eq!(
            event,
            TaskEvent::Message {
                kind: StepKind::Other("step".into()),
                result: "plain".into()
            }
        );
    }

    #[test]
    fn test_parse_terminal_events() {
        assert_eq!(TaskEvent::parse("complete", "").unwrap(), TaskEvent::Complete);
        assert_eq!(
            TaskEvent::parse("error", r#"{"message": "tool crashed"}"#).unwrap(),
            TaskEvent::Error {
                message: "tool crashed".into()
            }
        );
        assert!(TaskEvent::Complete.is_terminal());
        assert!(!TaskEvent::Message { kind: StepKind::Log, result: String::new() }.is_terminal());
    }

    #[test]
    fn test_malformed_payloads_are_not_transport_errors() {
        let err = TaskEvent::parse("think", "not json").unwrap_err();
        assert!(matches!(err, Error::MalformedEvent { .. }));
        assert!(!err.is_transport());

        let err = TaskEvent::parse("status", r#"{"no_steps": true}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedEvent { .. }));

        let err = TaskEvent::parse("error", "{}").unwrap_err();
        assert!(matches!(err, Error::MalformedEvent { .. }));
    }

    #[test]
    fn test_unknown_event_name() {
        let err = TaskEvent::parse("ping", "{}").unwrap_err();
        assert!(matches!(err, Error::UnknownEvent(ref name) if name == "ping"));
    }
}
