//! Render model of one task and the reducer that drives it

use chrono::{DateTime, Utc};
use std::time::Duration;
use taskview_api::{StepKind, Task, TaskEvent, TaskStatus, last_result};

/// Client-observed lifecycle of a task view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewPhase {
    /// Welcome screen, nothing selected
    #[default]
    Idle,
    /// Creation request in flight
    Submitting,
    /// Fetching an existing task
    Loading,
    /// Subscribed and receiving events
    Streaming,
    /// Transport dropped, a reconnect is scheduled
    Disconnected,
    /// Terminal: task completed
    Completed,
    /// Terminal: task failed or the connection could not be restored
    Failed,
    /// Creation or load request failed
    RequestFailed,
    /// Settled display of a task that is not running
    Static,
}

impl ViewPhase {
    /// No transition leaves a terminal phase within one view instance
    pub fn is_terminal(&self) -> bool {
        matches!(self, ViewPhase::Completed | ViewPhase::Failed)
    }

    /// Phases in which stream updates are accepted
    pub fn is_live(&self) -> bool {
        matches!(self, ViewPhase::Streaming | ViewPhase::Disconnected)
    }
}

/// One rendered step
#[derive(Debug, Clone, PartialEq)]
pub struct StepEntry {
    pub kind: StepKind,
    pub content: String,
    /// Arrival time for live steps, recorded time for loaded ones
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// A connection or request message shown below the steps
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Final summary of a task
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed { summary: String },
    Failed { message: String },
}

/// Coarse status indicator, fed by polling
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub status: TaskStatus,
    pub error: Option<String>,
}

impl StatusLine {
    pub fn text(&self) -> String {
        match self.status {
            TaskStatus::Completed => "✅ Task completed".to_string(),
            TaskStatus::Failed => format!(
                "❌ Task failed: {}",
                self.error.as_deref().unwrap_or("Unknown error")
            ),
            other => format!("⚙️ Task running: {}", other),
        }
    }
}

/// Everything that can change a [`TaskView`]
#[derive(Debug, Clone)]
pub enum ViewUpdate {
    /// Back to the welcome screen
    Welcome,
    /// A creation request was issued
    Submitting,
    /// An existing task is being fetched
    Loading { task_id: String },
    /// A subscription was opened for this task
    Subscribed { task_id: String },
    /// Creation or load failed; the message is shown in place of the view
    RequestFailed { message: String },
    /// Render a non-running task in one go
    Finished(Task),
    /// An event from the task's stream
    Event { event: TaskEvent, at: DateTime<Utc> },
    /// Liveness tick before the first event
    Heartbeat,
    /// Result of a status poll
    StatusPolled {
        status: TaskStatus,
        error: Option<String>,
    },
    /// Transport failed; a reconnect follows after `delay`
    Reconnecting {
        attempt: u32,
        max_retries: u32,
        delay: Duration,
    },
    /// Reconnect attempts are exhausted
    ConnectionFailed,
}

impl ViewUpdate {
    /// Updates after which the producing subscription is gone
    pub fn releases_subscription(&self) -> bool {
        match self {
            ViewUpdate::Event { event, .. } => event.is_terminal(),
            ViewUpdate::ConnectionFailed => true,
            _ => false,
        }
    }
}

/// Render model of the task panel
#[derive(Debug, Clone, Default)]
pub struct TaskView {
    phase: ViewPhase,
    task_id: Option<String>,
    banner: Option<String>,
    steps: Vec<StepEntry>,
    heartbeats: usize,
    notices: Vec<Notice>,
    status_line: Option<StatusLine>,
    outcome: Option<Outcome>,
    last_result: String,
    received_event: bool,
    from_record: bool,
}

impl TaskView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Loading banner, until the first event arrives
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn steps(&self) -> &[StepEntry] {
        &self.steps
    }

    /// Number of heartbeat markers shown
    pub fn heartbeats(&self) -> usize {
        self.heartbeats
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn status_line(&self) -> Option<&StatusLine> {
        self.status_line.as_ref()
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Whether the view was rendered from a fetched task rather than a stream
    pub fn is_record(&self) -> bool {
        self.from_record
    }

    /// Fold one update into the model. Returns whether anything changed.
    pub fn apply(&mut self, update: ViewUpdate) -> bool {
        match update {
            ViewUpdate::Welcome => {
                *self = Self::default();
            }
            ViewUpdate::Submitting => {
                *self = Self {
                    phase: ViewPhase::Submitting,
                    banner: Some("Initializing task...".to_string()),
                    ..Self::default()
                };
            }
            ViewUpdate::Loading { task_id } => {
                *self = Self {
                    phase: ViewPhase::Loading,
                    task_id: Some(task_id),
                    banner: Some("Loading task...".to_string()),
                    ..Self::default()
                };
            }
            ViewUpdate::Subscribed { task_id } => {
                self.phase = ViewPhase::Streaming;
                self.task_id = Some(task_id);
                self.received_event = false;
            }
            ViewUpdate::RequestFailed { message } => {
                *self = Self {
                    phase: ViewPhase::RequestFailed,
                    task_id: self.task_id.take(),
                    notices: vec![Notice::error(message)],
                    ..Self::default()
                };
            }
            ViewUpdate::Finished(task) => self.show_record(task),
            ViewUpdate::Event { event, at } => {
                if !self.phase.is_live() {
                    tracing::debug!(event = event.name(), phase = ?self.phase, "ignoring event outside a live view");
                    return false;
                }
                self.apply_event(event, at);
            }
            ViewUpdate::Heartbeat => {
                if self.phase != ViewPhase::Streaming || self.received_event {
                    return false;
                }
                self.heartbeats += 1;
            }
            ViewUpdate::StatusPolled { status, error } => {
                if self.task_id.is_none() {
                    return false;
                }
                let line = StatusLine { status, error };
                if self.status_line.as_ref() == Some(&line) {
                    return false;
                }
                self.status_line = Some(line);
            }
            ViewUpdate::Reconnecting {
                attempt,
                max_retries,
                delay,
            } => {
                if !self.phase.is_live() {
                    return false;
                }
                self.phase = ViewPhase::Disconnected;
                self.notices.push(Notice::warning(format!(
                    "⚠ Connection lost, retrying in {} seconds ({}/{})...",
                    format_secs(delay),
                    attempt,
                    max_retries
                )));
            }
            ViewUpdate::ConnectionFailed => {
                if !self.phase.is_live() {
                    return false;
                }
                self.phase = ViewPhase::Failed;
                self.notices.push(Notice::error(
                    "⚠ Connection lost, please reload the task",
                ));
            }
        }
        true
    }

    fn apply_event(&mut self, event: TaskEvent, at: DateTime<Utc>) {
        if !self.received_event {
            self.received_event = true;
            self.banner = None;
            self.heartbeats = 0;
        }
        if self.phase == ViewPhase::Disconnected {
            self.phase = ViewPhase::Streaming;
        }

        match event {
            TaskEvent::Status(snapshot) => {
                if let Some(result) = last_result(&snapshot.steps) {
                    self.last_result = result.to_string();
                }
                self.steps = snapshot
                    .steps
                    .into_iter()
                    .map(|step| StepEntry {
                        kind: step.kind,
                        content: step.result,
                        at: Some(at),
                    })
                    .collect();
            }
            TaskEvent::Step { kind, result } => {
                self.note_result(&kind, &result);
                self.steps.push(StepEntry {
                    kind,
                    content: result,
                    at: Some(at),
                });
            }
            TaskEvent::Message { kind, result } => {
                self.note_result(&kind, &result);
                self.steps.insert(
                    0,
                    StepEntry {
                        kind,
                        content: result,
                        at: Some(at),
                    },
                );
            }
            TaskEvent::Complete => {
                self.phase = ViewPhase::Completed;
                self.outcome = Some(Outcome::Completed {
                    summary: std::mem::take(&mut self.last_result),
                });
            }
            TaskEvent::Error { message } => {
                self.phase = ViewPhase::Failed;
                self.outcome = Some(Outcome::Failed { message });
            }
        }
    }

    fn note_result(&mut self, kind: &StepKind, result: &str) {
        if *kind == StepKind::Result {
            self.last_result = result.to_string();
        }
    }

    fn show_record(&mut self, task: Task) {
        let outcome = match task.status {
            TaskStatus::Completed => Some(Outcome::Completed {
                summary: last_result(&task.steps).unwrap_or_default().to_string(),
            }),
            TaskStatus::Failed => Some(Outcome::Failed {
                message: task
                    .error
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            }),
            _ => None,
        };
        let phase = match task.status {
            TaskStatus::Completed => ViewPhase::Completed,
            TaskStatus::Failed => ViewPhase::Failed,
            _ => ViewPhase::Static,
        };
        let created_at = task.created_at;
        let steps = task
            .steps
            .into_iter()
            .map(|step| StepEntry {
                kind: step.kind,
                content: step.result,
                at: step.timestamp.or(created_at),
            })
            .collect();

        *self = Self {
            phase,
            task_id: Some(task.id),
            steps,
            outcome,
            received_event: true,
            from_record: true,
            ..Self::default()
        };
    }
}

fn format_secs(delay: Duration) -> String {
    let secs = delay.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{:.1}", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskview_api::{StatusSnapshot, Step};

    fn streaming_view() -> TaskView {
        let mut view = TaskView::new();
        view.apply(ViewUpdate::Submitting);
        view.apply(ViewUpdate::Subscribed {
            task_id: "t1".into(),
        });
        view
    }

    fn event(event: TaskEvent) -> ViewUpdate {
        ViewUpdate::Event {
            event,
            at: Utc::now(),
        }
    }

    fn step(kind: StepKind, result: &str) -> ViewUpdate {
        event(TaskEvent::Step {
            kind,
            result: result.into(),
        })
    }

    fn message(kind: StepKind, result: &str) -> ViewUpdate {
        event(TaskEvent::Message {
            kind,
            result: result.into(),
        })
    }

    #[test]
    fn test_submitting_shows_banner() {
        let mut view = TaskView::new();
        view.apply(ViewUpdate::Submitting);
        assert_eq!(view.phase(), ViewPhase::Submitting);
        assert_eq!(view.banner(), Some("Initializing task..."));
    }

    #[test]
    fn test_steps_render_in_arrival_order_and_complete_uses_last_result() {
        let mut view = streaming_view();
        view.apply(step(StepKind::Think, "plan"));
        view.apply(message(StepKind::Result, "interim"));
        view.apply(step(StepKind::Tool, "grep"));
        view.apply(message(StepKind::Result, "final answer"));
        view.apply(step(StepKind::Log, "wrap up"));
        view.apply(event(TaskEvent::Complete));

        assert_eq!(view.steps().len(), 5);
        assert_eq!(view.phase(), ViewPhase::Completed);
        assert_eq!(
            view.outcome(),
            Some(&Outcome::Completed {
                summary: "final answer".into()
            })
        );
    }

    #[test]
    fn test_typed_steps_append_in_order() {
        let mut view = streaming_view();
        for (i, kind) in [StepKind::Think, StepKind::Tool, StepKind::Act, StepKind::Log, StepKind::Run]
            .into_iter()
            .enumerate()
        {
            view.apply(step(kind, &format!("step {}", i)));
        }
        let contents: Vec<_> = view.steps().iter().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, ["step 0", "step 1", "step 2", "step 3", "step 4"]);
    }

    #[test]
    fn test_complete_without_result_has_empty_summary() {
        let mut view = streaming_view();
        view.apply(step(StepKind::Think, "hmm"));
        view.apply(event(TaskEvent::Complete));
        assert_eq!(
            view.outcome(),
            Some(&Outcome::Completed {
                summary: String::new()
            })
        );
    }

    #[test]
    fn test_generic_message_is_prepended() {
        let mut view = streaming_view();
        view.apply(step(StepKind::Think, "first"));
        view.apply(message(StepKind::Other("step".into()), "generic"));
        assert_eq!(view.steps()[0].content, "generic");
        assert_eq!(view.steps()[1].content, "first");
    }

    #[test]
    fn test_snapshot_replaces_steps() {
        let mut view = streaming_view();
        view.apply(step(StepKind::Think, "a"));
        view.apply(step(StepKind::Tool, "b"));
        view.apply(event(TaskEvent::Status(StatusSnapshot {
            steps: vec![Step::new(StepKind::Result, "from server")],
            status: None,
        })));

        assert_eq!(view.steps().len(), 1);
        assert_eq!(view.steps()[0].content, "from server");

        view.apply(event(TaskEvent::Complete));
        assert_eq!(
            view.outcome(),
            Some(&Outcome::Completed {
                summary: "from server".into()
            })
        );
    }

    #[test]
    fn test_snapshot_without_result_keeps_previous_result() {
        let mut view = streaming_view();
        view.apply(message(StepKind::Result, "kept"));
        view.apply(event(TaskEvent::Status(StatusSnapshot {
            steps: vec![Step::new(StepKind::Log, "x")],
            status: None,
        })));
        view.apply(event(TaskEvent::Complete));
        assert_eq!(
            view.outcome(),
            Some(&Outcome::Completed {
                summary: "kept".into()
            })
        );
    }

    #[test]
    fn test_error_event_is_terminal() {
        let mut view = streaming_view();
        view.apply(event(TaskEvent::Error {
            message: "tool crashed".into(),
        }));
        assert_eq!(view.phase(), ViewPhase::Failed);
        assert!(view.phase().is_terminal());

        // Nothing leaves a terminal phase
        assert!(!view.apply(step(StepKind::Think, "late")));
        assert!(!view.apply(event(TaskEvent::Complete)));
        assert!(view.steps().is_empty());
        assert_eq!(
            view.outcome(),
            Some(&Outcome::Failed {
                message: "tool crashed".into()
            })
        );
    }

    #[test]
    fn test_heartbeat_only_before_first_event() {
        let mut view = streaming_view();
        assert!(view.apply(ViewUpdate::Heartbeat));
        assert!(view.apply(ViewUpdate::Heartbeat));
        assert_eq!(view.heartbeats(), 2);

        view.apply(step(StepKind::Think, "go"));
        assert_eq!(view.heartbeats(), 0);
        assert!(view.banner().is_none());
        assert!(!view.apply(ViewUpdate::Heartbeat));
    }

    #[test]
    fn test_reconnect_then_recover() {
        let mut view = streaming_view();
        view.apply(ViewUpdate::Reconnecting {
            attempt: 1,
            max_retries: 3,
            delay: Duration::from_secs(2),
        });
        assert_eq!(view.phase(), ViewPhase::Disconnected);
        assert_eq!(
            view.notices()[0].text,
            "⚠ Connection lost, retrying in 2 seconds (1/3)..."
        );

        view.apply(step(StepKind::Log, "back"));
        assert_eq!(view.phase(), ViewPhase::Streaming);
    }

    #[test]
    fn test_connection_failed_is_terminal() {
        let mut view = streaming_view();
        view.apply(ViewUpdate::Reconnecting {
            attempt: 1,
            max_retries: 1,
            delay: Duration::from_millis(500),
        });
        assert!(view.notices()[0].text.contains("retrying in 0.5 seconds"));
        view.apply(ViewUpdate::ConnectionFailed);
        assert_eq!(view.phase(), ViewPhase::Failed);
        assert_eq!(view.notices().last().map(|n| n.level), Some(NoticeLevel::Error));
        assert!(!view.apply(step(StepKind::Log, "too late")));
    }

    #[test]
    fn test_status_poll_updates_only_status_line() {
        let mut view = streaming_view();
        view.apply(step(StepKind::Think, "a"));
        assert!(view.apply(ViewUpdate::StatusPolled {
            status: TaskStatus::Running,
            error: None,
        }));
        assert_eq!(view.steps().len(), 1);
        assert_eq!(
            view.status_line().map(|s| s.text()),
            Some("⚙️ Task running: running".to_string())
        );
        // Same status again is not a change
        assert!(!view.apply(ViewUpdate::StatusPolled {
            status: TaskStatus::Running,
            error: None,
        }));

        view.apply(ViewUpdate::StatusPolled {
            status: TaskStatus::Failed,
            error: None,
        });
        assert_eq!(
            view.status_line().map(|s| s.text()),
            Some("❌ Task failed: Unknown error".to_string())
        );
    }

    #[test]
    fn test_request_failed_replaces_view() {
        let mut view = TaskView::new();
        view.apply(ViewUpdate::Submitting);
        view.apply(ViewUpdate::RequestFailed {
            message: "Error: Invalid task ID".into(),
        });
        assert_eq!(view.phase(), ViewPhase::RequestFailed);
        assert!(view.banner().is_none());
        assert_eq!(view.notices(), &[Notice::error("Error: Invalid task ID")]);
    }

    #[test]
    fn test_finished_completed_task() {
        let mut view = TaskView::new();
        view.apply(ViewUpdate::Loading {
            task_id: "t9".into(),
        });
        let task = Task {
            id: "t9".into(),
            prompt: "p".into(),
            status: TaskStatus::Completed,
            created_at: Some(Utc::now()),
            steps: vec![
                Step::new(StepKind::Think, "a"),
                Step::new(StepKind::Result, "answer"),
            ],
            error: None,
        };
        view.apply(ViewUpdate::Finished(task));

        assert_eq!(view.phase(), ViewPhase::Completed);
        assert!(view.is_record());
        assert_eq!(view.steps().len(), 2);
        assert!(view.steps().iter().all(|s| s.at.is_some()));
        assert_eq!(
            view.outcome(),
            Some(&Outcome::Completed {
                summary: "answer".into()
            })
        );
    }

    #[test]
    fn test_finished_failed_task_defaults_error() {
        let mut view = TaskView::new();
        view.apply(ViewUpdate::Finished(Task {
            id: "t".into(),
            prompt: String::new(),
            status: TaskStatus::Failed,
            created_at: None,
            steps: vec![],
            error: None,
        }));
        assert_eq!(
            view.outcome(),
            Some(&Outcome::Failed {
                message: "Unknown error".into()
            })
        );
    }

    #[test]
    fn test_finished_pending_task_is_static() {
        let mut view = TaskView::new();
        view.apply(ViewUpdate::Finished(Task {
            id: "t".into(),
            prompt: String::new(),
            status: TaskStatus::Pending,
            created_at: None,
            steps: vec![],
            error: None,
        }));
        assert_eq!(view.phase(), ViewPhase::Static);
        assert!(view.outcome().is_none());
    }

    #[test]
    fn test_welcome_resets_everything() {
        let mut view = streaming_view();
        view.apply(step(StepKind::Think, "a"));
        view.apply(ViewUpdate::Welcome);
        assert_eq!(view.phase(), ViewPhase::Idle);
        assert!(view.steps().is_empty());
        assert!(view.task_id().is_none());
    }

    #[test]
    fn test_releases_subscription() {
        assert!(event(TaskEvent::Complete).releases_subscription());
        assert!(ViewUpdate::ConnectionFailed.releases_subscription());
        assert!(!ViewUpdate::Heartbeat.releases_subscription());
        assert!(!step(StepKind::Think, "x").releases_subscription());
    }
}
