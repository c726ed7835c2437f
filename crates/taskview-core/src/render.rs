//! Pure projection of a [`TaskView`] into display lines

use crate::view::{NoticeLevel, Outcome, TaskView, ViewPhase};
use chrono::{DateTime, Local, Utc};
use taskview_api::StepKind;

/// What a line represents; front ends pick styles from this
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Banner,
    Step(StepKind),
    Heartbeat,
    Empty,
    Warning,
    Error,
    Completed,
    Failed,
}

/// One block of the task panel
#[derive(Debug, Clone, PartialEq)]
pub struct ViewLine {
    pub kind: LineKind,
    /// Short header, e.g. "🤔 [10:15:31] Thinking:"
    pub header: String,
    /// Body text, possibly multi-line
    pub body: String,
}

impl ViewLine {
    fn new(kind: LineKind, header: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            header: header.into(),
            body: body.into(),
        }
    }
}

/// Header of a step entry, with the time shown in local time
pub fn step_header(kind: &StepKind, at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => format!(
            "{} [{}] {}:",
            kind.icon(),
            at.with_timezone(&Local).format("%H:%M:%S"),
            kind.label()
        ),
        None => format!("{} {}:", kind.icon(), kind.label()),
    }
}

impl TaskView {
    /// Lines of the task panel, top to bottom
    pub fn lines(&self) -> Vec<ViewLine> {
        let mut lines = Vec::new();

        if let Some(banner) = self.banner() {
            lines.push(ViewLine::new(LineKind::Banner, banner, ""));
        }

        for step in self.steps() {
            lines.push(ViewLine::new(
                LineKind::Step(step.kind.clone()),
                step_header(&step.kind, step.at),
                step.content.clone(),
            ));
        }

        if self.is_record() && self.steps().is_empty() {
            lines.push(ViewLine::new(
                LineKind::Empty,
                "No steps recorded for this task",
                "",
            ));
        }

        if self.heartbeats() > 0 {
            lines.push(ViewLine::new(
                LineKind::Heartbeat,
                "·".repeat(self.heartbeats()),
                "",
            ));
        }

        for notice in self.notices() {
            let kind = match notice.level {
                NoticeLevel::Warning => LineKind::Warning,
                NoticeLevel::Error => LineKind::Error,
            };
            lines.push(ViewLine::new(kind, notice.text.clone(), ""));
        }

        match self.outcome() {
            Some(Outcome::Completed { summary }) => {
                let header = if self.is_record() {
                    "✅ Task Completed"
                } else {
                    "✅ Task completed"
                };
                lines.push(ViewLine::new(LineKind::Completed, header, summary.clone()));
            }
            Some(Outcome::Failed { message }) => {
                lines.push(ViewLine::new(
                    LineKind::Failed,
                    "❌ Task Failed",
                    message.clone(),
                ));
            }
            None => {}
        }

        lines
    }

    /// Title for the panel border
    pub fn title(&self) -> String {
        let id = self
            .task_id()
            .map(|id| id.chars().take(8).collect::<String>());
        match (self.phase(), id) {
            (ViewPhase::Idle, _) => "Welcome".to_string(),
            (ViewPhase::Submitting, _) => "New task".to_string(),
            (phase, Some(id)) => format!("Task {} · {}", id, phase_label(phase)),
            (phase, None) => phase_label(phase).to_string(),
        }
    }
}

fn phase_label(phase: ViewPhase) -> &'static str {
    match phase {
        ViewPhase::Idle => "idle",
        ViewPhase::Submitting => "submitting",
        ViewPhase::Loading => "loading",
        ViewPhase::Streaming => "live",
        ViewPhase::Disconnected => "reconnecting",
        ViewPhase::Completed => "completed",
        ViewPhase::Failed => "failed",
        ViewPhase::RequestFailed => "error",
        ViewPhase::Static => "snapshot",
    }
}
