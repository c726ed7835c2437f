//! Core types exchanged with the task service

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle status of a task, as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Anything the server sends that we don't recognize
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Wire name of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Unknown => "unknown",
        }
    }

    /// Status glyph used in history listings
    pub fn glyph(&self) -> &'static str {
        match self {
            TaskStatus::Completed => "✅",
            TaskStatus::Failed => "❌",
            TaskStatus::Running => "⚙️",
            _ => "⏳",
        }
    }

    /// Completed or failed
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type tag of a step
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum StepKind {
    Think,
    Tool,
    Act,
    Log,
    Run,
    Result,
    Message,
    /// Untyped or unrecognized step; keeps the raw tag
    Other(String),
}

impl StepKind {
    /// Wire name of this kind
    pub fn as_str(&self) -> &str {
        match self {
            StepKind::Think => "think",
            StepKind::Tool => "tool",
            StepKind::Act => "act",
            StepKind::Log => "log",
            StepKind::Run => "run",
            StepKind::Result => "result",
            StepKind::Message => "message",
            StepKind::Other(tag) => tag,
        }
    }

    /// Icon shown in front of a step
    pub fn icon(&self) -> &'static str {
        match self {
            StepKind::Think => "🤔",
            StepKind::Tool => "🛠️",
            StepKind::Act => "🚀",
            StepKind::Result => "🏁",
            StepKind::Log => "📝",
            StepKind::Run => "⚙️",
            StepKind::Message | StepKind::Other(_) => "ℹ️",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Think => "Thinking",
            StepKind::Tool => "Using Tool",
            StepKind::Act => "Action",
            StepKind::Result => "Result",
            StepKind::Log => "Log",
            StepKind::Run => "Running",
            StepKind::Message | StepKind::Other(_) => "Info",
        }
    }
}

impl Default for StepKind {
    fn default() -> Self {
        StepKind::Other("step".to_string())
    }
}

impl From<&str> for StepKind {
    fn from(tag: &str) -> Self {
        match tag {
            "think" => StepKind::Think,
            "tool" => StepKind::Tool,
            "act" => StepKind::Act,
            "log" => StepKind::Log,
            "run" => StepKind::Run,
            "result" => StepKind::Result,
            "message" => StepKind::Message,
            "" => StepKind::default(),
            other => StepKind::Other(other.to_string()),
        }
    }
}

impl From<Option<String>> for StepKind {
    fn from(tag: Option<String>) -> Self {
        tag.as_deref().map(StepKind::from).unwrap_or_default()
    }
}

impl From<StepKind> for String {
    fn from(kind: StepKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One unit of recorded task progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "type", default)]
    pub kind: StepKind,
    #[serde(default, deserialize_with = "de_text")]
    pub result: String,
    #[serde(default, deserialize_with = "de_timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Step {
    pub fn new(kind: StepKind, result: impl Into<String>) -> Self {
        Self {
            kind,
            result: result.into(),
            timestamp: None,
        }
    }
}

/// Result payload of the last step of type "result", if any
pub fn last_result(steps: &[Step]) -> Option<&str> {
    steps
        .iter()
        .rev()
        .find(|s| s.kind == StepKind::Result)
        .map(|s| s.result.as_str())
}

/// A task as returned by `GET /tasks/{id}` and `GET /tasks`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub prompt: String,
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Task {
    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Running
    }

    /// Short id used in titles
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// Body of `POST /tasks`
#[derive(Debug, Clone, Serialize)]
pub struct CreateTaskRequest<'a> {
    pub prompt: &'a str,
}

/// Success body of `POST /tasks`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskResponse {
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Error body of any failed request
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// The detail as display text; FastAPI-style validation errors are lists
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A file ready to be sent in a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Accept any JSON for a text payload: strings as-is, null as empty,
/// everything else as its JSON text.
pub(crate) fn de_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn de_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp))
}

/// Parse RFC 3339, naive ISO-8601 (taken as UTC) or Unix seconds
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        Value::Number(n) => n
            .as_f64()
            .and_then(|secs| DateTime::from_timestamp_millis((secs * 1000.0) as i64)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_kind_from_tag() {
        assert_eq!(StepKind::from("think"), StepKind::Think);
        assert_eq!(StepKind::from("result"), StepKind::Result);
        assert_eq!(StepKind::from("weird"), StepKind::Other("weird".into()));
        assert_eq!(StepKind::from(""), StepKind::Other("step".into()));
    }

    #[test]
    fn test_step_missing_or_null_type_defaults() {
        let step: Step = serde_json::from_value(json!({"result": "x"})).unwrap();
        assert_eq!(step.kind, StepKind::Other("step".into()));

        let step: Step = serde_json::from_value(json!({"type": null, "result": "x"})).unwrap();
        assert_eq!(step.kind, StepKind::Other("step".into()));
    }

    #[test]
    fn test_step_result_accepts_non_strings() {
        let step: Step = serde_json::from_value(json!({"type": "tool", "result": {"ok": true}})).unwrap();
        assert_eq!(step.result, r#"{"ok":true}"#);

        let step: Step = serde_json::from_value(json!({"type": "tool", "result": null})).unwrap();
        assert_eq!(step.result, "");
    }

    #[test]
    fn test_task_parses_server_shape() {
        let task: Task = serde_json::from_value(json!({
            "id": "0f8fad5b-d9cb-469f-a165-70867728950e",
            "prompt": "summarize the repo",
            "status": "completed",
            "created_at": "2025-03-01T10:15:30.123456",
            "steps": [
                {"type": "think", "result": "planning", "timestamp": "2025-03-01T10:15:31Z"},
                {"type": "result", "result": "done"}
            ]
        }))
        .unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.steps.len(), 2);
        assert!(task.created_at.is_some());
        assert!(task.steps[0].timestamp.is_some());
        assert_eq!(task.short_id(), "0f8fad5b");
        assert_eq!(last_result(&task.steps), Some("done"));
    }

    #[test]
    fn test_unknown_status() {
        let task: Task =
            serde_json::from_value(json!({"id": "t", "status": "paused"})).unwrap();
        assert_eq!(task.status, TaskStatus::Unknown);
        assert_eq!(task.status.glyph(), "⏳");
    }

    #[test]
    fn test_last_result_picks_latest() {
        let steps = vec![
            Step::new(StepKind::Result, "first"),
            Step::new(StepKind::Log, "noise"),
            Step::new(StepKind::Result, "second"),
            Step::new(StepKind::Think, "after"),
        ];
        assert_eq!(last_result(&steps), Some("second"));
        assert_eq!(last_result(&steps[1..2]), None);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp(&json!("2025-03-01T10:15:30+02:00")).is_some());
        assert!(parse_timestamp(&json!("2025-03-01 10:15:30")).is_some());
        assert_eq!(
            parse_timestamp(&json!(1_700_000_000)).map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
        assert!(parse_timestamp(&json!("yesterday")).is_none());
    }

    #[test]
    fn test_error_body_detail() {
        let body: ErrorBody = serde_json::from_value(json!({"detail": "bad prompt"})).unwrap();
        assert_eq!(body.detail_text().as_deref(), Some("bad prompt"));

        let body: ErrorBody = serde_json::from_value(json!({})).unwrap();
        assert_eq!(body.detail_text(), None);
    }
}
