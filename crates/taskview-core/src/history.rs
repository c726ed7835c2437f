//! Recent-task list

use crate::backend::TaskBackend;
use crate::error::Result;
use chrono::{DateTime, Local, Utc};
use taskview_api::{Task, TaskStatus};

/// Shown in place of the list when the server has no tasks
pub const EMPTY_HISTORY: &str = "No recent tasks";

/// One row of the history panel
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    pub prompt: String,
    pub status: TaskStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    /// Creation time in local time, or empty when unknown
    pub fn created_label(&self) -> String {
        self.created_at
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    }

    pub fn glyph(&self) -> &'static str {
        self.status.glyph()
    }
}

impl From<Task> for HistoryEntry {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            prompt: task.prompt,
            status: task.status,
            created_at: task.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum HistoryState {
    #[default]
    NotLoaded,
    Loaded(Vec<HistoryEntry>),
    /// Fetch failed; holds the panel message
    Failed(String),
}

impl HistoryState {
    /// Panel text shown instead of entries, if any
    pub fn message(&self) -> Option<String> {
        match self {
            HistoryState::NotLoaded => None,
            HistoryState::Loaded(entries) if entries.is_empty() => Some(EMPTY_HISTORY.to_string()),
            HistoryState::Loaded(_) => None,
            HistoryState::Failed(message) => Some(message.clone()),
        }
    }
}

#[derive(Debug, Default)]
pub struct HistoryList {
    state: HistoryState,
}

impl HistoryList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &HistoryState {
        &self.state
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        match &self.state {
            HistoryState::Loaded(entries) => entries,
            _ => &[],
        }
    }

    pub fn entry(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries().get(index)
    }

    /// Re-fetch the list. Failures land in the panel, not in the caller.
    pub async fn refresh(&mut self, backend: &dyn TaskBackend) -> &HistoryState {
        self.state = match backend.list_tasks().await {
            Ok(tasks) => {
                tracing::debug!("loaded {} history entries", tasks.len());
                HistoryState::Loaded(tasks.into_iter().map(HistoryEntry::from).collect())
            }
            Err(e) => {
                tracing::warn!("failed to load history: {}", e);
                HistoryState::Failed(format!("Failed to load history: {}", e))
            }
        };
        &self.state
    }

    /// Delete every task once `confirm` agrees, then reload the list.
    ///
    /// Returns `Ok(false)` when the user declined. On a failed delete the
    /// list is left as it was.
    pub async fn clear<F>(&mut self, backend: &dyn TaskBackend, confirm: F) -> Result<bool>
    where
        F: FnOnce() -> bool,
    {
        if !confirm() {
            return Ok(false);
        }
        backend.clear_tasks().await?;
        tracing::info!("task history cleared");
        self.refresh(backend).await;
        Ok(true)
    }
}
