//! Session state shared by every front end

use crate::backend::TaskBackend;
use crate::error::{Error, Result};
use crate::history::HistoryList;
use crate::staging::UploadStaging;
use crate::subscription::{SessionUpdate, Subscription, SubscriptionConfig, UpdateSender};
use crate::view::{TaskView, ViewUpdate};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receiving side for updates produced by subscriptions. Feed each item
/// to [`Session::apply`].
pub type UpdateReceiver = mpsc::UnboundedReceiver<SessionUpdate>;

/// Owns the task view, history, upload staging and the one open
/// subscription.
pub struct Session {
    backend: Arc<dyn TaskBackend>,
    config: SubscriptionConfig,
    view: TaskView,
    history: HistoryList,
    staging: UploadStaging,
    current: Option<Subscription>,
    generation: u64,
    update_tx: UpdateSender,
}

impl Session {
    pub fn new(backend: Arc<dyn TaskBackend>, config: SubscriptionConfig) -> (Self, UpdateReceiver) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let session = Self {
            backend,
            config,
            view: TaskView::new(),
            history: HistoryList::new(),
            staging: UploadStaging::new(),
            current: None,
            generation: 0,
            update_tx,
        };
        (session, update_rx)
    }

    pub fn view(&self) -> &TaskView {
        &self.view
    }

    pub fn history(&self) -> &HistoryList {
        &self.history
    }

    pub fn staging(&self) -> &UploadStaging {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut UploadStaging {
        &mut self.staging
    }

    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    /// Id of the task whose stream is open, if any
    pub fn subscribed_task(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.task_id())
    }

    /// Create a task from `prompt` and follow it.
    ///
    /// A blank prompt is rejected before any request. A failed creation is
    /// shown in the view and returned.
    pub async fn submit(&mut self, prompt: &str) -> Result<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::EmptyPrompt);
        }

        self.close_subscription().await;
        self.view.apply(ViewUpdate::Submitting);

        match self.backend.create_task(prompt).await {
            Ok(task_id) => {
                tracing::info!(task_id = %task_id, "task created");
                self.open_subscription(&task_id).await;
                self.refresh_history().await;
                Ok(task_id)
            }
            Err(e) => {
                tracing::warn!("task creation failed: {}", e);
                self.view.apply(ViewUpdate::RequestFailed {
                    message: format!("Error: {}", e),
                });
                Err(e.into())
            }
        }
    }

    /// Start streaming `task_id`, replacing any open subscription
    pub async fn open_subscription(&mut self, task_id: &str) {
        self.close_subscription().await;
        self.generation += 1;
        self.view.apply(ViewUpdate::Subscribed {
            task_id: task_id.to_string(),
        });
        tracing::debug!(task_id, generation = self.generation, "opening subscription");
        self.current = Some(Subscription::spawn(
            self.backend.clone(),
            task_id.to_string(),
            self.generation,
            self.config.clone(),
            self.update_tx.clone(),
        ));
    }

    /// Close the open subscription, if any, and wait for it to stop.
    /// Updates it already queued become stale.
    pub async fn close_subscription(&mut self) {
        if let Some(subscription) = self.current.take() {
            subscription.close().await;
            self.generation += 1;
        }
    }

    /// Show an existing task; running tasks are followed live
    pub async fn load_task(&mut self, task_id: &str) -> Result<()> {
        self.close_subscription().await;
        self.view.apply(ViewUpdate::Loading {
            task_id: task_id.to_string(),
        });

        match self.backend.get_task(task_id).await {
            Ok(task) if task.is_running() => {
                self.open_subscription(&task.id).await;
                Ok(())
            }
            Ok(task) => {
                tracing::debug!(task_id, status = %task.status, "showing settled task");
                self.view.apply(ViewUpdate::Finished(task));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(task_id, "failed to load task: {}", e);
                self.view.apply(ViewUpdate::RequestFailed {
                    message: format!("Failed to load task: {}", e),
                });
                Err(e.into())
            }
        }
    }

    /// Load the task behind a history row
    pub async fn open_history_entry(&mut self, index: usize) -> Result<()> {
        let task_id = self
            .history
            .entry(index)
            .map(|e| e.id.clone())
            .ok_or(Error::NoSuchEntry(index))?;
        self.load_task(&task_id).await
    }

    pub async fn refresh_history(&mut self) {
        self.history.refresh(self.backend.as_ref()).await;
    }

    /// Delete all tasks after `confirm` agrees and return to the welcome
    /// screen. Returns whether anything was cleared.
    pub async fn clear_history<F>(&mut self, confirm: F) -> Result<bool>
    where
        F: FnOnce() -> bool,
    {
        if !self.history.clear(self.backend.as_ref(), confirm).await? {
            return Ok(false);
        }
        self.close_subscription().await;
        self.view.apply(ViewUpdate::Welcome);
        Ok(true)
    }

    /// Upload staged files and note them in `prompt`
    pub async fn commit_uploads(&mut self, prompt: &mut String) -> Result<Option<serde_json::Value>> {
        self.staging.commit(self.backend.as_ref(), prompt).await
    }

    /// Fold an update from a subscription into the view. Updates from a
    /// replaced subscription are dropped. Returns whether the view changed.
    pub fn apply(&mut self, update: SessionUpdate) -> bool {
        if update.generation != self.generation || (self.current.is_none() && !is_late_poll(&update)) {
            tracing::trace!(generation = update.generation, "dropping stale update");
            return false;
        }
        if update.update.releases_subscription() {
            self.current = None;
        }
        self.view.apply(update.update)
    }
}

/// A poll issued before the subscription released may land afterwards
fn is_late_poll(update: &SessionUpdate) -> bool {
    matches!(update.update, ViewUpdate::StatusPolled { .. })
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("generation", &self.generation)
            .field("current", &self.current)
            .field("phase", &self.view.phase())
            .finish()
    }
}
