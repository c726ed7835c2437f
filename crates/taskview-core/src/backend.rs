//! Backend abstraction for reaching the task service

use async_trait::async_trait;
use taskview_api::{Result, Task, TaskClient, TaskEventStream, UploadFile};

/// Everything the view, history and staging components need from the
/// service. [`TaskClient`] is the real implementation.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Create a task and return its id
    async fn create_task(&self, prompt: &str) -> Result<String>;

    /// Fetch the current state of one task
    async fn get_task(&self, task_id: &str) -> Result<Task>;

    /// Fetch the task history in server order
    async fn list_tasks(&self) -> Result<Vec<Task>>;

    /// Delete every task
    async fn clear_tasks(&self) -> Result<()>;

    /// Upload files in a single multipart request
    async fn upload(&self, files: Vec<UploadFile>) -> Result<serde_json::Value>;

    /// Open the event stream of one task
    async fn subscribe(&self, task_id: &str) -> Result<TaskEventStream>;
}

#[async_trait]
impl TaskBackend for TaskClient {
    async fn create_task(&self, prompt: &str) -> Result<String> {
        TaskClient::create_task(self, prompt).await
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        TaskClient::get_task(self, task_id).await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        TaskClient::list_tasks(self).await
    }

    async fn clear_tasks(&self) -> Result<()> {
        TaskClient::clear_tasks(self).await
    }

    async fn upload(&self, files: Vec<UploadFile>) -> Result<serde_json::Value> {
        TaskClient::upload(self, files).await
    }

    async fn subscribe(&self, task_id: &str) -> Result<TaskEventStream> {
        self.events(task_id)
    }
}
