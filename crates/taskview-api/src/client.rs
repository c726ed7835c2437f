//! REST client for the task service

use reqwest::multipart::{Form, Part};
use reqwest_eventsource::EventSource;
use serde::de::DeserializeOwned;

use crate::{
    error::{Error, Result},
    stream::{TaskEventStream, create_stream},
    types::{CreateTaskRequest, CreateTaskResponse, ErrorBody, Task, UploadFile},
};

/// Default service address when nothing is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Environment variable that overrides the service address
pub const SERVER_ENV_VAR: &str = "TASKVIEW_SERVER";

/// Task service client
#[derive(Debug, Clone)]
pub struct TaskClient {
    client: reqwest::Client,
    base_url: String,
}

impl TaskClient {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create from the `TASKVIEW_SERVER` environment variable, falling back
    /// to [`DEFAULT_BASE_URL`]
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(SERVER_ENV_VAR).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    /// Service address without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /tasks`; returns the new task id
    pub async fn create_task(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url("/tasks"))
            .json(&CreateTaskRequest { prompt })
            .send()
            .await?;

        let body: CreateTaskResponse = read_json(response).await?;
        body.task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidResponse("Invalid task ID".to_string()))
    }

    /// `GET /tasks/{id}`
    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        let response = self
            .client
            .get(self.url(&format!("/tasks/{}", task_id)))
            .send()
            .await?;
        read_json(response).await
    }

    /// `GET /tasks`, in the order the server returns them
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let response = self.client.get(self.url("/tasks")).send().await?;
        read_json(response).await
    }

    /// `DELETE /tasks`
    pub async fn clear_tasks(&self) -> Result<()> {
        let response = self.client.delete(self.url("/tasks")).send().await?;
        check_status(response).await.map(|_| ())
    }

    /// `POST /upload` with every file under the repeated `files` field
    pub async fn upload(&self, files: Vec<UploadFile>) -> Result<serde_json::Value> {
        let form = files.into_iter().fold(Form::new(), |form, file| {
            form.part("files", Part::bytes(file.bytes).file_name(file.name))
        });

        let response = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await?;

        let response = check_status(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
    }

    /// Open `GET /tasks/{id}/events`
    pub fn events(&self, task_id: &str) -> Result<TaskEventStream> {
        let request = self
            .client
            .get(self.url(&format!("/tasks/{}/events", task_id)));

        let event_source = EventSource::new(request)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source)))
    }
}

impl Default for TaskClient {
    fn default() -> Self {
        Self::from_env()
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.detail_text())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(|reason| format!("Request failed: {} {}", status.as_u16(), reason))
                .unwrap_or_else(|| "Request failed".to_string())
        });

    tracing::debug!(status = status.as_u16(), %detail, "request failed");
    Err(Error::api(status.as_u16(), detail))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
