//! Scripted backend for tests

use crate::backend::TaskBackend;
use crate::subscription::SessionUpdate;
use async_stream::stream;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use taskview_api::{Error, Result, Task, TaskEvent, TaskEventStream, TaskStatus, UploadFile};
use tokio::sync::mpsc;

/// One step of a scripted event stream
pub(crate) enum Beat {
    Event(TaskEvent),
    /// A payload that fails validation
    Malformed,
    /// Transport error; the stream ends
    Drop,
    Sleep(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Create(String),
    Get(String),
    List,
    Clear,
    Upload(Vec<UploadFile>),
    Subscribe(String),
}

/// Counts open streams and remembers the peak
struct OpenGuard {
    open: Arc<AtomicUsize>,
}

impl OpenGuard {
    fn new(open: Arc<AtomicUsize>, peak: &AtomicUsize) -> Self {
        let now = open.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { open }
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct MockBackend {
    calls: Mutex<Vec<Call>>,
    create_results: Mutex<VecDeque<Result<String>>>,
    tasks: Mutex<HashMap<String, Task>>,
    list: Mutex<Vec<Task>>,
    list_error: Mutex<Option<String>>,
    clear_error: Mutex<Option<String>>,
    upload_error: Mutex<Option<String>>,
    scripts: Mutex<VecDeque<Vec<Beat>>>,
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the stream returned by the next `subscribe`; with nothing
    /// queued, `subscribe` returns a stream that never yields
    pub fn script(&self, beats: Vec<Beat>) {
        self.scripts.lock().push_back(beats);
    }

    /// Queue the result of the next `create_task`; defaults to `Ok("task-N")`
    pub fn push_create(&self, result: Result<String>) {
        self.create_results.lock().push_back(result);
    }

    pub fn set_task(&self, task: Task) {
        self.tasks.lock().insert(task.id.clone(), task);
    }

    pub fn set_list(&self, tasks: Vec<Task>) {
        *self.list.lock() = tasks;
    }

    pub fn fail_list(&self, detail: &str) {
        *self.list_error.lock() = Some(detail.to_string());
    }

    pub fn fail_clear(&self, detail: &str) {
        *self.clear_error.lock() = Some(detail.to_string());
    }

    pub fn fail_upload(&self, detail: &str) {
        *self.upload_error.lock() = Some(detail.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn subscribe_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Subscribe(_)))
    }

    pub fn open_streams(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn peak_streams(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl TaskBackend for MockBackend {
    async fn create_task(&self, prompt: &str) -> Result<String> {
        self.record(Call::Create(prompt.to_string()));
        let n = self.count(|c| matches!(c, Call::Create(_)));
        self.create_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("task-{}", n)))
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.record(Call::Get(task_id.to_string()));
        self.tasks
            .lock()
            .get(task_id)
            .cloned()
            .ok_or_else(|| Error::api(404, "Task not found"))
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.record(Call::List);
        match self.list_error.lock().clone() {
            Some(detail) => Err(Error::api(500, detail)),
            None => Ok(self.list.lock().clone()),
        }
    }

    async fn clear_tasks(&self) -> Result<()> {
        self.record(Call::Clear);
        if let Some(detail) = self.clear_error.lock().clone() {
            return Err(Error::api(500, detail));
        }
        self.list.lock().clear();
        Ok(())
    }

    async fn upload(&self, files: Vec<UploadFile>) -> Result<serde_json::Value> {
        self.record(Call::Upload(files.clone()));
        match self.upload_error.lock().clone() {
            Some(detail) => Err(Error::api(500, detail)),
            None => Ok(serde_json::json!({ "uploaded": files.len() })),
        }
    }

    async fn subscribe(&self, task_id: &str) -> Result<TaskEventStream> {
        self.record(Call::Subscribe(task_id.to_string()));
        let beats = self.scripts.lock().pop_front().unwrap_or_default();
        let guard = OpenGuard::new(self.open.clone(), &self.peak);

        Ok(Box::pin(stream! {
            let _guard = guard;
            for beat in beats {
                match beat {
                    Beat::Event(event) => yield Ok(event),
                    Beat::Malformed => yield TaskEvent::parse("think", "{not json"),
                    Beat::Drop => {
                        yield Err(Error::Sse("connection reset".into()));
                        return;
                    }
                    Beat::Sleep(d) => tokio::time::sleep(d).await,
                }
            }
            futures::future::pending::<()>().await;
        }))
    }
}

pub(crate) fn running_task(id: &str) -> Task {
    Task {
        id: id.to_string(),
        prompt: "do the thing".into(),
        status: TaskStatus::Running,
        created_at: None,
        steps: vec![],
        error: None,
    }
}

/// Receive updates until one matches `done` (inclusive)
pub(crate) async fn recv_until(
    rx: &mut mpsc::UnboundedReceiver<SessionUpdate>,
    done: impl Fn(&SessionUpdate) -> bool,
) -> Vec<SessionUpdate> {
    let mut updates = Vec::new();
    let collect = async {
        while let Some(update) = rx.recv().await {
            let finished = done(&update);
            updates.push(update);
            if finished {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(600), collect)
        .await
        .expect("timed out waiting for update");
    updates
}
