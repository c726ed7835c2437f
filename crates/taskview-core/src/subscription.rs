//! Event-stream subscription with polling, heartbeat and reconnection

use crate::backend::TaskBackend;
use crate::view::ViewUpdate;
use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// Timing and retry settings of a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionConfig {
    /// Consecutive transport failures tolerated before giving up
    pub max_retries: u32,
    /// Fixed delay before each reconnect
    pub retry_delay: Duration,
    /// Interval of the redundant status poll
    pub poll_interval: Duration,
    /// Interval of the liveness marker shown before the first event
    pub heartbeat_interval: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(5),
        }
    }
}

/// A view update tagged with the generation of the subscription that made it
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub generation: u64,
    pub update: ViewUpdate,
}

pub(crate) type UpdateSender = mpsc::UnboundedSender<SessionUpdate>;

/// Handle to a running subscription.
///
/// Dropping the handle cancels the subscription; [`Subscription::close`]
/// also waits until the stream and its timers are gone.
pub struct Subscription {
    task_id: String,
    generation: u64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Start following `task_id` in the background
    pub(crate) fn spawn(
        backend: Arc<dyn TaskBackend>,
        task_id: String,
        generation: u64,
        config: SubscriptionConfig,
        tx: UpdateSender,
    ) -> Self {
        let cancel = CancellationToken::new();
        let runner = Runner {
            backend,
            task_id: task_id.clone(),
            generation,
            config,
            tx,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(runner.run());
        Self {
            task_id,
            generation,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the background task has ended on its own
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Cancel the subscription and wait for it to shut down
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(task_id = %self.task_id, "subscription task ended abnormally: {}", e);
            }
        }
        tracing::debug!(task_id = %self.task_id, generation = self.generation, "subscription closed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("task_id", &self.task_id)
            .field("generation", &self.generation)
            .finish()
    }
}

/// How one connection attempt ended
enum Disconnect {
    /// Terminal event delivered, cancellation, or nobody listening
    Done,
    /// Transport failure; reconnect if retries remain
    Lost,
}

struct Runner {
    backend: Arc<dyn TaskBackend>,
    task_id: String,
    generation: u64,
    config: SubscriptionConfig,
    tx: UpdateSender,
    cancel: CancellationToken,
}

impl Runner {
    async fn run(self) {
        let start = Instant::now();
        let mut poll = interval_at(start + self.config.poll_interval, self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat = interval_at(
            start + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut seen_event = false;
        let mut failures = 0u32;

        loop {
            match self
                .connect(&mut poll, &mut heartbeat, &mut seen_event, &mut failures)
                .await
            {
                Disconnect::Done => return,
                Disconnect::Lost => {}
            }

            failures += 1;
            if failures > self.config.max_retries {
                tracing::warn!(task_id = %self.task_id, "giving up after {} reconnect attempts", self.config.max_retries);
                self.send(ViewUpdate::ConnectionFailed);
                return;
            }

            tracing::info!(
                task_id = %self.task_id,
                "connection lost, retrying in {:?} ({}/{})",
                self.config.retry_delay,
                failures,
                self.config.max_retries
            );
            if !self.send(ViewUpdate::Reconnecting {
                attempt: failures,
                max_retries: self.config.max_retries,
                delay: self.config.retry_delay,
            }) {
                return;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.retry_delay) => {}
            }
        }
    }

    async fn connect(
        &self,
        poll: &mut tokio::time::Interval,
        heartbeat: &mut tokio::time::Interval,
        seen_event: &mut bool,
        failures: &mut u32,
    ) -> Disconnect {
        let mut stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Disconnect::Done,
            result = self.backend.subscribe(&self.task_id) => match result {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(task_id = %self.task_id, "failed to open event stream: {}", e);
                    return Disconnect::Lost;
                }
            },
        };

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Disconnect::Done,

                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        *seen_event = true;
                        *failures = 0;
                        let terminal = event.is_terminal();
                        let typed = event.is_typed_step();
                        if !self.send(ViewUpdate::Event { event, at: Utc::now() }) {
                            return Disconnect::Done;
                        }
                        if terminal {
                            return Disconnect::Done;
                        }
                        if typed {
                            self.refresh_status();
                        }
                    }
                    Some(Err(e)) if e.is_transport() => {
                        tracing::warn!(task_id = %self.task_id, "event stream error: {}", e);
                        return Disconnect::Lost;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(task_id = %self.task_id, "dropping event: {}", e);
                    }
                    None => {
                        tracing::warn!(task_id = %self.task_id, "event stream ended before the task finished");
                        return Disconnect::Lost;
                    }
                },

                _ = poll.tick() => self.refresh_status(),

                _ = heartbeat.tick(), if !*seen_event => {
                    if !self.send(ViewUpdate::Heartbeat) {
                        return Disconnect::Done;
                    }
                }
            }
        }
    }

    /// Fetch the task once and report its coarse status
    fn refresh_status(&self) {
        let backend = self.backend.clone();
        let task_id = self.task_id.clone();
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        let generation = self.generation;

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = backend.get_task(&task_id) => result,
            };
            match result {
                Ok(task) => {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let _ = tx.send(SessionUpdate {
                        generation,
                        update: ViewUpdate::StatusPolled {
                            status: task.status,
                            error: task.error,
                        },
                    });
                }
                Err(e) => {
                    tracing::warn!(task_id = %task_id, "status poll failed: {}", e);
                }
            }
        });
    }

    /// Returns false once the receiving side is gone
    fn send(&self, update: ViewUpdate) -> bool {
        self.tx
            .send(SessionUpdate {
                generation: self.generation,
                update,
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Beat, Call, MockBackend, recv_until, running_task};
    use taskview_api::{StepKind, TaskEvent, TaskStatus};

    fn start(
        backend: &Arc<MockBackend>,
        config: SubscriptionConfig,
    ) -> (Subscription, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = Subscription::spawn(backend.clone(), "t1".into(), 7, config, tx);
        (sub, rx)
    }

    fn think(text: &str) -> Beat {
        Beat::Event(TaskEvent::Step {
            kind: StepKind::Think,
            result: text.into(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_forwarded_until_complete() {
        let backend = Arc::new(MockBackend::new());
        backend.script(vec![think("a"), think("b"), Beat::Event(TaskEvent::Complete)]);

        let (sub, mut rx) = start(&backend, SubscriptionConfig::default());
        let updates = recv_until(&mut rx, |u| u.update.releases_subscription()).await;

        let events: Vec<_> = updates
            .iter()
            .filter_map(|u| match &u.update {
                ViewUpdate::Event { event, .. } => Some(event.name().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(events, ["think", "think", "complete"]);
        assert!(updates.iter().all(|u| u.generation == 7));

        sub.close().await;
        assert_eq!(backend.open_streams(), 0);
        assert_eq!(backend.subscribe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_event_is_dropped() {
        let backend = Arc::new(MockBackend::new());
        backend.script(vec![
            think("a"),
            Beat::Malformed,
            think("b"),
            Beat::Event(TaskEvent::Complete),
        ]);

        let (_sub, mut rx) = start(&backend, SubscriptionConfig::default());
        let updates = recv_until(&mut rx, |u| u.update.releases_subscription()).await;
        let count = updates
            .iter()
            .filter(|u| matches!(u.update, ViewUpdate::Event { .. }))
            .count();
        assert_eq!(count, 3);
        assert_eq!(backend.subscribe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion() {
        let backend = Arc::new(MockBackend::new());
        for _ in 0..4 {
            backend.script(vec![Beat::Drop]);
        }

        let (_sub, mut rx) = start(&backend, SubscriptionConfig::default());
        let updates = recv_until(&mut rx, |u| u.update.releases_subscription()).await;

        let attempts: Vec<_> = updates
            .iter()
            .filter_map(|u| match u.update {
                ViewUpdate::Reconnecting {
                    attempt,
                    max_retries,
                    delay,
                } => {
                    assert_eq!(max_retries, 3);
                    assert_eq!(delay, Duration::from_secs(2));
                    Some(attempt)
                }
                _ => None,
            })
            .collect();
        assert_eq!(attempts, [1, 2, 3]);
        assert!(matches!(
            updates.last().map(|u| &u.update),
            Some(ViewUpdate::ConnectionFailed)
        ));
        // Initial connection plus three retries
        assert_eq!(backend.subscribe_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_event_resets_retry_counter() {
        let backend = Arc::new(MockBackend::new());
        backend.script(vec![Beat::Drop]);
        backend.script(vec![Beat::Drop]);
        backend.script(vec![think("recovered"), Beat::Drop]);
        backend.script(vec![Beat::Drop]);
        backend.script(vec![Beat::Event(TaskEvent::Complete)]);

        let (_sub, mut rx) = start(&backend, SubscriptionConfig::default());
        let updates = recv_until(&mut rx, |u| u.update.releases_subscription()).await;

        let attempts: Vec<_> = updates
            .iter()
            .filter_map(|u| match u.update {
                ViewUpdate::Reconnecting { attempt, .. } => Some(attempt),
                _ => None,
            })
            .collect();
        assert_eq!(attempts, [1, 2, 1, 2]);
        assert!(matches!(
            updates.last().map(|u| &u.update),
            Some(ViewUpdate::Event {
                event: TaskEvent::Complete,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_stops_after_first_event() {
        let backend = Arc::new(MockBackend::new());
        backend.script(vec![
            Beat::Sleep(Duration::from_secs(12)),
            think("late"),
            Beat::Sleep(Duration::from_secs(20)),
            Beat::Event(TaskEvent::Complete),
        ]);

        let config = SubscriptionConfig {
            poll_interval: Duration::from_secs(3600),
            ..SubscriptionConfig::default()
        };
        let (_sub, mut rx) = start(&backend, config);
        let updates = recv_until(&mut rx, |u| u.update.releases_subscription()).await;

        let first_event = updates
            .iter()
            .position(|u| matches!(u.update, ViewUpdate::Event { .. }))
            .unwrap();
        let heartbeats_before = updates[..first_event]
            .iter()
            .filter(|u| matches!(u.update, ViewUpdate::Heartbeat))
            .count();
        let heartbeats_after = updates[first_event..]
            .iter()
            .filter(|u| matches!(u.update, ViewUpdate::Heartbeat))
            .count();
        assert_eq!(heartbeats_before, 2);
        assert_eq!(heartbeats_after, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_and_typed_steps_refresh_status() {
        let backend = Arc::new(MockBackend::new());
        backend.set_task(running_task("t1"));
        backend.script(vec![
            think("a"),
            Beat::Sleep(Duration::from_secs(25)),
            Beat::Event(TaskEvent::Complete),
        ]);

        let (_sub, mut rx) = start(&backend, SubscriptionConfig::default());
        let updates = recv_until(&mut rx, |u| u.update.releases_subscription()).await;
        // Let any in-flight poll land
        tokio::task::yield_now().await;

        // One fetch for the typed step, two from the 10s poll
        let gets = backend
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Get(id) if id == "t1"))
            .count();
        assert_eq!(gets, 3);
        assert!(updates.iter().any(|u| matches!(
            u.update,
            ViewUpdate::StatusPolled {
                status: TaskStatus::Running,
                ..
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_open_stream() {
        let backend = Arc::new(MockBackend::new());
        backend.script(vec![think("a")]);

        let (sub, mut rx) = start(&backend, SubscriptionConfig::default());
        recv_until(&mut rx, |u| matches!(u.update, ViewUpdate::Event { .. })).await;
        assert_eq!(backend.open_streams(), 1);

        sub.close().await;
        assert_eq!(backend.open_streams(), 0);
    }
}
