//! Orchestrator: lifecycle, agent spawning, concurrency accounting, and
//! event emission.
//!
//! The scheduler has no polling timer. A tick runs on `start`, on every
//! `add_task`, and on every agent terminal transition; each tick spawns
//! eligible tasks until the queue runs dry or the agent ceiling is reached.

mod agent;
pub mod events;
mod prompts;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use tokio::sync::{Mutex, Notify, broadcast};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub use events::{EventBus, OrchestratorEvent};

use crate::core::config::OrchestratorConfig;
use crate::core::error::{LifecycleError, OrchestratorError, ValidationError};
use crate::core::llm::LlmAdapter;
use crate::core::memory::MemoryStore;
use crate::core::queue::TaskQueue;
use crate::core::sanitize::sanitize_description;
use crate::core::task::{AgentMode, AgentRecord, AgentStatus, Task, TaskStatus, TaskSubmission};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stopped,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub active_agents: usize,
    pub completed_agents: usize,
    pub failed_agents: usize,
    pub pending_tasks: usize,
}

pub(crate) struct Inner {
    pub(crate) config: OrchestratorConfig,
    pub(crate) phase: Mutex<Phase>,
    pub(crate) queue: Mutex<TaskQueue>,
    pub(crate) agents: Mutex<HashMap<String, AgentRecord>>,
    pub(crate) memory: MemoryStore,
    pub(crate) adapter: Arc<LlmAdapter>,
    pub(crate) events: EventBus,
    pub(crate) active: AtomicUsize,
    pub(crate) completed: AtomicUsize,
    pub(crate) failed: AtomicUsize,
    /// Signalled whenever the active-agent count drops to zero.
    pub(crate) idle: Notify,
}

/// Shared orchestrator handle. Cloning is cheap; all clones drive the same
/// state. Constructed with an explicit adapter — there is no ambient LLM
/// client.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, adapter: LlmAdapter) -> Result<Self, ValidationError> {
        config.validate()?;
        let memory = MemoryStore::new(config.memory.clone());
        let queue = TaskQueue::new().with_cleanup_removes_failed(config.cleanup_removes_failed);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                phase: Mutex::new(Phase::Stopped),
                queue: Mutex::new(queue),
                agents: Mutex::new(HashMap::new()),
                memory,
                adapter: Arc::new(adapter),
                events: EventBus::default(),
                active: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        })
    }

    /// Subscribe to lifecycle events. Attach before [Orchestrator::start]
    /// to observe every event.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.inner.events.subscribe()
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.inner.memory
    }

    pub fn adapter(&self) -> &LlmAdapter {
        &self.inner.adapter
    }

    /// Transition `stopped -> running`: load the memory store, probe the
    /// adapter (non-fatal), emit `Started`, and run a first tick.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        {
            let mut phase = self.inner.phase.lock().await;
            if *phase != Phase::Stopped {
                return Err(LifecycleError::AlreadyRunning);
            }
            *phase = Phase::Running;
        }

        self.inner.memory.initialize().await;
        if !self.inner.adapter.check_health().await {
            warn!("LLM adapter health check failed; continuing startup");
        }

        info!("orchestrator started (max {} agents)", self.inner.config.max_agents);
        self.inner.events.emit(OrchestratorEvent::Started);
        self.spawn_sweep();
        self.tick().await;
        Ok(())
    }

    /// Refuse new work, wait for in-flight agents up to the stop deadline,
    /// flush memory, emit `Stopped`. A no-op when already stopped.
    pub async fn stop(&self) {
        {
            let mut phase = self.inner.phase.lock().await;
            match *phase {
                Phase::Stopped | Phase::Stopping => return,
                Phase::Running => *phase = Phase::Stopping,
            }
        }

        let deadline = Instant::now() + self.inner.config.stop_deadline;
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let active = self.inner.active.load(Ordering::SeqCst);
            if active == 0 {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining == Duration::ZERO {
                warn!("stop deadline reached with {active} agents in flight; detaching");
                break;
            }
            debug!("stopping: waiting for {active} active agents");
            let _ = tokio::time::timeout(remaining, notified).await;
        }

        if let Err(e) = self.inner.memory.flush().await {
            warn!("final memory flush failed: {e}");
        }

        *self.inner.phase.lock().await = Phase::Stopped;
        info!("orchestrator stopped");
        self.inner.events.emit(OrchestratorEvent::Stopped);
    }

    /// Validate and enqueue a task, then tick. Refused unless running.
    pub async fn add_task(&self, submission: TaskSubmission) -> Result<Task, OrchestratorError> {
        if *self.inner.phase.lock().await != Phase::Running {
            return Err(LifecycleError::NotRunning.into());
        }

        let mode = AgentMode::from_name(&submission.mode)
            .ok_or_else(|| ValidationError::UnknownMode(submission.mode.clone()))?;
        let description = sanitize_description(&submission.description)
            .map_err(OrchestratorError::Validation)?;

        let now = Utc::now();
        let task = Task {
            id: submission.id,
            description,
            mode,
            priority: submission.priority,
            dependencies: submission.dependencies,
            status: TaskStatus::Pending,
            files: submission.files,
            created_at: now,
            updated_at: now,
            seq: 0,
        };

        self.inner.queue.lock().await.add(task.clone());
        self.inner.events.emit(OrchestratorEvent::TaskAdded(task.clone()));
        self.tick().await;
        Ok(task)
    }

    pub async fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            is_running: *self.inner.phase.lock().await == Phase::Running,
            active_agents: self.inner.active.load(Ordering::SeqCst),
            completed_agents: self.inner.completed.load(Ordering::SeqCst),
            failed_agents: self.inner.failed.load(Ordering::SeqCst),
            pending_tasks: self.inner.queue.lock().await.size(),
        }
    }

    /// Look up a task in any status.
    pub async fn get_task(&self, id: &str) -> Option<Task> {
        self.inner.queue.lock().await.get_by_id(id).cloned()
    }

    /// Snapshot of all tasks, any status.
    pub async fn all_tasks(&self) -> Vec<Task> {
        self.inner.queue.lock().await.all_tasks()
    }

    /// Snapshot of the retained agent records.
    pub async fn agents(&self) -> Vec<AgentRecord> {
        self.inner.agents.lock().await.values().cloned().collect()
    }

    /// Remove old terminal tasks from the queue (see [TaskQueue::cleanup]).
    pub async fn cleanup_tasks(&self, max_age: Duration) {
        self.inner.queue.lock().await.cleanup(max_age);
    }

    /// Spawn agents for eligible tasks until the queue runs dry or the
    /// agent ceiling is reached. Never suspends on I/O.
    ///
    /// Returns a boxed future rather than `async fn` to break the
    /// `tick` -> `spawn_agent` -> `tokio::spawn(agent::run)` -> `tick`
    /// cycle: with an opaque `async fn` return type in that cycle, the
    /// compiler cannot resolve whether the resulting future is `Send`.
    pub(crate) fn tick(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            loop {
                if *self.inner.phase.lock().await != Phase::Running {
                    return;
                }

                // Reserve a concurrency slot before touching the queue so the
                // ceiling holds even with concurrent ticks.
                let max = self.inner.config.max_agents;
                if self
                    .inner
                    .active
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                        (n < max).then_some(n + 1)
                    })
                    .is_err()
                {
                    return;
                }

                let task = self.inner.queue.lock().await.get_next();
                match task {
                    Some(task) => self.spawn_agent(task).await,
                    None => {
                        self.release_slot();
                        return;
                    }
                }
            }
        })
    }

    async fn spawn_agent(&self, task: Task) {
        let record = AgentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            mode: task.mode,
            task_id: task.id.clone(),
            task: task.description.clone(),
            status: AgentStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            result: None,
            error: None,
        };

        self.inner
            .agents
            .lock()
            .await
            .insert(record.id.clone(), record.clone());
        debug!("agent {} spawned for task {}", record.id, task.id);
        self.inner
            .events
            .emit(OrchestratorEvent::AgentSpawned(record.clone()));

        let orch = self.clone();
        tokio::spawn(agent::run(orch, record, task));
    }

    pub(crate) fn release_slot(&self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }

    /// Periodic sweep pruning terminal agent records past the grace window.
    fn spawn_sweep(&self) {
        let orch = self.clone();
        let period = (self.inner.config.agent_grace / 2).max(Duration::from_millis(100));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if *orch.inner.phase.lock().await == Phase::Stopped {
                    return;
                }
                orch.prune_agents().await;
            }
        });
    }

    pub(crate) async fn prune_agents(&self) {
        let Ok(grace) = chrono::Duration::from_std(self.inner.config.agent_grace) else {
            return;
        };
        let cutoff = Utc::now() - grace;
        let mut agents = self.inner.agents.lock().await;
        let before = agents.len();
        agents.retain(|_, a| {
            !(a.status.is_terminal() && a.end_time.is_some_and(|end| end < cutoff))
        });
        let pruned = before - agents.len();
        if pruned > 0 {
            debug!("pruned {pruned} terminal agent records");
        }
    }
}

#[cfg(test)]
mod tests;
