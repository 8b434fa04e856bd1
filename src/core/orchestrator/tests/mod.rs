//! Shared fixtures for orchestrator tests: a scriptable provider and event
//! helpers.


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::time::Duration;

use crate::core::config::OrchestratorConfig;
use crate::core::llm::provider::{GenerationRequest, LlmProvider};
use crate::core::llm::{LlmAdapter, LlmConfig};
use crate::core::orchestrator::{Orchestrator, OrchestratorEvent};
use crate::core::task::{Priority, TaskSubmission};

const HEALTH_PROBE_PREFIX: &str = "Reply with a single word";

/// Scriptable in-process provider. Health probes always succeed and are
/// not recorded, so gated or failing scripts do not stall `start()`.
pub(super) struct TestProvider {
    pub prompts: Mutex<Vec<String>>,
    fail_with: Option<String>,
    delay: Option<Duration>,
    release: Option<watch::Receiver<bool>>,
    concurrent: AtomicUsize,
    pub max_concurrent: AtomicUsize,
}

impl TestProvider {
    pub fn ok() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail_with: None,
            delay: None,
            release: None,
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::ok()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::ok()
        }
    }

    /// Calls block until the watch flips to `true`.
    pub fn gated() -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let provider = Self {
            release: Some(rx),
            ..Self::ok()
        };
        (provider, tx)
    }
}

#[async_trait]
impl LlmProvider for TestProvider {
    fn provider_id(&self) -> &str {
        "test"
    }

    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String> {
        if request.user.starts_with(HEALTH_PROBE_PREFIX) {
            return Ok("ok".to_string());
        }

        self.prompts.lock().await.push(request.user.clone());
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(release) = &self.release {
            let mut release = release.clone();
            while !*release.borrow() {
                if release.changed().await.is_err() {
                    break;
                }
            }
        }

        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(format!("done: {}", request.user.lines().last().unwrap_or(""))),
        }
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> anyhow::Result<mpsc::Receiver<anyhow::Result<String>>> {
        let (tx, rx) = mpsc::channel(1);
        let text = self.generate(request).await?;
        tokio::spawn(async move {
            let _ = tx.send(Ok(text)).await;
        });
        Ok(rx)
    }
}

pub(super) fn test_config(max_agents: usize) -> OrchestratorConfig {
    let dir = std::env::temp_dir().join(format!("starling-orch-{}", uuid::Uuid::new_v4()));
    OrchestratorConfig::new(dir.join("memory.json")).with_max_agents(max_agents)
}

pub(super) fn orchestrator_with(
    provider: TestProvider,
    max_agents: usize,
) -> (Orchestrator, Arc<TestProvider>) {
    let provider = Arc::new(provider);
    let adapter = LlmAdapter::new(provider.clone(), LlmConfig::default());
    let orch = Orchestrator::new(test_config(max_agents), adapter).expect("valid config");
    (orch, provider)
}

pub(super) fn submission(id: &str, priority: Priority, deps: &[&str]) -> TaskSubmission {
    TaskSubmission::new(id, format!("work on {id}"), "coder")
        .with_priority(priority)
        .with_dependencies(deps.iter().map(|s| s.to_string()).collect())
}

pub(super) async fn next_event(
    rx: &mut broadcast::Receiver<OrchestratorEvent>,
) -> OrchestratorEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Skip forward to the first event matching `pred`.
pub(super) async fn wait_for(
    rx: &mut broadcast::Receiver<OrchestratorEvent>,
    pred: impl Fn(&OrchestratorEvent) -> bool,
) -> OrchestratorEvent {
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

pub(super) fn is_task_completed(event: &OrchestratorEvent, task_id: &str) -> bool {
    matches!(event, OrchestratorEvent::TaskCompleted { task_id: id } if id == task_id)
}
