//! The agent body: one task, one LLM invocation, one terminal transition.
//!
//! Agents are values inside the orchestrator; this future is the only
//! in-flight piece. Memory writes land strictly after the LLM call returns
//! and strictly before the terminal event is emitted.

use std::sync::atomic::Ordering;

use chrono::Utc;
use tracing::{debug, warn};

use crate::core::error::redact_secrets;
use crate::core::memory::types::{EntryKind, NewEntry};
use crate::core::orchestrator::events::OrchestratorEvent;
use crate::core::orchestrator::{Orchestrator, prompts};
use crate::core::task::{AgentRecord, AgentStatus, Task, TaskStatus};

pub(crate) async fn run(orch: Orchestrator, mut record: AgentRecord, task: Task) {
    let inner = &orch.inner;

    let context = inner.memory.get_context(task.mode).await;
    let prompt = prompts::build_agent_prompt(&task, &context);
    debug!(
        "agent {} running task {} with {} context entries",
        record.id,
        task.id,
        context.len()
    );

    let outcome = if task.files.is_empty() {
        inner.adapter.execute(&prompt, task.mode).await
    } else {
        inner
            .adapter
            .execute_multimodal(&prompt, &task.files, task.mode)
            .await
    };

    record.end_time = Some(Utc::now());
    match outcome {
        Ok(text) => {
            record.status = AgentStatus::Completed;
            record.result = Some(text.clone());
            update_record(&orch, &record).await;

            inner
                .memory
                .store(NewEntry {
                    agent_id: record.id.clone(),
                    kind: EntryKind::Result,
                    content: text.into(),
                    tags: vec![task.mode.as_str().to_string(), "completed".to_string()],
                })
                .await;

            inner
                .queue
                .lock()
                .await
                .set_status(&task.id, TaskStatus::Completed);
            inner.completed.fetch_add(1, Ordering::SeqCst);

            inner
                .events
                .emit(OrchestratorEvent::AgentCompleted(record.clone()));
            inner.events.emit(OrchestratorEvent::TaskCompleted {
                task_id: task.id.clone(),
            });
        }
        Err(e) => {
            let message = redact_secrets(&e.to_string());
            warn!("agent {} failed on task {}: {message}", record.id, task.id);
            record.status = AgentStatus::Failed;
            record.error = Some(message.clone());
            update_record(&orch, &record).await;

            inner
                .memory
                .store(NewEntry {
                    agent_id: record.id.clone(),
                    kind: EntryKind::Error,
                    content: message.clone().into(),
                    tags: vec![task.mode.as_str().to_string(), "failed".to_string()],
                })
                .await;

            inner
                .queue
                .lock()
                .await
                .set_status(&task.id, TaskStatus::Failed);
            inner.failed.fetch_add(1, Ordering::SeqCst);

            inner.events.emit(OrchestratorEvent::AgentFailed {
                agent: record.clone(),
                error: message,
            });
        }
    }

    orch.release_slot();
    orch.tick().await;
}

async fn update_record(orch: &Orchestrator, record: &AgentRecord) {
    orch.inner
        .agents
        .lock()
        .await
        .insert(record.id.clone(), record.clone());
}
