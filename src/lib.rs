//! starling — a dependency-aware multi-agent orchestrator for hosted LLM
//! backends.
//!
//! A caller constructs an [Orchestrator] from an [OrchestratorConfig] and an
//! [LlmAdapter], starts it, and submits tasks. Each task is dispatched to a
//! single ephemeral agent that reads mode-tagged context from the
//! [MemoryStore], calls the backend through the adapter (behind per-minute
//! and per-day rate limiters), and persists its result or error. Agents run
//! concurrently up to a configured ceiling; tasks may declare ordering
//! dependencies; lifecycle is observable through typed events.
//!
//! ```no_run
//! use std::sync::Arc;
//! use starling::{
//!     HttpProvider, HttpProviderConfig, LlmAdapter, LlmConfig, Orchestrator,
//!     OrchestratorConfig, Priority, TaskSubmission,
//! };
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let provider = HttpProvider::new(HttpProviderConfig {
//!     base_url: "https://api.example.com/v1/chat/completions".into(),
//!     model: "example-model".into(),
//!     api_key: "...".into(),
//! });
//! let adapter = LlmAdapter::new(Arc::new(provider), LlmConfig::default());
//! let orch = Orchestrator::new(OrchestratorConfig::new("memory.json"), adapter)?;
//!
//! let mut events = orch.subscribe();
//! orch.start().await?;
//! orch.add_task(
//!     TaskSubmission::new("t1", "Sketch the module layout", "architect")
//!         .with_priority(Priority::High),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod logging;

pub use crate::core::config::OrchestratorConfig;
pub use crate::core::error::{
    FailureKind, LifecycleError, LlmError, OrchestratorError, StorageError, ValidationError,
    classify_failure, redact_secrets,
};
pub use crate::core::llm::provider::{
    EncodedFile, GenerationRequest, HttpProvider, HttpProviderConfig, LlmProvider,
};
pub use crate::core::llm::{LlmAdapter, LlmConfig, RateLimitStatus};
pub use crate::core::memory::types::{
    ContextSummary, EntryContent, EntryKind, MemoryEntry, NewEntry,
};
pub use crate::core::memory::{MemoryConfig, MemoryStore};
pub use crate::core::orchestrator::{
    EventBus, Orchestrator, OrchestratorEvent, StatusSnapshot,
};
pub use crate::core::queue::TaskQueue;
pub use crate::core::ratelimit::{RateLimitConfig, RateLimiter, WindowSnapshot};
pub use crate::core::task::{
    AgentMode, AgentRecord, AgentStatus, Priority, Task, TaskFile, TaskStatus, TaskSubmission,
};
