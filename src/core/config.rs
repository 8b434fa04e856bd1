//! Orchestrator configuration. Everything the core needs arrives through
//! this record; nothing is read from the environment.

use std::path::PathBuf;

use tokio::time::Duration;

use crate::core::error::ValidationError;
use crate::core::llm::LlmConfig;
use crate::core::memory::MemoryConfig;

pub const MIN_AGENTS: usize = 1;
pub const MAX_AGENTS: usize = 20;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Ceiling on concurrently outstanding agents.
    pub max_agents: usize,
    /// How long terminal agent records are retained for reporting.
    pub agent_grace: Duration,
    /// Upper bound on how long `stop` waits for in-flight agents.
    pub stop_deadline: Duration,
    /// Extend queue cleanup to `failed` tasks.
    pub cleanup_removes_failed: bool,
    pub memory: MemoryConfig,
    pub llm: LlmConfig,
}

impl OrchestratorConfig {
    pub fn new(memory_path: impl Into<PathBuf>) -> Self {
        Self {
            max_agents: 10,
            agent_grace: Duration::from_millis(300_000),
            stop_deadline: Duration::from_millis(120_000),
            cleanup_removes_failed: false,
            memory: MemoryConfig::new(memory_path),
            llm: LlmConfig::default(),
        }
    }

    pub fn with_max_agents(mut self, max_agents: usize) -> Self {
        self.max_agents = max_agents;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_agents < MIN_AGENTS || self.max_agents > MAX_AGENTS {
            return Err(ValidationError::MaxAgentsOutOfRange {
                got: self.max_agents,
                min: MIN_AGENTS,
                max: MAX_AGENTS,
            });
        }
        Ok(())
    }
}
