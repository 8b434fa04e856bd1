//! Task and agent records shared across the queue, orchestrator, and memory.

use chrono::{DateTime, Utc};

/// Closed set of agent modes. The mode selects the system prompt and
/// sampling temperature for the LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Architect,
    Coder,
    Tester,
    Debugger,
    Security,
    Documentation,
    Integrator,
    Monitor,
    Optimizer,
    Ask,
    Devops,
    Tutorial,
    Database,
    Specification,
    Mcp,
    Orchestrator,
    Designer,
}

impl AgentMode {
    pub const ALL: [AgentMode; 17] = [
        AgentMode::Architect,
        AgentMode::Coder,
        AgentMode::Tester,
        AgentMode::Debugger,
        AgentMode::Security,
        AgentMode::Documentation,
        AgentMode::Integrator,
        AgentMode::Monitor,
        AgentMode::Optimizer,
        AgentMode::Ask,
        AgentMode::Devops,
        AgentMode::Tutorial,
        AgentMode::Database,
        AgentMode::Specification,
        AgentMode::Mcp,
        AgentMode::Orchestrator,
        AgentMode::Designer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentMode::Architect => "architect",
            AgentMode::Coder => "coder",
            AgentMode::Tester => "tester",
            AgentMode::Debugger => "debugger",
            AgentMode::Security => "security",
            AgentMode::Documentation => "documentation",
            AgentMode::Integrator => "integrator",
            AgentMode::Monitor => "monitor",
            AgentMode::Optimizer => "optimizer",
            AgentMode::Ask => "ask",
            AgentMode::Devops => "devops",
            AgentMode::Tutorial => "tutorial",
            AgentMode::Database => "database",
            AgentMode::Specification => "specification",
            AgentMode::Mcp => "mcp",
            AgentMode::Orchestrator => "orchestrator",
            AgentMode::Designer => "designer",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "architect" => Some(AgentMode::Architect),
            "coder" => Some(AgentMode::Coder),
            "tester" => Some(AgentMode::Tester),
            "debugger" => Some(AgentMode::Debugger),
            "security" => Some(AgentMode::Security),
            "documentation" => Some(AgentMode::Documentation),
            "integrator" => Some(AgentMode::Integrator),
            "monitor" => Some(AgentMode::Monitor),
            "optimizer" => Some(AgentMode::Optimizer),
            "ask" => Some(AgentMode::Ask),
            "devops" => Some(AgentMode::Devops),
            "tutorial" => Some(AgentMode::Tutorial),
            "database" => Some(AgentMode::Database),
            "specification" => Some(AgentMode::Specification),
            "mcp" => Some(AgentMode::Mcp),
            "orchestrator" => Some(AgentMode::Orchestrator),
            "designer" => Some(AgentMode::Designer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Ordering rank: higher runs first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// A file attached to a task, forwarded to the multimodal adapter call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TaskFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// A user-submitted work item. `id` never changes after insertion and
/// `dependencies` is immutable; only the scheduler mutates `status`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub mode: AgentMode,
    pub priority: Priority,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub files: Vec<TaskFile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Insertion order within the queue, assigned on add. Breaks priority
    /// ties when two tasks share a creation timestamp.
    #[serde(skip)]
    pub(crate) seq: u64,
}

/// Boundary shape for task submission. The mode arrives as a free string
/// and is validated against the closed enum before a [Task] is built.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TaskSubmission {
    pub id: String,
    pub description: String,
    pub mode: String,
    pub priority: Priority,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub files: Vec<TaskFile>,
}

impl TaskSubmission {
    pub fn new(id: impl Into<String>, description: impl Into<String>, mode: &str) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            mode: mode.to_string(),
            priority: Priority::Medium,
            dependencies: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_files(mut self, files: Vec<TaskFile>) -> Self {
        self.files = files;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AgentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Failed)
    }
}

/// An ephemeral execution record coupling one task to one LLM invocation.
/// Created in `running` state; exactly one of `result`/`error` is populated
/// on the terminal transition, together with `end_time`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub mode: AgentMode,
    pub task_id: String,
    pub task: String,
    pub status: AgentStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub error: Option<String>,
}
