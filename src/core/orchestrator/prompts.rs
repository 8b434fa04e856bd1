//! Prompt assembly for agent execution: recent context plus the task.
//! The mode's system prompt is applied by the adapter, not here.

use crate::core::memory::types::ContextSummary;
use crate::core::task::Task;

/// Build the user-side prompt: prior context (when any), then the task.
/// Empty sections are omitted.
pub(crate) fn build_agent_prompt(task: &Task, context: &[ContextSummary]) -> String {
    let mut parts = Vec::new();

    if !context.is_empty() {
        parts.push("# Recent context".to_string());
        for item in context {
            parts.push(format!("- [{}] {}", item.kind.as_str(), item.summary));
        }
        parts.push(String::new());
    }

    parts.push(format!("# Task ({} priority)", priority_label(task)));
    parts.push(task.description.clone());

    parts.join("\n")
}

fn priority_label(task: &Task) -> &'static str {
    match task.priority {
        crate::core::task::Priority::High => "high",
        crate::core::task::Priority::Medium => "medium",
        crate::core::task::Priority::Low => "low",
    }
}
