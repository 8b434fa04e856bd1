//! Pending-task storage with priority ordering and dependency gating.

use std::collections::HashMap;

use chrono::Utc;
use tokio::time::Duration;

use crate::core::task::{Task, TaskStatus};

/// Mapping `id -> Task` with an implicit ordering by (priority rank
/// descending, creation time ascending, insertion order ascending).
///
/// A task is eligible for selection only while `pending` and only when every
/// declared dependency resolves within the queue to a `completed` task.
/// Missing and non-completed predecessors both gate; two tasks that depend
/// on each other are perpetually ineligible and [TaskQueue::get_next] keeps
/// returning `None`. Cycle detection is the caller's concern.
#[derive(Default)]
pub struct TaskQueue {
    tasks: HashMap<String, Task>,
    next_seq: u64,
    cleanup_removes_failed: bool,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend [TaskQueue::cleanup] to `failed` tasks as well.
    pub fn with_cleanup_removes_failed(mut self, yes: bool) -> Self {
        self.cleanup_removes_failed = yes;
        self
    }

    /// Insert a task, replacing any prior task with the same id.
    pub fn add(&mut self, mut task: Task) {
        task.seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.insert(task.id.clone(), task);
    }

    /// Count of tasks currently in `pending` status.
    pub fn size(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .count()
    }

    fn dependencies_satisfied(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|dep| {
            self.tasks
                .get(dep)
                .is_some_and(|t| t.status == TaskStatus::Completed)
        })
    }

    /// Select the next runnable task, transitioning it to `running`.
    ///
    /// Among eligible tasks the highest priority rank wins; ties break by
    /// earliest creation time, then insertion order.
    pub fn get_next(&mut self) -> Option<Task> {
        let chosen = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .filter(|t| self.dependencies_satisfied(t))
            .max_by(|a, b| {
                a.priority
                    .rank()
                    .cmp(&b.priority.rank())
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| b.seq.cmp(&a.seq))
            })
            .map(|t| t.id.clone())?;

        let task = self.tasks.get_mut(&chosen)?;
        task.status = TaskStatus::Running;
        task.updated_at = Utc::now();
        Some(task.clone())
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Snapshot of all tasks, any status.
    pub fn all_tasks(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    /// Transition a task's status, bumping `updated_at`. No-op for unknown ids.
    pub fn set_status(&mut self, id: &str, status: TaskStatus) {
        if let Some(task) = self.tasks.get_mut(id) {
            task.status = status;
            task.updated_at = Utc::now();
        }
    }

    /// Remove terminal `completed` tasks created more than `max_age` ago
    /// (and `failed` ones when so configured). `pending` and `running`
    /// tasks are never removed.
    pub fn cleanup(&mut self, max_age: Duration) {
        let Ok(age) = chrono::Duration::from_std(max_age) else {
            return;
        };
        let cutoff = Utc::now() - age;
        let removes_failed = self.cleanup_removes_failed;
        self.tasks.retain(|_, t| {
            let expired = t.created_at < cutoff;
            let removable = t.status == TaskStatus::Completed
                || (removes_failed && t.status == TaskStatus::Failed);
            !(expired && removable)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{AgentMode, Priority};
    use chrono::{DateTime, Utc};

    fn task(id: &str, priority: Priority, deps: &[&str]) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            description: format!("task {id}"),
            mode: AgentMode::Coder,
            priority,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            status: TaskStatus::Pending,
            files: Vec::new(),
            created_at: now,
            updated_at: now,
            seq: 0,
        }
    }

    fn task_at(id: &str, priority: Priority, created_at: DateTime<Utc>) -> Task {
        let mut t = task(id, priority, &[]);
        t.created_at = created_at;
        t.updated_at = created_at;
        t
    }

    #[test]
    fn priority_ordering() {
        let mut queue = TaskQueue::new();
        queue.add(task("L", Priority::Low, &[]));
        queue.add(task("H", Priority::High, &[]));
        queue.add(task("M", Priority::Medium, &[]));

        assert_eq!(queue.get_next().unwrap().id, "H");
        assert_eq!(queue.get_next().unwrap().id, "M");
        assert_eq!(queue.get_next().unwrap().id, "L");
        assert!(queue.get_next().is_none());
    }

    #[test]
    fn equal_priority_breaks_ties_by_creation_time() {
        let now = Utc::now();
        let mut queue = TaskQueue::new();
        queue.add(task_at("younger", Priority::Medium, now));
        queue.add(task_at("older", Priority::Medium, now - chrono::Duration::seconds(5)));

        assert_eq!(queue.get_next().unwrap().id, "older");
        assert_eq!(queue.get_next().unwrap().id, "younger");
    }

    #[test]
    fn selected_task_transitions_to_running() {
        let mut queue = TaskQueue::new();
        queue.add(task("a", Priority::Medium, &[]));

        let selected = queue.get_next().unwrap();
        assert_eq!(selected.status, TaskStatus::Running);
        assert_eq!(queue.get_by_id("a").unwrap().status, TaskStatus::Running);
        assert!(selected.updated_at >= selected.created_at);
    }

    #[test]
    fn dependency_gating() {
        let mut queue = TaskQueue::new();
        queue.add(task("a", Priority::Medium, &[]));
        queue.add(task("b", Priority::High, &["a"]));

        // b outranks a but is gated behind it.
        assert_eq!(queue.get_next().unwrap().id, "a");
        assert!(queue.get_next().is_none());

        queue.set_status("a", TaskStatus::Completed);
        assert_eq!(queue.get_next().unwrap().id, "b");
    }

    #[test]
    fn failed_dependency_keeps_gating() {
        let mut queue = TaskQueue::new();
        queue.add(task("a", Priority::Medium, &[]));
        queue.add(task("b", Priority::Medium, &["a"]));

        queue.get_next();
        queue.set_status("a", TaskStatus::Failed);
        assert!(queue.get_next().is_none());
    }

    #[test]
    fn missing_dependency_gates() {
        let mut queue = TaskQueue::new();
        queue.add(task("b", Priority::High, &["ghost"]));
        assert!(queue.get_next().is_none());
    }

    #[test]
    fn cycle_is_a_non_progress_condition() {
        let mut queue = TaskQueue::new();
        queue.add(task("x", Priority::Medium, &["y"]));
        queue.add(task("y", Priority::Medium, &["x"]));

        for _ in 0..3 {
            assert!(queue.get_next().is_none());
        }
        assert_eq!(queue.size(), 2);
    }

    #[test]
    fn re_adding_an_id_replaces_the_task() {
        let mut queue = TaskQueue::new();
        queue.add(task("a", Priority::Low, &[]));
        let before = queue.all_tasks().len();

        queue.add(task("a", Priority::High, &[]));
        assert_eq!(queue.all_tasks().len(), before);
        assert_eq!(queue.size(), 1);
        assert_eq!(queue.get_by_id("a").unwrap().priority, Priority::High);
    }

    #[test]
    fn cleanup_removes_only_old_completed() {
        let old = Utc::now() - chrono::Duration::hours(2);
        let mut queue = TaskQueue::new();

        for (id, status) in [
            ("done", TaskStatus::Completed),
            ("failed", TaskStatus::Failed),
            ("pending", TaskStatus::Pending),
            ("running", TaskStatus::Running),
        ] {
            let mut t = task_at(id, Priority::Medium, old);
            t.status = status;
            queue.add(t);
        }
        queue.add(task("fresh-done", Priority::Medium, &[]));
        queue.set_status("fresh-done", TaskStatus::Completed);

        queue.cleanup(Duration::from_secs(3600));

        let ids: Vec<String> = queue.all_tasks().into_iter().map(|t| t.id).collect();
        assert!(!ids.contains(&"done".to_string()));
        assert!(ids.contains(&"failed".to_string()));
        assert!(ids.contains(&"pending".to_string()));
        assert!(ids.contains(&"running".to_string()));
        assert!(ids.contains(&"fresh-done".to_string()));
    }

    #[test]
    fn cleanup_can_be_extended_to_failed() {
        let old = Utc::now() - chrono::Duration::hours(2);
        let mut queue = TaskQueue::new().with_cleanup_removes_failed(true);

        let mut t = task_at("failed", Priority::Medium, old);
        t.status = TaskStatus::Failed;
        queue.add(t);

        queue.cleanup(Duration::from_secs(3600));
        assert!(queue.all_tasks().is_empty());
    }
}
