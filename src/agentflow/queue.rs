//! Priority task queue with dependency gating.
//!
//! [`TaskQueue`] stores tasks by id and hands out the next runnable one:
//! highest priority rank first, ties broken by earliest creation time, and
//! only among tasks whose declared predecessors have all reached
//! [`TaskStatus::Completed`].  A task whose predecessor is missing, failed,
//! or still in flight is simply not eligible — including the two-task cycle
//! case, where [`TaskQueue::get_next`] keeps returning `None` without ever
//! raising.  Cycle detection is deliberately the caller's concern.
//!
//! The queue is a plain data structure; the orchestrator owns it and wraps
//! it in its own lock.
//!
//! # Example
//!
//! ```rust
//! use agentflow::mode::AgentMode;
//! use agentflow::queue::TaskQueue;
//! use agentflow::task::{Task, TaskPriority, TaskStatus};
//!
//! let mut queue = TaskQueue::new();
//! queue.add(Task::new("low", "later", AgentMode::Coder).with_priority(TaskPriority::Low));
//! queue.add(Task::new("high", "first", AgentMode::Coder).with_priority(TaskPriority::High));
//!
//! let next = queue.get_next().unwrap();
//! assert_eq!(next.id, "high");
//! assert_eq!(next.status, TaskStatus::Running);
//! ```

use crate::agentflow::task::{Task, TaskStatus};
use chrono::{Duration, Utc};
use std::collections::HashMap;

/// Mapping-by-id task storage with priority-ordered, dependency-gated
/// selection.
#[derive(Default)]
pub struct TaskQueue {
    tasks: HashMap<String, Task>,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task, replacing any existing task with the same id.
    ///
    /// Last write wins: re-adding an id overwrites the prior task, so
    /// [`get_all_tasks`](TaskQueue::get_all_tasks) always returns one entry
    /// per id.
    pub fn add(&mut self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    /// Number of tasks currently in `Pending` status.
    pub fn size(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .count()
    }

    /// Select, claim, and return the next runnable task.
    ///
    /// Eligible tasks are `Pending` with every dependency resolved to a
    /// `Completed` task in this queue.  Among them the highest priority rank
    /// wins; ties go to the earliest `created_at`.  The winner is atomically
    /// transitioned to `Running` before being returned.  Returns `None` when
    /// nothing is eligible.
    pub fn get_next(&mut self) -> Option<Task> {
        let chosen_id = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending && self.dependencies_satisfied(t))
            .min_by(|a, b| {
                b.priority
                    .rank()
                    .cmp(&a.priority.rank())
                    .then(a.created_at.cmp(&b.created_at))
                    // Stable order even if two tasks share a creation instant.
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|t| t.id.clone())?;

        let task = self.tasks.get_mut(&chosen_id).expect("chosen id exists");
        task.set_status(TaskStatus::Running);
        Some(task.clone())
    }

    /// Look up a task by id, regardless of status.
    pub fn get_by_id(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Snapshot of all tasks, all statuses.
    pub fn get_all_tasks(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    /// Mark a running task `Completed`.
    pub fn mark_completed(&mut self, id: &str) {
        if let Some(task) = self.tasks.get_mut(id) {
            task.set_status(TaskStatus::Completed);
        }
    }

    /// Mark a running task `Failed`.
    pub fn mark_failed(&mut self, id: &str) {
        if let Some(task) = self.tasks.get_mut(id) {
            task.set_status(TaskStatus::Failed);
        }
    }

    /// Remove terminal tasks older than `max_age`.
    ///
    /// `Completed` tasks whose `created_at` is older than `now - max_age` are
    /// dropped.  `Pending` and `Running` tasks are never removed.  `Failed`
    /// tasks are retained for inspection unless `include_failed` is set.
    pub fn cleanup(&mut self, max_age: Duration, include_failed: bool) {
        let cutoff = Utc::now() - max_age;
        self.tasks.retain(|_, t| {
            let expired = t.created_at < cutoff;
            let removable = t.status == TaskStatus::Completed
                || (include_failed && t.status == TaskStatus::Failed);
            !(expired && removable)
        });
    }

    fn dependencies_satisfied(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|dep| {
            self.tasks
                .get(dep)
                .map(|d| d.status == TaskStatus::Completed)
                .unwrap_or(false)
        })
    }
}
