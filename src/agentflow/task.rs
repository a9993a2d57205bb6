//! Task definitions and submission-boundary validation.
//!
//! A [`Task`] is a user-submitted work item: a natural-language description
//! tagged with an [`AgentMode`], a [`TaskPriority`], and an optional set of
//! predecessor task ids.  Tasks are validated once at the submission boundary
//! ([`validate_description`]) and thereafter mutated only by the scheduler
//! (status transitions).
//!
//! # Example
//!
//! ```rust
//! use agentflow::mode::AgentMode;
//! use agentflow::task::{Task, TaskPriority, TaskStatus};
//!
//! let task = Task::new("t1", "Design the storage layer", AgentMode::Architect)
//!     .with_priority(TaskPriority::High)
//!     .with_dependencies(vec!["t0".into()]);
//!
//! assert_eq!(task.status, TaskStatus::Pending);
//! assert_eq!(task.priority.rank(), 3);
//! ```

use crate::agentflow::mode::AgentMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest accepted task description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 10_000;

/// Substrings that reject a description outright (case-insensitive).
const FORBIDDEN_PATTERNS: [&str; 5] = [
    "<script",
    "javascript:",
    "data:text/html",
    "eval(",
    "function(",
];

/// Scheduling priority of a task.  Higher rank is selected first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Rank 3.
    High,
    /// Rank 2.
    Medium,
    /// Rank 1.
    Low,
}

impl TaskPriority {
    /// Numeric rank used for queue ordering (`high=3, medium=2, low=1`).
    pub fn rank(&self) -> u8 {
        match self {
            TaskPriority::High => 3,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 1,
        }
    }
}

/// Lifecycle state of a task.
///
/// Transitions are `Pending → Running → (Completed | Failed)` and are driven
/// exclusively by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in the queue.
    Pending,
    /// Handed to an agent.
    Running,
    /// Agent finished successfully.
    Completed,
    /// Agent finished with an error.
    Failed,
}

/// A binary file attached to a task for multimodal execution.
#[derive(Debug, Clone)]
pub struct TaskFile {
    /// MIME type of the payload, e.g. `"image/png"`.
    pub mime_type: String,
    /// Raw file contents.  Size is checked against the adapter's cap before
    /// any call is made.
    pub data: Vec<u8>,
}

/// A user-submitted work item.
#[derive(Debug, Clone)]
pub struct Task {
    /// Stable identifier, unique within the queue.  Never changes.
    pub id: String,
    /// Natural-language description of the work (1–10 000 chars, sanitized
    /// at the submission boundary).
    pub description: String,
    /// Mode selecting the system prompt and temperature for the agent.
    pub mode: AgentMode,
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// Ids of tasks that must reach `Completed` before this one is runnable.
    /// Immutable after insertion.
    pub dependencies: Vec<String>,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Files attached for multimodal execution.
    pub files: Vec<TaskFile>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task last changed state.  Always `>= created_at`.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending task with medium priority and no dependencies.
    pub fn new(id: impl Into<String>, description: impl Into<String>, mode: AgentMode) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            description: description.into(),
            mode,
            priority: TaskPriority::Medium,
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            files: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the priority (builder pattern).
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the predecessor ids (builder pattern).
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Attach files for multimodal execution (builder pattern).
    pub fn with_files(mut self, files: Vec<TaskFile>) -> Self {
        self.files = files;
        self
    }

    /// Transition to a new status, stamping `updated_at`.
    pub(crate) fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Rejection reasons at the task submission boundary.
///
/// Surfaced to the caller; never stored in memory or the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Description was empty after trimming.
    EmptyDescription,
    /// Description exceeded [`MAX_DESCRIPTION_CHARS`]; carries the length seen.
    DescriptionTooLong(usize),
    /// Description contained one of the rejected patterns.
    ForbiddenPattern(&'static str),
    /// Mode name did not parse into the closed [`AgentMode`] set.
    UnknownMode(String),
    /// `max_agents` outside the accepted `1..=20` range.
    InvalidMaxAgents(usize),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyDescription => write!(f, "Task description is empty"),
            ValidationError::DescriptionTooLong(len) => write!(
                f,
                "Task description is {} chars, maximum is {}",
                len, MAX_DESCRIPTION_CHARS
            ),
            ValidationError::ForbiddenPattern(p) => {
                write!(f, "Task description contains forbidden pattern '{}'", p)
            }
            ValidationError::UnknownMode(m) => write!(f, "Unknown agent mode: {}", m),
            ValidationError::InvalidMaxAgents(n) => {
                write!(f, "max_agents must be between 1 and 20, got {}", n)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate and sanitize a task description.
///
/// Trims surrounding whitespace, rejects empty and over-long input, and
/// rejects descriptions containing script-injection patterns.  Returns the
/// trimmed description on success.
pub fn validate_description(description: &str) -> Result<String, ValidationError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    let len = trimmed.chars().count();
    if len > MAX_DESCRIPTION_CHARS {
        return Err(ValidationError::DescriptionTooLong(len));
    }

    let lowered = trimmed.to_lowercase();
    for pattern in FORBIDDEN_PATTERNS {
        if lowered.contains(pattern) {
            return Err(ValidationError::ForbiddenPattern(pattern));
        }
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_boundaries() {
        assert_eq!(
            validate_description(""),
            Err(ValidationError::EmptyDescription)
        );
        assert_eq!(validate_description("x").unwrap(), "x");

        let at_cap = "a".repeat(MAX_DESCRIPTION_CHARS);
        assert_eq!(validate_description(&at_cap).unwrap().len(), MAX_DESCRIPTION_CHARS);

        let over_cap = "a".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert_eq!(
            validate_description(&over_cap),
            Err(ValidationError::DescriptionTooLong(MAX_DESCRIPTION_CHARS + 1))
        );
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(
            validate_description("   \n\t  "),
            Err(ValidationError::EmptyDescription)
        );
    }

    #[test]
    fn injection_patterns_are_rejected_case_insensitively() {
        for bad in [
            "please <SCRIPT>alert(1)</script>",
            "open javascript:void(0)",
            "embed data:text/HTML,hi",
            "run eval(payload)",
            "call function(x) { }",
        ] {
            assert!(validate_description(bad).is_err(), "accepted: {}", bad);
        }
    }

    #[test]
    fn status_transition_stamps_updated_at() {
        let mut task = Task::new("t", "work", AgentMode::Coder);
        let created = task.created_at;
        task.set_status(TaskStatus::Running);
        assert!(task.updated_at >= created);
        assert_eq!(task.status, TaskStatus::Running);
    }
}
