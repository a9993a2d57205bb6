//! Ephemeral agent records.
//!
//! An agent is a value, not a long-lived object: an [`AgentRecord`] held in
//! the orchestrator's map plus one in-flight LLM call.  The record is created
//! in `Running` state attached to exactly one task, transitions to a terminal
//! state exactly once, and is pruned after a grace window so the live map
//! stays bounded.

use crate::agentflow::memory::ContextSummary;
use crate::agentflow::mode::AgentMode;
use crate::agentflow::task::Task;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lifecycle state of an agent.
///
/// `Pending` is transient (record construction only); observers see agents in
/// `Running` or a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// Being constructed.
    Pending,
    /// LLM call in flight.
    Running,
    /// Finished successfully; `result` is populated.
    Completed,
    /// Finished with an error; `error` is populated.
    Failed,
}

/// A one-shot execution record coupling one task to one LLM invocation.
#[derive(Debug, Clone)]
pub struct AgentRecord {
    /// Unique agent id.
    pub id: String,
    /// Mode inherited from the task.
    pub mode: AgentMode,
    /// Id of the task this agent executes.
    pub task_id: String,
    /// Description of the task this agent executes.
    pub task: String,
    /// Current lifecycle state.
    pub status: AgentStatus,
    /// When the agent was spawned.
    pub start_time: DateTime<Utc>,
    /// When the agent reached a terminal state.  Set iff terminal.
    pub end_time: Option<DateTime<Utc>>,
    /// Response text.  Populated iff `Completed`.
    pub result: Option<String>,
    /// Failure message.  Populated iff `Failed`.
    pub error: Option<String>,
}

impl AgentRecord {
    /// Create a running record for a task.
    pub fn new(task: &Task) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mode: task.mode,
            task_id: task.id.clone(),
            task: task.description.clone(),
            status: AgentStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            result: None,
            error: None,
        }
    }

    /// Terminal success transition.
    pub(crate) fn complete(&mut self, result: String) {
        self.status = AgentStatus::Completed;
        self.result = Some(result);
        self.end_time = Some(Utc::now());
    }

    /// Terminal failure transition.
    pub(crate) fn fail(&mut self, error: String) {
        self.status = AgentStatus::Failed;
        self.error = Some(error);
        self.end_time = Some(Utc::now());
    }

    /// True once the agent reached `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, AgentStatus::Completed | AgentStatus::Failed)
    }
}

/// Assemble the user-turn prompt from retrieved context and the task text.
///
/// The mode's system prompt travels separately (the adapter attaches it);
/// this builds the context block and task section an agent sends as its user
/// message.
pub fn build_prompt(context: &[ContextSummary], description: &str) -> String {
    if context.is_empty() {
        return description.to_string();
    }

    let mut prompt = String::from("=== RECENT CONTEXT ===\n");
    for summary in context {
        prompt.push_str(&format!("[{:?}] {}\n", summary.kind, summary.summary));
    }
    prompt.push_str("=== END RECENT CONTEXT ===\n\n## Task\n");
    prompt.push_str(description);
    prompt
}
