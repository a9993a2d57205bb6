//! Orchestrator event system.
//!
//! Provides a callback-based observability layer for the orchestrator.
//! Implement [`EventHandler`] to receive real-time notifications about:
//!
//! - **Lifecycle**: orchestrator start and stop
//! - **Submission**: tasks accepted into the queue
//! - **Agents**: spawn, successful completion, failure
//! - **Tasks**: terminal completion of the underlying task
//!
//! The event set is closed, so events are a typed enum rather than
//! stringly-typed channels.  Handlers are shared as `Arc<dyn EventHandler>`
//! and registered via
//! [`Orchestrator::subscribe`](crate::agentflow::orchestrator::Orchestrator::subscribe);
//! subscribe before `start()` to guarantee delivery of every event.
//!
//! Per-agent ordering guarantees: `AgentSpawned` precedes the agent's
//! terminal event, and `AgentCompleted` precedes the matching
//! `TaskCompleted`.  No ordering holds across independent agents.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentflow::event::{EventHandler, OrchestratorEvent};
//! use async_trait::async_trait;
//!
//! struct Logger;
//!
//! #[async_trait]
//! impl EventHandler for Logger {
//!     async fn on_event(&self, event: &OrchestratorEvent) {
//!         match event {
//!             OrchestratorEvent::AgentCompleted { agent } => {
//!                 println!("{} finished: {:?}", agent.id, agent.result);
//!             }
//!             OrchestratorEvent::AgentFailed { agent, error } => {
//!                 println!("{} failed: {}", agent.id, error);
//!             }
//!             _ => {}
//!         }
//!     }
//! }
//! ```

use crate::agentflow::agent::AgentRecord;
use crate::agentflow::task::Task;
use async_trait::async_trait;

/// Events emitted by the [`Orchestrator`](crate::agentflow::orchestrator::Orchestrator).
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// The orchestrator transitioned to running.
    Started,

    /// The orchestrator finished its shutdown sequence.
    Stopped,

    /// A task passed validation and entered the queue.
    TaskAdded {
        /// The accepted task, as stored.
        task: Task,
    },

    /// An agent was created for a task and its execution launched.
    AgentSpawned {
        /// Snapshot of the agent record at spawn time (`Running`).
        agent: AgentRecord,
    },

    /// An agent's LLM call succeeded and its result was persisted.
    AgentCompleted {
        /// Snapshot of the terminal agent record (`result` populated).
        agent: AgentRecord,
    },

    /// An agent's LLM call failed; the error was persisted.
    ///
    /// The `error` text has already been scrubbed of probable secrets.
    AgentFailed {
        /// Snapshot of the terminal agent record (`error` populated).
        agent: AgentRecord,
        /// Redacted failure message.
        error: String,
    },

    /// The task backing a completed agent reached `Completed`.
    TaskCompleted {
        /// Id of the completed task.
        task_id: String,
    },
}

/// Trait for receiving orchestrator events.
///
/// The method has a **default no-op implementation**, so trivial handlers can
/// match only the events they care about.  The `Send + Sync` bound allows the
/// handler to be shared across tokio tasks via `Arc<dyn EventHandler>`; keep
/// any internal state behind appropriate synchronization.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called for every emitted event, in emission order per agent.
    async fn on_event(&self, _event: &OrchestratorEvent) {}
}
