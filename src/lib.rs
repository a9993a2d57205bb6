// src/lib.rs

// Import the top-level `agentflow` module.
pub mod agentflow;

// Re-export the submodules at the crate root so callers don't have to
// navigate through the whole hierarchy.
pub use agentflow::adapter;
pub use agentflow::agent;
pub use agentflow::client_wrapper;
pub use agentflow::clients;
pub use agentflow::config;
pub use agentflow::event;
pub use agentflow::memory;
pub use agentflow::mode;
pub use agentflow::orchestrator;
pub use agentflow::queue;
pub use agentflow::rate_limiter;
pub use agentflow::redact;
pub use agentflow::task;

// Re-exporting key items for easier external access.
pub use agentflow::adapter::LlmAdapter;
pub use agentflow::client_wrapper::{ClientWrapper, Message, Role};
pub use agentflow::config::OrchestratorConfig;
pub use agentflow::event::{EventHandler, OrchestratorEvent};
pub use agentflow::memory::MemoryStore;
pub use agentflow::mode::AgentMode;
pub use agentflow::orchestrator::Orchestrator;
pub use agentflow::task::{Task, TaskPriority};
