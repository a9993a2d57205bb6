//! Dependency-aware, bounded-concurrency agent orchestration.
//!
//! The [`Orchestrator`] owns the task queue and the live agent map.  Callers
//! start it, subscribe handlers, and submit tasks; a scheduler tick — run on
//! `start`, on every accepted task, and on every agent terminal transition —
//! drains the queue into ephemeral agents while the active count stays under
//! the configured ceiling.  There is no polling timer in the hot path.
//!
//! Each spawned agent asynchronously retrieves mode-tagged context from the
//! [`MemoryStore`], calls the [`LlmAdapter`], writes its result or error back
//! to memory, updates its task, and re-ticks the scheduler.  Agent failures
//! are contained: they fail the owning task and the loop continues.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentflow::adapter::{AdapterConfig, LlmAdapter};
//! use agentflow::clients::http::HttpClient;
//! use agentflow::config::OrchestratorConfig;
//! use agentflow::mode::AgentMode;
//! use agentflow::orchestrator::Orchestrator;
//! use agentflow::task::{Task, TaskPriority};
//!
//! # async {
//! let client = Arc::new(HttpClient::new("api-key", "gemini-2.0-flash"));
//! let adapter = Arc::new(LlmAdapter::new(client, AdapterConfig::default()));
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default(), adapter)?;
//!
//! orchestrator.start().await?;
//! orchestrator
//!     .add_task(
//!         Task::new("t1", "Implement the parser", AgentMode::Coder)
//!             .with_priority(TaskPriority::High),
//!     )
//!     .await?;
//! // ... later
//! orchestrator.stop().await;
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! # };
//! ```

use crate::agentflow::adapter::LlmAdapter;
use crate::agentflow::agent::{build_prompt, AgentRecord};
use crate::agentflow::config::OrchestratorConfig;
use crate::agentflow::event::{EventHandler, OrchestratorEvent};
use crate::agentflow::memory::{EntryContent, EntryKind, MemoryStore, NewEntry};
use crate::agentflow::queue::TaskQueue;
use crate::agentflow::redact::redact_secrets;
use crate::agentflow::task::{validate_description, Task, ValidationError};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Errors surfaced by orchestrator lifecycle and submission calls.
#[derive(Debug)]
pub enum OrchestratorError {
    /// `start()` was called while already running.
    AlreadyRunning,
    /// `add_task()` was called outside the `Running` state.
    NotRunning,
    /// A task was rejected at the submission boundary.
    Validation(ValidationError),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::AlreadyRunning => write!(f, "Orchestrator is already running"),
            OrchestratorError::NotRunning => write!(f, "Orchestrator is not running"),
            OrchestratorError::Validation(err) => write!(f, "Validation failed: {}", err),
        }
    }
}

impl Error for OrchestratorError {}

impl From<ValidationError> for OrchestratorError {
    fn from(err: ValidationError) -> Self {
        OrchestratorError::Validation(err)
    }
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorStatus {
    /// True while in the `Running` state.
    pub is_running: bool,
    /// Agents currently in flight.
    pub active_agents: usize,
    /// Agents that reached `Completed` since start.
    pub completed_agents: usize,
    /// Agents that reached `Failed` since start.
    pub failed_agents: usize,
    /// Tasks waiting in the queue.
    pub pending_tasks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Stopped,
    Running,
    Stopping,
}

#[derive(Default)]
struct Counters {
    active: usize,
    completed: usize,
    failed: usize,
}

struct Inner {
    config: OrchestratorConfig,
    adapter: Arc<LlmAdapter>,
    memory: Arc<MemoryStore>,
    state: Mutex<Lifecycle>,
    queue: Mutex<TaskQueue>,
    agents: Mutex<HashMap<String, AgentRecord>>,
    counters: Mutex<Counters>,
    handlers: Mutex<Vec<Arc<dyn EventHandler>>>,
    inflight: Mutex<HashMap<String, JoinHandle<()>>>,
}

/// The orchestration engine.
///
/// Cheap to clone-share: all state lives behind one `Arc`.
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Build an orchestrator from a validated configuration and an adapter.
    ///
    /// The adapter is an explicit dependency — there is no ambient client.
    /// Fails with [`ValidationError::InvalidMaxAgents`] when the concurrency
    /// ceiling is outside `1..=20`.
    pub fn new(
        config: OrchestratorConfig,
        adapter: Arc<LlmAdapter>,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        let memory = Arc::new(MemoryStore::new(&config.memory_path, config.memory.clone()));
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                adapter,
                memory,
                state: Mutex::new(Lifecycle::Stopped),
                queue: Mutex::new(TaskQueue::new()),
                agents: Mutex::new(HashMap::new()),
                counters: Mutex::new(Counters::default()),
                handlers: Mutex::new(Vec::new()),
                inflight: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Register an event handler.
    ///
    /// Handlers registered before [`start`](Orchestrator::start) observe every
    /// event, including `Started`.
    pub async fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        self.inner.handlers.lock().await.push(handler);
    }

    /// Transition `Stopped → Running`.
    ///
    /// Initializes the memory store, probes adapter health (a failed probe is
    /// logged and ignored), emits [`OrchestratorEvent::Started`], and runs a
    /// scheduler tick.  Fails if already running.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        {
            let mut state = self.inner.state.lock().await;
            if *state != Lifecycle::Stopped {
                return Err(OrchestratorError::AlreadyRunning);
            }
            *state = Lifecycle::Running;
        }

        self.inner.memory.initialize().await;

        if !self.inner.adapter.check_health().await {
            log::warn!("LLM backend health check failed; starting anyway");
        }

        Inner::emit(&self.inner, OrchestratorEvent::Started).await;
        Inner::tick(&self.inner).await;
        Ok(())
    }

    /// Graceful shutdown.
    ///
    /// Refuses new submissions, waits for in-flight agents up to the
    /// configured deadline (agents exceeding it are detached; memory writes
    /// already in flight remain best-effort), flushes memory, and emits
    /// [`OrchestratorEvent::Stopped`].  A no-op when already stopped.
    pub async fn stop(&self) {
        {
            let mut state = self.inner.state.lock().await;
            match *state {
                Lifecycle::Stopped | Lifecycle::Stopping => return,
                Lifecycle::Running => *state = Lifecycle::Stopping,
            }
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut inflight = self.inner.inflight.lock().await;
            inflight.drain().map(|(_, handle)| handle).collect()
        };

        if !handles.is_empty() {
            let drain = futures_util::future::join_all(handles);
            if tokio::time::timeout(self.inner.config.stop_deadline, drain)
                .await
                .is_err()
            {
                log::warn!(
                    "stop deadline of {:?} elapsed with agents still in flight; detaching",
                    self.inner.config.stop_deadline
                );
            }
        }

        self.inner.memory.flush().await;

        *self.inner.state.lock().await = Lifecycle::Stopped;
        Inner::emit(&self.inner, OrchestratorEvent::Stopped).await;
    }

    /// Validate and enqueue a task.
    ///
    /// Only accepted while `Running`.  The description is sanitized by
    /// [`validate_description`]; the mode is already a member of the closed
    /// enum by construction.  Emits [`OrchestratorEvent::TaskAdded`] and runs
    /// a scheduler tick.
    pub async fn add_task(&self, task: Task) -> Result<(), OrchestratorError> {
        {
            let state = self.inner.state.lock().await;
            if *state != Lifecycle::Running {
                return Err(OrchestratorError::NotRunning);
            }
        }

        let mut task = task;
        task.description = validate_description(&task.description)?;

        self.inner.queue.lock().await.add(task.clone());
        Inner::emit(&self.inner, OrchestratorEvent::TaskAdded { task }).await;
        Inner::tick(&self.inner).await;
        Ok(())
    }

    /// Point-in-time snapshot of counters and queue depth.
    pub async fn get_status(&self) -> OrchestratorStatus {
        let is_running = *self.inner.state.lock().await == Lifecycle::Running;
        let counters = self.inner.counters.lock().await;
        let pending_tasks = self.inner.queue.lock().await.size();
        OrchestratorStatus {
            is_running,
            active_agents: counters.active,
            completed_agents: counters.completed,
            failed_agents: counters.failed,
            pending_tasks,
        }
    }

    /// Look up a live (or not-yet-pruned terminal) agent record.
    pub async fn get_agent(&self, id: &str) -> Option<AgentRecord> {
        self.inner.agents.lock().await.get(id).cloned()
    }

    /// Look up a task by id, any status.
    pub async fn get_task(&self, id: &str) -> Option<Task> {
        self.inner.queue.lock().await.get_by_id(id).cloned()
    }

    /// Snapshot of every task the queue has seen, all statuses.
    pub async fn get_all_tasks(&self) -> Vec<Task> {
        self.inner.queue.lock().await.get_all_tasks()
    }

    /// Drop aged-out terminal tasks from the queue.
    ///
    /// Removes `Completed` tasks older than `max_age`; also removes `Failed`
    /// ones when `cleanup_includes_failed` is configured.
    pub async fn cleanup_tasks(&self, max_age: chrono::Duration) {
        self.inner
            .queue
            .lock()
            .await
            .cleanup(max_age, self.inner.config.cleanup_includes_failed);
    }

    /// The shared memory store, for direct queries.
    pub fn memory(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.inner.memory)
    }

    /// Rate-limit window snapshots from the adapter, for status reporting.
    pub async fn rate_limit_status(
        &self,
    ) -> (
        crate::agentflow::rate_limiter::RateLimitStatus,
        crate::agentflow::rate_limiter::RateLimitStatus,
    ) {
        self.inner.adapter.rate_limit_status().await
    }
}

impl Inner {
    /// One scheduler pass: spawn agents while capacity and runnable tasks
    /// remain.  Claiming a task and reserving a concurrency slot happen in
    /// the same critical section, so `active` never exceeds `max_agents`.
    fn tick<'a>(
        inner: &'a Arc<Inner>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            loop {
                if *inner.state.lock().await != Lifecycle::Running {
                    return;
                }

                let task = {
                    let mut counters = inner.counters.lock().await;
                    if counters.active >= inner.config.max_agents {
                        return;
                    }
                    let mut queue = inner.queue.lock().await;
                    match queue.get_next() {
                        Some(task) => {
                            counters.active += 1;
                            task
                        }
                        None => return,
                    }
                };

                Inner::spawn_agent(inner, task).await;
            }
        })
    }

    /// Create the agent record, emit `AgentSpawned`, and launch the agent's
    /// execution without blocking the tick loop.
    async fn spawn_agent(inner: &Arc<Inner>, task: Task) {
        let record = AgentRecord::new(&task);
        let agent_id = record.id.clone();

        inner
            .agents
            .lock()
            .await
            .insert(agent_id.clone(), record.clone());

        log::info!(
            "spawning agent {} (mode {}) for task '{}'",
            agent_id,
            record.mode,
            task.id
        );
        Inner::emit(inner, OrchestratorEvent::AgentSpawned { agent: record }).await;

        let handle = tokio::spawn(Inner::run_agent(Arc::clone(inner), agent_id.clone(), task));

        let mut inflight = inner.inflight.lock().await;
        inflight.retain(|_, h| !h.is_finished());
        inflight.insert(agent_id, handle);
    }

    /// The agent's one in-flight operation: context retrieval, the LLM call,
    /// memory write, task + counter bookkeeping, events, and the follow-up
    /// tick.  Memory problems never fail the agent; agent problems never
    /// stop the scheduler.
    async fn run_agent(inner: Arc<Inner>, agent_id: String, task: Task) {
        let context = inner.memory.get_context(task.mode).await;
        let prompt = build_prompt(&context, &task.description);

        let outcome = if task.files.is_empty() {
            inner.adapter.execute(&prompt, task.mode).await
        } else {
            inner
                .adapter
                .execute_multimodal(&prompt, &task.files, task.mode)
                .await
        };

        match outcome {
            Ok(text) => {
                let record = {
                    let mut agents = inner.agents.lock().await;
                    let record = agents.get_mut(&agent_id).expect("agent record exists");
                    record.complete(text.clone());
                    record.clone()
                };

                inner
                    .memory
                    .store(NewEntry {
                        agent_id: agent_id.clone(),
                        kind: EntryKind::Result,
                        content: EntryContent::Text(text),
                        tags: vec![task.mode.as_str().to_string(), "completed".to_string()],
                    })
                    .await;

                inner.queue.lock().await.mark_completed(&task.id);
                {
                    let mut counters = inner.counters.lock().await;
                    counters.completed += 1;
                }

                Inner::emit(&inner, OrchestratorEvent::AgentCompleted { agent: record }).await;
                Inner::emit(
                    &inner,
                    OrchestratorEvent::TaskCompleted {
                        task_id: task.id.clone(),
                    },
                )
                .await;
            }
            Err(err) => {
                let message = redact_secrets(&err.to_string());
                log::error!("agent {} failed: {}", agent_id, message);

                let record = {
                    let mut agents = inner.agents.lock().await;
                    let record = agents.get_mut(&agent_id).expect("agent record exists");
                    record.fail(message.clone());
                    record.clone()
                };

                inner
                    .memory
                    .store(NewEntry {
                        agent_id: agent_id.clone(),
                        kind: EntryKind::Error,
                        content: EntryContent::Text(message.clone()),
                        tags: vec![task.mode.as_str().to_string(), "failed".to_string()],
                    })
                    .await;

                inner.queue.lock().await.mark_failed(&task.id);
                {
                    let mut counters = inner.counters.lock().await;
                    counters.failed += 1;
                }

                Inner::emit(
                    &inner,
                    OrchestratorEvent::AgentFailed {
                        agent: record,
                        error: message,
                    },
                )
                .await;
            }
        }

        {
            let mut counters = inner.counters.lock().await;
            counters.active -= 1;
        }

        Inner::schedule_agent_removal(&inner, agent_id);
        Inner::tick(&inner).await;
    }

    /// Prune the terminal record after the grace window, off the critical
    /// path.  Counters are independent of the map, so reporting survives the
    /// prune.
    fn schedule_agent_removal(inner: &Arc<Inner>, agent_id: String) {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.config.agent_grace).await;
            inner.agents.lock().await.remove(&agent_id);
        });
    }

    /// Fan an event out to every subscribed handler, in subscription order.
    async fn emit(inner: &Arc<Inner>, event: OrchestratorEvent) {
        let handlers: Vec<Arc<dyn EventHandler>> =
            inner.handlers.lock().await.iter().cloned().collect();
        for handler in handlers {
            handler.on_event(&event).await;
        }
    }
}
