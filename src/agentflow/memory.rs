//! Persistent, searchable agent memory.
//!
//! [`MemoryStore`] is an append-mostly log of agent outputs keyed by agent id,
//! mirrored to a single JSON document on disk.  Entries are content-addressed
//! (a SHA-256-derived id) and immutable once written; the store assigns each
//! one a strictly increasing timestamp so insertion order is recoverable from
//! the persisted file alone.
//!
//! Writes are crash-tolerant rather than transactional: every mutation marks
//! the store dirty and schedules a debounced asynchronous flush, and a failed
//! flush is logged and retried on the next one.  A malformed or missing file
//! at startup never raises — the store just begins empty.
//!
//! # Disk format
//!
//! One JSON object, keys are agent ids, values are arrays of entries:
//!
//! ```text
//! {
//!   "agent-1": [
//!     {"id":"9f2c…","agent_id":"agent-1","timestamp":"2025-07-01T12:00:00Z",
//!      "type":"result","content":"Done","tags":["coder","completed"]}
//!   ]
//! }
//! ```
//!
//! Timestamps are ISO-8601 strings and round-trip through
//! [`initialize`](MemoryStore::initialize).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentflow::memory::{EntryContent, EntryKind, MemoryConfig, MemoryStore, NewEntry};
//!
//! # async {
//! let store = Arc::new(MemoryStore::new("memory.json", MemoryConfig::default()));
//! store.initialize().await;
//!
//! store
//!     .store(NewEntry {
//!         agent_id: "agent-1".into(),
//!         kind: EntryKind::Result,
//!         content: EntryContent::Text("Persistent data".into()),
//!         tags: vec!["coder".into(), "completed".into()],
//!     })
//!     .await;
//!
//! let hits = store.search("persistent", None).await;
//! assert_eq!(hits.len(), 1);
//! # };
//! ```

use crate::agentflow::mode::AgentMode;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Retention and retrieval knobs for a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Soft cap on the total entry count across all agents.
    pub soft_max_entries: usize,
    /// Entries older than this are evicted.
    pub max_age: Duration,
    /// Debounce interval between a mutation and its asynchronous flush.
    pub auto_flush: std::time::Duration,
    /// Maximum number of summaries returned by [`MemoryStore::get_context`].
    pub context_limit: usize,
    /// Character budget for each context summary before the `...` suffix.
    pub summary_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            soft_max_entries: 1_000,
            max_age: Duration::days(7),
            auto_flush: std::time::Duration::from_secs(5),
            context_limit: 10,
            summary_chars: 200,
        }
    }
}

/// Classification of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A fact worth keeping around.
    Knowledge,
    /// The output of a successfully completed agent.
    Result,
    /// The failure message of a failed agent.
    Error,
    /// Supporting material injected for later retrieval.
    Context,
}

/// Entry payload: free text or a structured JSON value.
///
/// The tagged sum keeps heterogeneous content uniform for search and summary
/// truncation — both operate on [`EntryContent::render`], and `Structured`
/// values render through `serde_json`'s stable serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryContent {
    /// Plain text.
    Text(String),
    /// An arbitrary JSON value.
    Structured(serde_json::Value),
}

impl EntryContent {
    /// Stringify the content for search and summarization.
    pub fn render(&self) -> String {
        match self {
            EntryContent::Text(s) => s.clone(),
            EntryContent::Structured(v) => {
                serde_json::to_string(v).unwrap_or_else(|_| v.to_string())
            }
        }
    }
}

/// An immutable record of something an agent produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Content-addressed unique id.
    pub id: String,
    /// The agent that produced this entry.
    pub agent_id: String,
    /// Store-assigned timestamp, strictly increasing across the whole store.
    pub timestamp: DateTime<Utc>,
    /// Classification of the entry.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// The payload.
    pub content: EntryContent,
    /// Retrieval tags, e.g. the mode name plus `completed` / `failed`.
    pub tags: Vec<String>,
}

/// The caller-supplied part of a new entry; the store fills in id and timestamp.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// The agent the entry belongs to.
    pub agent_id: String,
    /// Classification of the entry.
    pub kind: EntryKind,
    /// The payload.
    pub content: EntryContent,
    /// Retrieval tags.
    pub tags: Vec<String>,
}

/// A truncated view of an entry, as handed to agents assembling prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSummary {
    /// Classification of the summarized entry.
    pub kind: EntryKind,
    /// Stringified content, truncated with an `...` suffix when over budget.
    pub summary: String,
}

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, Vec<MemoryEntry>>,
    last_timestamp: Option<DateTime<Utc>>,
    dirty: bool,
    flush_scheduled: bool,
}

impl MemoryInner {
    fn total_entries(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// Disk-mirrored map of per-agent memory entries.
///
/// Shared as `Arc<MemoryStore>`; all mutation happens inside one internal
/// lock, so concurrent stores from many agents each produce a distinct entry.
pub struct MemoryStore {
    path: PathBuf,
    config: MemoryConfig,
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    /// Create a store backed by the JSON file at `path`.
    ///
    /// No I/O happens until [`initialize`](MemoryStore::initialize) or the
    /// first flush.
    pub fn new(path: impl AsRef<Path>, config: MemoryConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config,
            inner: Arc::new(Mutex::new(MemoryInner::default())),
        }
    }

    /// Load persisted entries from disk.  Idempotent, never raises.
    ///
    /// A missing file leaves the map empty (creation is deferred to the first
    /// flush).  A file that exists but fails to parse is logged and treated
    /// as empty.
    pub async fn initialize(&self) {
        let mut inner = self.inner.lock().await;

        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(_) => return,
        };

        match serde_json::from_str::<HashMap<String, Vec<MemoryEntry>>>(&raw) {
            Ok(entries) => {
                inner.last_timestamp = entries
                    .values()
                    .flatten()
                    .map(|e| e.timestamp)
                    .max();
                inner.entries = entries;
            }
            Err(err) => {
                log::warn!(
                    "memory file {} is malformed, starting empty: {}",
                    self.path.display(),
                    err
                );
            }
        }
    }

    /// Append a new entry and return it.
    ///
    /// The store assigns a strictly increasing timestamp and a
    /// content-addressed id inside its critical section, schedules a debounced
    /// flush, and evicts if the retention caps are exceeded.  Purely
    /// in-memory: this never fails (flush failures are handled later, by the
    /// flush itself).
    pub async fn store(&self, new: NewEntry) -> MemoryEntry {
        let entry = {
            let mut inner = self.inner.lock().await;

            let timestamp = Self::next_timestamp(&mut inner);
            let entry = MemoryEntry {
                id: entry_id(&new.agent_id, &timestamp, &new.content.render()),
                agent_id: new.agent_id,
                timestamp,
                kind: new.kind,
                content: new.content,
                tags: new.tags,
            };

            inner
                .entries
                .entry(entry.agent_id.clone())
                .or_default()
                .push(entry.clone());
            inner.dirty = true;

            self.evict_locked(&mut inner);
            entry
        };

        self.schedule_flush().await;
        entry
    }

    /// Retrieve recent summaries for a mode.
    ///
    /// Entries tagged with the mode name, newest first, at most
    /// `context_limit`.  Summaries are the stringified content truncated to
    /// `summary_chars` with an `...` suffix when truncated.  Returns an empty
    /// vector on no match.
    pub async fn get_context(&self, mode: AgentMode) -> Vec<ContextSummary> {
        let inner = self.inner.lock().await;
        let tag = mode.as_str();

        let mut matches: Vec<&MemoryEntry> = inner
            .entries
            .values()
            .flatten()
            .filter(|e| e.tags.iter().any(|t| t == tag))
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        matches
            .into_iter()
            .take(self.config.context_limit)
            .map(|e| ContextSummary {
                kind: e.kind,
                summary: summarize(&e.content.render(), self.config.summary_chars),
            })
            .collect()
    }

    /// Search entries by case-insensitive substring over stringified content.
    ///
    /// When `tags` is provided, an entry must share at least one tag with it.
    /// Results come back in insertion order.  An empty query matches nothing.
    pub async fn search(&self, query: &str, tags: Option<&[String]>) -> Vec<MemoryEntry> {
        if query.is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();

        let inner = self.inner.lock().await;
        let mut matches: Vec<MemoryEntry> = inner
            .entries
            .values()
            .flatten()
            .filter(|e| e.content.render().to_lowercase().contains(&needle))
            .filter(|e| match tags {
                Some(wanted) => e.tags.iter().any(|t| wanted.contains(t)),
                None => true,
            })
            .cloned()
            .collect();

        // Store-assigned timestamps are strictly increasing, so this is
        // insertion order even across agents and across reloads.
        matches.sort_by_key(|e| e.timestamp);
        matches
    }

    /// Write the whole map to disk as one JSON document.
    ///
    /// On failure the error is logged and the in-memory state stays dirty so
    /// the next flush retries.
    pub async fn flush(&self) {
        Self::flush_to_disk(&self.path, &self.inner).await;
    }

    /// The shared flush body, callable from both [`flush`](MemoryStore::flush)
    /// and the detached debounce task.
    async fn flush_to_disk(path: &Path, inner: &Mutex<MemoryInner>) {
        let (snapshot, was_dirty) = {
            let inner = inner.lock().await;
            (serde_json::to_string_pretty(&inner.entries), inner.dirty)
        };

        if !was_dirty {
            return;
        }

        let serialized = match snapshot {
            Ok(s) => s,
            Err(err) => {
                log::error!("memory serialization failed: {}", err);
                return;
            }
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(err) = tokio::fs::create_dir_all(parent).await {
                    log::error!("memory flush failed creating {}: {}", parent.display(), err);
                    return;
                }
            }
        }

        match tokio::fs::write(path, serialized).await {
            Ok(()) => {
                inner.lock().await.dirty = false;
            }
            Err(err) => {
                log::error!(
                    "memory flush to {} failed, retaining state: {}",
                    path.display(),
                    err
                );
            }
        }
    }

    /// Total entry count across all agents.
    pub async fn total_entries(&self) -> usize {
        self.inner.lock().await.total_entries()
    }

    /// Schedule a debounced background flush if none is pending.
    async fn schedule_flush(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.flush_scheduled {
                return;
            }
            inner.flush_scheduled = true;
        }

        let inner = Arc::clone(&self.inner);
        let path = self.path.clone();
        let debounce = self.config.auto_flush;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            inner.lock().await.flush_scheduled = false;
            Self::flush_to_disk(&path, &inner).await;
        });
    }

    /// Evict by age, then oldest-first down to the soft count cap.
    fn evict_locked(&self, inner: &mut MemoryInner) {
        let cutoff = Utc::now() - self.config.max_age;
        for list in inner.entries.values_mut() {
            list.retain(|e| e.timestamp >= cutoff);
        }

        while inner.total_entries() > self.config.soft_max_entries {
            let oldest_agent = inner
                .entries
                .iter()
                .filter_map(|(agent, list)| list.first().map(|e| (agent.clone(), e.timestamp)))
                .min_by_key(|(_, ts)| *ts)
                .map(|(agent, _)| agent);

            match oldest_agent {
                Some(agent) => {
                    if let Some(list) = inner.entries.get_mut(&agent) {
                        list.remove(0);
                    }
                }
                None => break,
            }
        }

        inner.entries.retain(|_, list| !list.is_empty());
    }

    fn next_timestamp(inner: &mut MemoryInner) -> DateTime<Utc> {
        let now = Utc::now();
        let assigned = match inner.last_timestamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        inner.last_timestamp = Some(assigned);
        assigned
    }
}

/// Truncate a rendered content string to the summary budget.
fn summarize(rendered: &str, budget: usize) -> String {
    if rendered.chars().count() <= budget {
        return rendered.to_string();
    }
    let mut summary: String = rendered.chars().take(budget).collect();
    summary.push_str("...");
    summary
}

/// Derive a content-addressed entry id.
///
/// SHA-256 over `agent_id|timestamp|content`, truncated to 16 hex chars.
/// Timestamps are unique within a store, so ids are too.
fn entry_id(agent_id: &str, timestamp: &DateTime<Utc>, rendered: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(agent_id.as_bytes());
    hasher.update(b"|");
    hasher.update(timestamp.to_rfc3339().as_bytes());
    hasher.update(b"|");
    hasher.update(rendered.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
