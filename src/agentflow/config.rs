//! Orchestrator configuration.
//!
//! [`OrchestratorConfig`] is a plain record the caller constructs and hands
//! to [`Orchestrator::new`](crate::agentflow::orchestrator::Orchestrator::new)
//! together with the adapter — there is no ambient client lookup and no
//! config-file parsing here.
//!
//! # Example
//!
//! ```rust
//! use agentflow::config::OrchestratorConfig;
//! use std::path::PathBuf;
//!
//! let config = OrchestratorConfig {
//!     max_agents: 4,
//!     memory_path: PathBuf::from("/var/data/agent_memory.json"),
//!     ..OrchestratorConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use crate::agentflow::memory::MemoryConfig;
use crate::agentflow::task::ValidationError;
use std::path::PathBuf;
use std::time::Duration;

/// Accepted range for `max_agents`.
const MAX_AGENTS_RANGE: std::ops::RangeInclusive<usize> = 1..=20;

/// Configuration record for an [`Orchestrator`](crate::agentflow::orchestrator::Orchestrator).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Concurrency ceiling: maximum simultaneously running agents.
    /// Valid range 1..=20.
    pub max_agents: usize,
    /// Path of the persisted memory JSON file.
    pub memory_path: PathBuf,
    /// How long a terminal agent record is retained for reporting before the
    /// live map prunes it.
    pub agent_grace: Duration,
    /// Upper bound `stop()` waits for in-flight agents before detaching them.
    pub stop_deadline: Duration,
    /// When set, queue cleanup also removes aged-out `Failed` tasks instead
    /// of only `Completed` ones.
    pub cleanup_includes_failed: bool,
    /// Memory retention and retrieval settings.
    pub memory: MemoryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_agents: 10,
            memory_path: PathBuf::from("agent_memory.json"),
            agent_grace: Duration::from_secs(300),
            stop_deadline: Duration::from_secs(120),
            cleanup_includes_failed: false,
            memory: MemoryConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Check the record for out-of-range values.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !MAX_AGENTS_RANGE.contains(&self.max_agents) {
            return Err(ValidationError::InvalidMaxAgents(self.max_agents));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_agents_boundaries() {
        let mut config = OrchestratorConfig::default();

        config.max_agents = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidMaxAgents(0)));

        config.max_agents = 1;
        assert!(config.validate().is_ok());

        config.max_agents = 20;
        assert!(config.validate().is_ok());

        config.max_agents = 21;
        assert_eq!(config.validate(), Err(ValidationError::InvalidMaxAgents(21)));
    }
}
