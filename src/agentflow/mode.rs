//! The closed set of agent modes.
//!
//! Every task carries exactly one [`AgentMode`].  The mode selects the system
//! prompt and the sampling temperature used for the LLM call, and doubles as
//! the tag under which the agent's output is filed in the
//! [`MemoryStore`](crate::agentflow::memory::MemoryStore) so later agents of
//! the same mode can retrieve it as context.
//!
//! Modes are a tagged enum, not free strings — an unknown mode name is a
//! validation failure at the submission boundary, never a runtime surprise.
//!
//! # Example
//!
//! ```rust
//! use agentflow::mode::AgentMode;
//!
//! let mode: AgentMode = "coder".parse().unwrap();
//! assert_eq!(mode, AgentMode::Coder);
//! assert_eq!(mode.as_str(), "coder");
//! assert!((mode.temperature() - 0.3).abs() < f32::EPSILON);
//!
//! assert!("wizard".parse::<AgentMode>().is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the enumerated agent modes.
///
/// The set is closed: 17 variants, each with a stable lowercase name used in
/// task submissions and memory tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// System design and high-level architecture.
    Architect,
    /// Code generation and implementation work.
    Coder,
    /// Test design and test implementation.
    Tester,
    /// Root-cause analysis of defects.
    Debugger,
    /// Security review and hardening.
    Security,
    /// Documentation writing.
    Documentation,
    /// Cross-component integration work.
    Integrator,
    /// Runtime monitoring and diagnostics.
    Monitor,
    /// Performance analysis and optimization.
    Optimizer,
    /// Open-ended question answering.
    Ask,
    /// Build, deployment, and infrastructure work.
    Devops,
    /// Step-by-step tutorial authoring.
    Tutorial,
    /// Schema and query design.
    Database,
    /// Requirements and specification writing.
    Specification,
    /// Tool-protocol integration work.
    Mcp,
    /// Coordination of other agents' outputs.
    Orchestrator,
    /// UI and interaction design.
    Designer,
}

/// Error returned when parsing an unknown mode name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown agent mode: {}", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl AgentMode {
    /// All modes, in declaration order.
    pub const ALL: [AgentMode; 17] = [
        AgentMode::Architect,
        AgentMode::Coder,
        AgentMode::Tester,
        AgentMode::Debugger,
        AgentMode::Security,
        AgentMode::Documentation,
        AgentMode::Integrator,
        AgentMode::Monitor,
        AgentMode::Optimizer,
        AgentMode::Ask,
        AgentMode::Devops,
        AgentMode::Tutorial,
        AgentMode::Database,
        AgentMode::Specification,
        AgentMode::Mcp,
        AgentMode::Orchestrator,
        AgentMode::Designer,
    ];

    /// The stable lowercase name of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Architect => "architect",
            AgentMode::Coder => "coder",
            AgentMode::Tester => "tester",
            AgentMode::Debugger => "debugger",
            AgentMode::Security => "security",
            AgentMode::Documentation => "documentation",
            AgentMode::Integrator => "integrator",
            AgentMode::Monitor => "monitor",
            AgentMode::Optimizer => "optimizer",
            AgentMode::Ask => "ask",
            AgentMode::Devops => "devops",
            AgentMode::Tutorial => "tutorial",
            AgentMode::Database => "database",
            AgentMode::Specification => "specification",
            AgentMode::Mcp => "mcp",
            AgentMode::Orchestrator => "orchestrator",
            AgentMode::Designer => "designer",
        }
    }

    /// Sampling temperature for LLM calls made on behalf of this mode.
    ///
    /// Precision-oriented modes run cold, creative modes run warm; modes
    /// without a tuned value share the 0.5 default.
    pub fn temperature(&self) -> f32 {
        match self {
            AgentMode::Architect => 0.7,
            AgentMode::Coder => 0.3,
            AgentMode::Tester => 0.2,
            AgentMode::Debugger => 0.1,
            AgentMode::Security => 0.2,
            AgentMode::Documentation => 0.5,
            AgentMode::Designer => 0.8,
            AgentMode::Ask => 0.8,
            _ => 0.5,
        }
    }

    /// Built-in one-line system prompt for this mode.
    ///
    /// Full prompt templates are an application concern; these built-ins keep
    /// the orchestrator usable without one.
    pub fn system_prompt(&self) -> &'static str {
        match self {
            AgentMode::Architect => {
                "You are a software architect. Design clear, maintainable system structures."
            }
            AgentMode::Coder => {
                "You are an expert programmer. Write correct, idiomatic, well-structured code."
            }
            AgentMode::Tester => {
                "You are a test engineer. Design thorough tests that expose defects."
            }
            AgentMode::Debugger => {
                "You are a debugger. Find the root cause before proposing a fix."
            }
            AgentMode::Security => {
                "You are a security analyst. Identify vulnerabilities and propose mitigations."
            }
            AgentMode::Documentation => {
                "You are a technical writer. Explain precisely and concisely."
            }
            AgentMode::Integrator => {
                "You are an integration engineer. Make independently built parts work together."
            }
            AgentMode::Monitor => {
                "You are a monitoring engineer. Observe, measure, and report system behaviour."
            }
            AgentMode::Optimizer => {
                "You are a performance engineer. Measure first, then optimize the bottleneck."
            }
            AgentMode::Ask => "You are a helpful assistant. Answer the question directly.",
            AgentMode::Devops => {
                "You are a DevOps engineer. Automate builds, deployments, and operations."
            }
            AgentMode::Tutorial => {
                "You are a tutor. Teach step by step, checking understanding as you go."
            }
            AgentMode::Database => {
                "You are a database engineer. Design sound schemas and efficient queries."
            }
            AgentMode::Specification => {
                "You are a requirements analyst. Write unambiguous, testable specifications."
            }
            AgentMode::Mcp => {
                "You are a tool-protocol engineer. Wire external tools to agents cleanly."
            }
            AgentMode::Orchestrator => {
                "You are a coordinator. Decompose work and reconcile the results."
            }
            AgentMode::Designer => {
                "You are a product designer. Shape interfaces people understand at a glance."
            }
        }
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        AgentMode::ALL
            .iter()
            .find(|m| m.as_str() == lowered)
            .copied()
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mode_round_trips_through_its_name() {
        for mode in AgentMode::ALL {
            let parsed: AgentMode = mode.as_str().parse().unwrap();
            assert_eq!(parsed, mode);
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_trimmed() {
        assert_eq!(" Coder ".parse::<AgentMode>().unwrap(), AgentMode::Coder);
        assert_eq!("DEBUGGER".parse::<AgentMode>().unwrap(), AgentMode::Debugger);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!("wizard".parse::<AgentMode>().is_err());
        assert!("".parse::<AgentMode>().is_err());
    }

    #[test]
    fn temperature_table_matches_tuned_modes() {
        assert_eq!(AgentMode::Debugger.temperature(), 0.1);
        assert_eq!(AgentMode::Designer.temperature(), 0.8);
        assert_eq!(AgentMode::Devops.temperature(), 0.5); // default tier
    }

    #[test]
    fn mode_serializes_as_lowercase_string() {
        let json = serde_json::to_string(&AgentMode::Architect).unwrap();
        assert_eq!(json, "\"architect\"");
    }
}
