//! Memory access policy engine.
//!
//! Static permission tables with wildcard fallback. Loaded once at
//! construction and never mutated at runtime.

use chorus_core::{MemoryAccessLevel, MemoryCategory, MemoryOperation, MemoryScope, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Fallback entry applied to any agent not explicitly listed.
pub const WILDCARD_AGENT: &str = "*";

/// Access levels granted to one agent, per memory category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentGrant {
    /// Agent name, or `"*"` for the fallback entry
    pub agent: String,
    /// Access level per category; categories not listed resolve to no access
    pub levels: Vec<(MemoryCategory, MemoryAccessLevel)>,
}

/// Immutable access policy injected into the memory access manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Per-agent category grants, with a `"*"` fallback entry
    pub grants: Vec<AgentGrant>,
    /// Per-agent temporal scope, with a `"*"` fallback entry
    pub scopes: Vec<(String, MemoryScope)>,
}

impl AccessPolicy {
    /// Build the stock access policy.
    pub fn default_policy() -> Self {
        use MemoryAccessLevel::{Admin, None as NoAccess, Read, Write};
        use MemoryCategory::*;

        Self {
            grants: vec![
                grant(
                    "EchoMind",
                    &[
                        (General, Write),
                        (Emotional, Write),
                        (Personal, Read),
                        (Medical, NoAccess),
                        (Therapeutic, Read),
                        (System, Read),
                        (Session, Write),
                    ],
                ),
                grant(
                    "Therapist",
                    &[
                        (General, Write),
                        (Emotional, Write),
                        (Personal, Read),
                        (Medical, Read),
                        (Therapeutic, Write),
                        (System, Read),
                        (Session, Write),
                    ],
                ),
                grant(
                    "Bridge",
                    &[
                        (General, Read),
                        (Emotional, Read),
                        (Personal, Read),
                        (Medical, NoAccess),
                        (Therapeutic, NoAccess),
                        (System, Read),
                        (Session, Write),
                    ],
                ),
                grant(
                    "MemoryService",
                    &[
                        (General, Admin),
                        (Emotional, Admin),
                        (Personal, Admin),
                        (Medical, Admin),
                        (Therapeutic, Admin),
                        (System, Admin),
                        (Session, Admin),
                    ],
                ),
                grant(
                    WILDCARD_AGENT,
                    &[
                        (General, Read),
                        (Emotional, Read),
                        (Personal, NoAccess),
                        (Medical, NoAccess),
                        (Therapeutic, NoAccess),
                        (System, Read),
                        (Session, Write),
                    ],
                ),
            ],
            scopes: vec![
                ("EchoMind".to_string(), MemoryScope::All),
                ("Therapist".to_string(), MemoryScope::All),
                ("Bridge".to_string(), MemoryScope::Recent),
                ("MemoryService".to_string(), MemoryScope::All),
                (WILDCARD_AGENT.to_string(), MemoryScope::CurrentSession),
            ],
        }
    }

    /// Access level for an agent and memory category.
    ///
    /// The agent's own grant is consulted first, then the wildcard grant;
    /// a category absent from the resolved grant yields no access.
    pub fn access_level(&self, agent: &str, category: MemoryCategory) -> MemoryAccessLevel {
        let resolved = self
            .grants
            .iter()
            .find(|g| g.agent == agent)
            .or_else(|| self.grants.iter().find(|g| g.agent == WILDCARD_AGENT));

        resolved
            .and_then(|g| {
                g.levels
                    .iter()
                    .find(|(c, _)| *c == category)
                    .map(|(_, level)| *level)
            })
            .unwrap_or(MemoryAccessLevel::None)
    }

    /// Temporal scope for an agent, falling back to the wildcard entry and
    /// then to the current session.
    pub fn scope(&self, agent: &str) -> MemoryScope {
        self.scopes
            .iter()
            .find(|(name, _)| name == agent)
            .or_else(|| self.scopes.iter().find(|(name, _)| name == WILDCARD_AGENT))
            .map(|(_, scope)| *scope)
            .unwrap_or(MemoryScope::CurrentSession)
    }

    /// Whether an agent may perform an operation on a memory category.
    pub fn check_access(
        &self,
        agent: &str,
        category: MemoryCategory,
        operation: MemoryOperation,
    ) -> bool {
        self.access_level(agent, category).permits(operation)
    }

    /// Minimum timestamp the agent may see, or `None` for unbounded access.
    pub fn scope_cutoff(&self, agent: &str) -> Option<Timestamp> {
        self.scope(agent).cutoff_from(Utc::now())
    }
}

fn grant(agent: &str, levels: &[(MemoryCategory, MemoryAccessLevel)]) -> AgentGrant {
    AgentGrant {
        agent: agent.to_string(),
        levels: levels.to_vec(),
    }
}

// =============================================================================
// TESTS
// =============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_category() -> impl Strategy<Value = MemoryCategory> {
        prop_oneof![
            Just(MemoryCategory::General),
            Just(MemoryCategory::Emotional),
            Just(MemoryCategory::Personal),
            Just(MemoryCategory::Medical),
            Just(MemoryCategory::Therapeutic),
            Just(MemoryCategory::System),
            Just(MemoryCategory::Session),
        ]
    }

    proptest! {
        /// Delete access implies update, write, and read access: required
        /// levels are ordered, so a stronger grant never loses a weaker
        /// operation.
        #[test]
        fn prop_access_is_monotonic_across_operations(
            agent in "[A-Za-z*]{1,12}",
            category in arb_category(),
        ) {
            let policy = AccessPolicy::default_policy();
            if policy.check_access(&agent, category, MemoryOperation::Delete) {
                prop_assert!(policy.check_access(&agent, category, MemoryOperation::Update));
                prop_assert!(policy.check_access(&agent, category, MemoryOperation::Write));
            }
            if policy.check_access(&agent, category, MemoryOperation::Write) {
                prop_assert!(policy.check_access(&agent, category, MemoryOperation::Read));
            }
        }

        /// Lookup is total for arbitrary agent names.
        #[test]
        fn prop_lookup_never_panics(agent in ".{0,24}", category in arb_category()) {
            let policy = AccessPolicy::default_policy();
            let _ = policy.access_level(&agent, category);
            let _ = policy.scope(&agent);
            let _ = policy.scope_cutoff(&agent);
        }
    }
}
