//! Chorus Memory - Access Control and Request Handling
//!
//! Enforces per-agent access policy over stored memory and dispatches
//! validated memory operations to a storage collaborator. The manager's
//! public boundary never raises: every failure surfaces as a well-formed
//! error response message.

mod manager;
mod policy;
mod store;

pub use manager::MemoryAccessManager;
pub use policy::{AccessPolicy, AgentGrant, WILDCARD_AGENT};
pub use store::{MemorySnapshot, MemoryStore, SummaryEntry};
