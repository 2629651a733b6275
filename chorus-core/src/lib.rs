//! Chorus Core - Envelope Types
//!
//! Value types for inter-agent communication: message envelopes, handoffs,
//! emotional state, and memory access vocabulary. Pure data with
//! construction-time validation only; all other crates depend on this.

use chrono::{DateTime, Utc};
use uuid::Uuid;

mod error;
mod handoff;
mod memory;
mod message;

pub use error::{
    ChorusError, ChorusResult, ConfigError, LookupError, PolicyError, StorageError,
    ValidationError,
};
pub use handoff::{AgentHandoff, AgentThought, EmotionalState};
pub use memory::{
    MemoryAccessLevel, MemoryAccessRequest, MemoryCategory, MemoryOperation, MemoryScope,
};
pub use message::{
    handoff_message, memory_request_message, AgentCapability, AgentCapabilityParseError,
    AgentMessage, MessageBuilder, MessagePriority, MessagePriorityParseError, MessageType,
    MessageTypeParseError, MEMORY_SERVICE,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Message identifier using UUIDv7 for timestamp-sortable IDs.
pub type MessageId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 MessageId (timestamp-sortable).
pub fn new_message_id() -> MessageId {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique() {
        let a = new_message_id();
        let b = new_message_id();
        assert_ne!(a, b);
    }
}
