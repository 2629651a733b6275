//! Memory access vocabulary: operations, categories, levels, and scopes.
//!
//! These types are the unit of access control. Wire strings are snake_case
//! to match the persisted record format.

use crate::LookupError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::Timestamp;

// ============================================================================
// MEMORY OPERATION
// ============================================================================

/// Operation requested against stored memory.
///
/// A tagged variant rather than a free-form string: new operations must be
/// added here and handled exhaustively, instead of falling through a string
/// dispatch unnoticed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryOperation {
    /// Read stored memory
    Read,
    /// Create new memory
    Write,
    /// Modify existing memory
    Update,
    /// Remove memory
    Delete,
}

impl MemoryOperation {
    /// Convert to wire string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MemoryOperation::Read => "read",
            MemoryOperation::Write => "write",
            MemoryOperation::Update => "update",
            MemoryOperation::Delete => "delete",
        }
    }

    /// Parse from wire string representation.
    pub fn from_db_str(s: &str) -> Result<Self, LookupError> {
        match s.to_lowercase().as_str() {
            "read" => Ok(MemoryOperation::Read),
            "write" => Ok(MemoryOperation::Write),
            "update" => Ok(MemoryOperation::Update),
            "delete" => Ok(MemoryOperation::Delete),
            _ => Err(LookupError::UnknownOperation {
                operation: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MemoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for MemoryOperation {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// ============================================================================
// MEMORY CATEGORY
// ============================================================================

/// Coarse classification of stored memory, used as the unit of access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    /// General memory
    General,
    /// Emotional state and history
    Emotional,
    /// Personal information
    Personal,
    /// Medical information
    Medical,
    /// Therapeutic insights and notes
    Therapeutic,
    /// System-related memory
    System,
    /// Current session memory
    Session,
}

impl MemoryCategory {
    /// Convert to wire string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MemoryCategory::General => "general",
            MemoryCategory::Emotional => "emotional",
            MemoryCategory::Personal => "personal",
            MemoryCategory::Medical => "medical",
            MemoryCategory::Therapeutic => "therapeutic",
            MemoryCategory::System => "system",
            MemoryCategory::Session => "session",
        }
    }

    /// Parse from wire string representation.
    pub fn from_db_str(s: &str) -> Result<Self, LookupError> {
        match s.to_lowercase().as_str() {
            "general" => Ok(MemoryCategory::General),
            "emotional" => Ok(MemoryCategory::Emotional),
            "personal" => Ok(MemoryCategory::Personal),
            "medical" => Ok(MemoryCategory::Medical),
            "therapeutic" => Ok(MemoryCategory::Therapeutic),
            "system" => Ok(MemoryCategory::System),
            "session" => Ok(MemoryCategory::Session),
            _ => Err(LookupError::UnknownMemoryType {
                memory_type: s.to_string(),
            }),
        }
    }

    /// Map a caller-supplied memory type string to a category.
    ///
    /// Accepts the fixed alias table; anything unmapped is a hard error.
    pub fn from_alias(memory_type: &str) -> Result<Self, LookupError> {
        match memory_type.to_lowercase().as_str() {
            "general" => Ok(MemoryCategory::General),
            "emotional" | "emotional_state" => Ok(MemoryCategory::Emotional),
            "personal" | "profile" => Ok(MemoryCategory::Personal),
            "medical" | "health" => Ok(MemoryCategory::Medical),
            "therapeutic" | "therapy" => Ok(MemoryCategory::Therapeutic),
            "system" => Ok(MemoryCategory::System),
            "session" | "conversation" => Ok(MemoryCategory::Session),
            _ => Err(LookupError::UnknownMemoryType {
                memory_type: memory_type.to_string(),
            }),
        }
    }
}

impl fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for MemoryCategory {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// ============================================================================
// MEMORY ACCESS LEVEL
// ============================================================================

/// Access level granted to an agent over a memory category.
///
/// Derives `Ord` with None < Read < Write < Admin so that "is this level
/// sufficient for the operation" is a single comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum MemoryAccessLevel {
    /// No access
    #[default]
    None,
    /// Read-only access
    Read,
    /// Can read and write
    Write,
    /// Full access including deletion
    Admin,
}

impl MemoryAccessLevel {
    /// Convert to wire string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MemoryAccessLevel::None => "none",
            MemoryAccessLevel::Read => "read",
            MemoryAccessLevel::Write => "write",
            MemoryAccessLevel::Admin => "admin",
        }
    }

    /// Minimum level required to perform an operation.
    pub fn required_for(operation: MemoryOperation) -> Self {
        match operation {
            MemoryOperation::Read => MemoryAccessLevel::Read,
            MemoryOperation::Write | MemoryOperation::Update => MemoryAccessLevel::Write,
            MemoryOperation::Delete => MemoryAccessLevel::Admin,
        }
    }

    /// Whether this level permits the given operation.
    pub fn permits(&self, operation: MemoryOperation) -> bool {
        *self >= Self::required_for(operation)
    }
}

impl fmt::Display for MemoryAccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ============================================================================
// MEMORY SCOPE
// ============================================================================

/// Temporal window bounding which memory an agent may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScope {
    /// Limited to the current session (last 24 hours at most)
    CurrentSession,
    /// Limited to recent sessions (last 30 days)
    Recent,
    /// Access to historical sessions (last year)
    Historical,
    /// Access to all memory
    All,
}

impl MemoryScope {
    /// Convert to wire string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MemoryScope::CurrentSession => "current_session",
            MemoryScope::Recent => "recent",
            MemoryScope::Historical => "historical",
            MemoryScope::All => "all",
        }
    }

    /// Resolve the scope to a lookback cutoff relative to `now`.
    ///
    /// Returns `None` for unbounded access.
    pub fn cutoff_from(&self, now: Timestamp) -> Option<Timestamp> {
        match self {
            MemoryScope::CurrentSession => Some(now - Duration::hours(24)),
            MemoryScope::Recent => Some(now - Duration::days(30)),
            MemoryScope::Historical => Some(now - Duration::days(365)),
            MemoryScope::All => None,
        }
    }
}

impl fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ============================================================================
// MEMORY ACCESS REQUEST
// ============================================================================

/// Request to access or modify agent memory.
///
/// Travels as the content of a `MessageType::MemoryAccess` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryAccessRequest {
    /// Operation to perform
    pub operation: MemoryOperation,
    /// Type of memory to access (alias-mapped to a category)
    pub memory_type: String,
    /// Path/key within the memory
    pub path: String,
    /// Data for write/update operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Filters for read operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Map<String, Value>>,
}

impl MemoryAccessRequest {
    /// Create a read request for a path.
    pub fn read(memory_type: &str, path: &str) -> Self {
        Self {
            operation: MemoryOperation::Read,
            memory_type: memory_type.to_string(),
            path: path.to_string(),
            data: None,
            filters: None,
        }
    }

    /// Create a write request carrying a payload.
    pub fn write(memory_type: &str, path: &str, data: Value) -> Self {
        Self {
            operation: MemoryOperation::Write,
            memory_type: memory_type.to_string(),
            path: path.to_string(),
            data: Some(data),
            filters: None,
        }
    }

    /// Attach read filters.
    pub fn with_filters(mut self, filters: Map<String, Value>) -> Self {
        self.filters = Some(filters);
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================
