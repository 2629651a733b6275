//! Message envelope for inter-agent communication.
//!
//! Every exchange between agents travels as an `AgentMessage`. Messages are
//! immutable once constructed; the builder is the validating path and rejects
//! a response that does not answer a request.

use crate::{
    new_message_id, ChorusResult, MemoryAccessRequest, MessageId, Timestamp, ValidationError,
};
use crate::handoff::AgentHandoff;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Recipient of every memory access request.
pub const MEMORY_SERVICE: &str = "MemoryService";

// ============================================================================
// MESSAGE TYPE
// ============================================================================

/// Type of message exchanged between agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Request for information
    Query,
    /// Response to a query
    Response,
    /// Transfer control to another agent
    Handoff,
    /// Memory access request/response
    MemoryAccess,
    /// System message (not from user)
    System,
    /// Message from user
    User,
    /// Message from assistant/agent
    Assistant,
}

impl MessageType {
    /// Convert to wire string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MessageType::Query => "query",
            MessageType::Response => "response",
            MessageType::Handoff => "handoff",
            MessageType::MemoryAccess => "memory_access",
            MessageType::System => "system",
            MessageType::User => "user",
            MessageType::Assistant => "assistant",
        }
    }

    /// Parse from wire string representation.
    pub fn from_db_str(s: &str) -> Result<Self, MessageTypeParseError> {
        match s.to_lowercase().as_str() {
            "query" => Ok(MessageType::Query),
            "response" => Ok(MessageType::Response),
            "handoff" => Ok(MessageType::Handoff),
            "memory_access" => Ok(MessageType::MemoryAccess),
            "system" => Ok(MessageType::System),
            "user" => Ok(MessageType::User),
            "assistant" => Ok(MessageType::Assistant),
            _ => Err(MessageTypeParseError(s.to_string())),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for MessageType {
    type Err = MessageTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid message type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTypeParseError(pub String);

impl fmt::Display for MessageTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid message type: {}", self.0)
    }
}

impl std::error::Error for MessageTypeParseError {}

// ============================================================================
// MESSAGE PRIORITY
// ============================================================================

/// Priority level for agent messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    /// Low priority - can be delayed
    Low,
    /// Normal priority
    #[default]
    Normal,
    /// High priority - should be processed soon
    High,
    /// Urgent - must be processed immediately
    Urgent,
}

impl MessagePriority {
    /// Convert to wire string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MessagePriority::Low => "low",
            MessagePriority::Normal => "normal",
            MessagePriority::High => "high",
            MessagePriority::Urgent => "urgent",
        }
    }

    /// Parse from wire string representation.
    pub fn from_db_str(s: &str) -> Result<Self, MessagePriorityParseError> {
        match s.to_lowercase().as_str() {
            "low" => Ok(MessagePriority::Low),
            "normal" => Ok(MessagePriority::Normal),
            "high" => Ok(MessagePriority::High),
            "urgent" => Ok(MessagePriority::Urgent),
            _ => Err(MessagePriorityParseError(s.to_string())),
        }
    }
}

impl fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for MessagePriority {
    type Err = MessagePriorityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid message priority string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePriorityParseError(pub String);

impl fmt::Display for MessagePriorityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid message priority: {}", self.0)
    }
}

impl std::error::Error for MessagePriorityParseError {}

// ============================================================================
// AGENT CAPABILITY
// ============================================================================

/// Capabilities that agents can advertise and request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCapability {
    EmotionalSupport,
    ParentingAdvice,
    ConflictResolution,
    GoalSetting,
    CognitiveReframing,
    Therapy,
    Coaching,
    Friendship,
    Bridging,
}

impl AgentCapability {
    /// Convert to wire string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AgentCapability::EmotionalSupport => "emotional_support",
            AgentCapability::ParentingAdvice => "parenting_advice",
            AgentCapability::ConflictResolution => "conflict_resolution",
            AgentCapability::GoalSetting => "goal_setting",
            AgentCapability::CognitiveReframing => "cognitive_reframing",
            AgentCapability::Therapy => "therapy",
            AgentCapability::Coaching => "coaching",
            AgentCapability::Friendship => "friendship",
            AgentCapability::Bridging => "bridging",
        }
    }

    /// Parse from wire string representation.
    pub fn from_db_str(s: &str) -> Result<Self, AgentCapabilityParseError> {
        match s.to_lowercase().as_str() {
            "emotional_support" => Ok(AgentCapability::EmotionalSupport),
            "parenting_advice" => Ok(AgentCapability::ParentingAdvice),
            "conflict_resolution" => Ok(AgentCapability::ConflictResolution),
            "goal_setting" => Ok(AgentCapability::GoalSetting),
            "cognitive_reframing" => Ok(AgentCapability::CognitiveReframing),
            "therapy" => Ok(AgentCapability::Therapy),
            "coaching" => Ok(AgentCapability::Coaching),
            "friendship" => Ok(AgentCapability::Friendship),
            "bridging" => Ok(AgentCapability::Bridging),
            _ => Err(AgentCapabilityParseError(s.to_string())),
        }
    }
}

impl fmt::Display for AgentCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for AgentCapability {
    type Err = AgentCapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid capability string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCapabilityParseError(pub String);

impl fmt::Display for AgentCapabilityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid agent capability: {}", self.0)
    }
}

impl std::error::Error for AgentCapabilityParseError {}

// ============================================================================
// AGENT MESSAGE
// ============================================================================

/// Standard message format for agent communication.
///
/// All messages between agents follow this format; the fields serialize to a
/// flat record for persistence and logging by external collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Unique message identifier
    pub message_id: MessageId,
    /// Type of message
    pub message_type: MessageType,
    /// When the message was created
    pub timestamp: Timestamp,
    /// Agent or component that sent the message
    pub sender: String,
    /// Intended recipient agent
    pub recipient: String,
    /// Message content
    pub content: Value,
    /// Session this message belongs to
    pub session_id: String,
    /// User this message belongs to
    pub user_id: String,
    /// Request this message answers, if part of a request/response pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<MessageId>,
    /// Message priority
    #[serde(default)]
    pub priority: MessagePriority,
    /// Whether this message requires a response
    #[serde(default)]
    pub requires_response: bool,
    /// Time to live in seconds, for expiring messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<i64>,
}

impl AgentMessage {
    /// Start building a message with the required fields.
    pub fn builder(
        message_type: MessageType,
        sender: &str,
        recipient: &str,
        content: Value,
        session_id: &str,
        user_id: &str,
    ) -> MessageBuilder {
        MessageBuilder {
            message_type,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            content,
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            message_id: None,
            request_id: None,
            priority: MessagePriority::Normal,
            requires_response: false,
            ttl_seconds: None,
        }
    }

    /// Decode the content payload as a memory access request.
    pub fn memory_request(&self) -> Result<MemoryAccessRequest, serde_json::Error> {
        serde_json::from_value(self.content.clone())
    }

    /// Decode the content payload as a handoff.
    pub fn handoff(&self) -> Result<AgentHandoff, serde_json::Error> {
        serde_json::from_value(self.content.clone())
    }
}

/// Builder for `AgentMessage`, the validating construction path.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message_type: MessageType,
    sender: String,
    recipient: String,
    content: Value,
    session_id: String,
    user_id: String,
    message_id: Option<MessageId>,
    request_id: Option<MessageId>,
    priority: MessagePriority,
    requires_response: bool,
    ttl_seconds: Option<i64>,
}

impl MessageBuilder {
    /// Supply an explicit message id instead of generating one.
    pub fn message_id(mut self, id: MessageId) -> Self {
        self.message_id = Some(id);
        self
    }

    /// Mark which request this message answers.
    pub fn request_id(mut self, id: MessageId) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Set the message priority.
    pub fn priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Mark whether a response is required.
    pub fn requires_response(mut self, required: bool) -> Self {
        self.requires_response = required;
        self
    }

    /// Set a time-to-live in seconds.
    pub fn ttl_seconds(mut self, ttl: i64) -> Self {
        self.ttl_seconds = Some(ttl);
        self
    }

    /// Finish construction.
    ///
    /// Generates a message id when none was supplied. Fails when the message
    /// is a response that does not carry the request id it answers.
    pub fn build(self) -> ChorusResult<AgentMessage> {
        if self.message_type == MessageType::Response && self.request_id.is_none() {
            return Err(ValidationError::MissingRequestId.into());
        }

        Ok(AgentMessage {
            message_id: self.message_id.unwrap_or_else(new_message_id),
            message_type: self.message_type,
            timestamp: Utc::now(),
            sender: self.sender,
            recipient: self.recipient,
            content: self.content,
            session_id: self.session_id,
            user_id: self.user_id,
            request_id: self.request_id,
            priority: self.priority,
            requires_response: self.requires_response,
            ttl_seconds: self.ttl_seconds,
        })
    }
}

// ============================================================================
// ENVELOPE CONSTRUCTORS
// ============================================================================

/// Create a handoff message transferring control to `handoff.target_agent`.
///
/// Handoffs default to high priority.
pub fn handoff_message(
    sender: &str,
    handoff: AgentHandoff,
    session_id: &str,
    user_id: &str,
) -> ChorusResult<AgentMessage> {
    let recipient = handoff.target_agent.clone();
    let content = serde_json::to_value(&handoff).map_err(|e| ValidationError::InvalidValue {
        field: "content".to_string(),
        reason: e.to_string(),
    })?;

    AgentMessage::builder(
        MessageType::Handoff,
        sender,
        &recipient,
        content,
        session_id,
        user_id,
    )
    .priority(MessagePriority::High)
    .build()
}

/// Create a memory access request message.
///
/// Memory requests always go to the memory service and require a response.
pub fn memory_request_message(
    sender: &str,
    request: MemoryAccessRequest,
    session_id: &str,
    user_id: &str,
) -> ChorusResult<AgentMessage> {
    let content = serde_json::to_value(&request).map_err(|e| ValidationError::InvalidValue {
        field: "content".to_string(),
        reason: e.to_string(),
    })?;

    AgentMessage::builder(
        MessageType::MemoryAccess,
        sender,
        MEMORY_SERVICE,
        content,
        session_id,
        user_id,
    )
    .requires_response(true)
    .build()
}

// =============================================================================
// TESTS
// =============================================================================
