//! Handoff payloads and emotional state assessment.

use crate::{ChorusResult, MessagePriority, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// EMOTIONAL STATE
// ============================================================================

/// An emotional state assessment, supplied as already-computed structured
/// input. Pure data, no identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    /// Primary emotion detected
    pub primary: String,
    /// Intensity of the emotion, 0.0 to 1.0
    pub intensity: f32,
    /// Secondary emotions with their intensities, in detection order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Vec<(String, f32)>>,
    /// Confidence in the detection, 0.0 to 1.0
    pub confidence: f32,
}

impl EmotionalState {
    /// Create a validated emotional state.
    pub fn new(primary: &str, intensity: f32, confidence: f32) -> ChorusResult<Self> {
        let state = Self {
            primary: primary.to_string(),
            intensity,
            secondary: None,
            confidence,
        };
        state.validate()?;
        Ok(state)
    }

    /// Attach secondary emotions.
    pub fn with_secondary(mut self, secondary: Vec<(String, f32)>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Validate intensity and confidence ranges.
    pub fn validate(&self) -> ChorusResult<()> {
        if !(0.0..=1.0).contains(&self.intensity) {
            return Err(ValidationError::InvalidValue {
                field: "intensity".to_string(),
                reason: "must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ValidationError::InvalidValue {
                field: "confidence".to_string(),
                reason: "must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// AGENT HANDOFF
// ============================================================================

/// Payload transferring conversational control to another agent.
///
/// Embedded as the content of a `MessageType::Handoff` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHandoff {
    /// Agent to hand off to
    pub target_agent: String,
    /// Reason for the handoff
    pub reason: String,
    /// Context to provide to the new agent
    pub context: Value,
    /// Current state of the conversation
    pub conversation_state: Value,
    /// Suggested response for the new agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_response: Option<String>,
    /// Current emotional state assessment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_state: Option<EmotionalState>,
    /// Urgency of the handoff
    #[serde(default)]
    pub urgency: MessagePriority,
}

impl AgentHandoff {
    /// Create a handoff with required fields.
    pub fn new(target_agent: &str, reason: &str, context: Value, conversation_state: Value) -> Self {
        Self {
            target_agent: target_agent.to_string(),
            reason: reason.to_string(),
            context,
            conversation_state,
            suggested_response: None,
            emotional_state: None,
            urgency: MessagePriority::Normal,
        }
    }

    /// Set the suggested response.
    pub fn with_suggested_response(mut self, response: &str) -> Self {
        self.suggested_response = Some(response.to_string());
        self
    }

    /// Set the emotional state assessment.
    pub fn with_emotional_state(mut self, state: EmotionalState) -> Self {
        self.emotional_state = Some(state);
        self
    }

    /// Set the handoff urgency.
    pub fn with_urgency(mut self, urgency: MessagePriority) -> Self {
        self.urgency = urgency;
        self
    }
}

// ============================================================================
// AGENT THOUGHT
// ============================================================================

/// Internal reasoning trace of an agent, never shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentThought {
    /// Reasoning process
    pub reasoning: String,
    /// Observations about the conversation or user
    pub observations: Vec<String>,
    /// Assessment of the user's emotional state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_assessment: Option<EmotionalState>,
    /// Potential next steps
    pub next_steps: Vec<String>,
    /// Confidence in this assessment, 0.0 to 1.0
    pub confidence: f32,
}

// =============================================================================
// TESTS
// =============================================================================
