//! Chorus Agents - Switching Engine
//!
//! Decides when conversational control should move to another agent and
//! packages the handoff. Evaluation is a pure function over injected routing
//! configuration, checked in strict priority order:
//! emotional state, then topics, then required capabilities.

use chorus_core::{
    handoff_message, AgentCapability, AgentHandoff, AgentMessage, ChorusResult, EmotionalState,
    MessagePriority, ValidationError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// ROUTING CONFIGURATION
// ============================================================================

/// An emotional trigger: when the named emotion reaches its threshold, the
/// target agent is recommended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalTrigger {
    /// Emotion label to match
    pub emotion: String,
    /// Intensity at or above which the trigger fires, 0.0 to 1.0
    pub threshold: f32,
    /// Agent recommended when the trigger fires
    pub target_agent: String,
}

/// A topic route: topics matching the area are handled by the listed agents,
/// primary first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRoute {
    /// Topic area matched by case-insensitive substring in either direction
    pub topic: String,
    /// Agents suited to the area; the first entry is the primary
    pub agents: Vec<String>,
}

/// Capabilities an agent advertises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    /// Agent name
    pub agent: String,
    /// Capabilities the agent declares
    pub capabilities: Vec<AgentCapability>,
}

/// Immutable routing configuration injected into the switching engine.
///
/// Entry order is load-bearing: secondary-emotion scans, topic routing, and
/// capability tie-breaks all resolve in the order entries are listed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Emotional thresholds that may trigger a switch, scanned in order
    pub emotional_triggers: Vec<EmotionalTrigger>,
    /// Topic areas and the agents best suited to handle them, in priority order
    pub topic_routes: Vec<TopicRoute>,
    /// Per-agent capability declarations; order breaks tally ties
    pub capability_profiles: Vec<CapabilityProfile>,
    /// Agent that handles the conversation when no specialist is indicated
    pub default_agent: String,
}

impl RoutingConfig {
    /// Build the stock routing configuration.
    pub fn default_routing() -> Self {
        Self {
            emotional_triggers: vec![
                trigger("distress", 0.7, "Therapist"),
                trigger("anxiety", 0.7, "Therapist"),
                trigger("anger", 0.8, "Mediator"),
                trigger("confusion", 0.6, "Teacher"),
                trigger("joy", 0.9, "Friend"),
                trigger("grief", 0.6, "Therapist"),
            ],
            topic_routes: vec![
                route("parenting", &["Parent", "Family"]),
                route("relationships", &["Elora", "Bridge"]),
                route("emotional_support", &["Mirror", "Therapist"]),
                route("coaching", &["Coach", "Mentor"]),
                route("goal_setting", &["Coach", "Achiever"]),
                route("trauma", &["Therapist", "Healer"]),
                route("conflict", &["Mediator", "Bridge"]),
                route("communication", &["Bridge", "Communicator"]),
                route("technical", &["Technical", "Expert"]),
            ],
            capability_profiles: vec![
                profile(
                    "EchoMind",
                    &[
                        AgentCapability::EmotionalSupport,
                        AgentCapability::CognitiveReframing,
                    ],
                ),
                profile(
                    "Therapist",
                    &[
                        AgentCapability::Therapy,
                        AgentCapability::EmotionalSupport,
                        AgentCapability::CognitiveReframing,
                    ],
                ),
                profile(
                    "Coach",
                    &[AgentCapability::Coaching, AgentCapability::GoalSetting],
                ),
                profile("Parent", &[AgentCapability::ParentingAdvice]),
                profile(
                    "Bridge",
                    &[AgentCapability::Bridging, AgentCapability::ConflictResolution],
                ),
                profile(
                    "Friend",
                    &[AgentCapability::Friendship, AgentCapability::EmotionalSupport],
                ),
            ],
            default_agent: "EchoMind".to_string(),
        }
    }

    /// Validate trigger thresholds and route shapes.
    pub fn validate(&self) -> ChorusResult<()> {
        for trigger in &self.emotional_triggers {
            if !(0.0..=1.0).contains(&trigger.threshold) {
                return Err(ValidationError::InvalidValue {
                    field: format!("emotional_triggers.{}", trigger.emotion),
                    reason: "threshold must be between 0.0 and 1.0".to_string(),
                }
                .into());
            }
        }
        for route in &self.topic_routes {
            if route.agents.is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: format!("topic_routes.{}", route.topic),
                    reason: "route must list at least one agent".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

fn trigger(emotion: &str, threshold: f32, target_agent: &str) -> EmotionalTrigger {
    EmotionalTrigger {
        emotion: emotion.to_string(),
        threshold,
        target_agent: target_agent.to_string(),
    }
}

fn route(topic: &str, agents: &[&str]) -> TopicRoute {
    TopicRoute {
        topic: topic.to_string(),
        agents: agents.iter().map(|a| a.to_string()).collect(),
    }
}

fn profile(agent: &str, capabilities: &[AgentCapability]) -> CapabilityProfile {
    CapabilityProfile {
        agent: agent.to_string(),
        capabilities: capabilities.to_vec(),
    }
}

// ============================================================================
// SWITCH EVALUATION
// ============================================================================

/// Outcome of a switch evaluation.
///
/// No recommendation is represented as `(false, None, None)`, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchEvaluation {
    /// Whether a switch is recommended
    pub should_switch: bool,
    /// Agent to switch to, when switching
    pub target_agent: Option<String>,
    /// Reason for the switch, when switching
    pub reason: Option<String>,
}

impl SwitchEvaluation {
    /// No switch recommended.
    pub fn stay() -> Self {
        Self {
            should_switch: false,
            target_agent: None,
            reason: None,
        }
    }

    /// Recommend a switch to `target_agent`.
    pub fn switch_to(target_agent: &str, reason: String) -> Self {
        Self {
            should_switch: true,
            target_agent: Some(target_agent.to_string()),
            reason: Some(reason),
        }
    }
}

// ============================================================================
// SWITCHING ENGINE
// ============================================================================

/// Engine that evaluates conversation state and recommends agent switches.
///
/// Stateless apart from its immutable configuration; safe to share across
/// concurrent evaluations.
#[derive(Debug, Clone)]
pub struct SwitchingEngine {
    config: RoutingConfig,
}

impl SwitchingEngine {
    /// Create a switching engine over a validated routing configuration.
    pub fn new(config: RoutingConfig) -> ChorusResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The agent handling conversations when no specialist is indicated.
    pub fn default_agent(&self) -> &str {
        &self.config.default_agent
    }

    /// Find the agent for an emotion at the given intensity.
    ///
    /// Returns `None` when the emotion has no trigger or the intensity is
    /// below threshold.
    pub fn best_agent_for_emotion(&self, emotion: &str, intensity: f32) -> Option<&str> {
        self.config
            .emotional_triggers
            .iter()
            .find(|t| t.emotion == emotion)
            .filter(|t| intensity >= t.threshold)
            .map(|t| t.target_agent.as_str())
    }

    /// Find the primary agent for a topic.
    ///
    /// Routes are scanned in definition order; a topic matches an area by
    /// case-insensitive substring in either direction.
    pub fn best_agent_for_topic(&self, topic: &str) -> Option<&str> {
        let topic_lower = topic.to_lowercase();
        for route in &self.config.topic_routes {
            let area = route.topic.to_lowercase();
            if topic_lower.contains(&area) || area.contains(&topic_lower) {
                return route.agents.first().map(String::as_str);
            }
        }
        None
    }

    /// Agents declaring a capability, in profile definition order.
    pub fn agents_with_capability(&self, capability: AgentCapability) -> Vec<&str> {
        self.config
            .capability_profiles
            .iter()
            .filter(|p| p.capabilities.contains(&capability))
            .map(|p| p.agent.as_str())
            .collect()
    }

    /// Evaluate the emotional state for a recommended agent.
    ///
    /// The primary emotion is checked first; secondary emotions are scanned
    /// in their given order and the first one clearing its threshold wins.
    pub fn evaluate_emotional_state(&self, state: &EmotionalState) -> Option<&str> {
        if let Some(agent) = self.best_agent_for_emotion(&state.primary, state.intensity) {
            tracing::info!(
                emotion = %state.primary,
                intensity = state.intensity,
                confidence = state.confidence,
                recommended_agent = %agent,
                "Emotional state indicates a switch may be appropriate"
            );
            return Some(agent);
        }

        if let Some(secondary) = &state.secondary {
            for (emotion, intensity) in secondary {
                if let Some(agent) = self.best_agent_for_emotion(emotion, *intensity) {
                    tracing::info!(
                        emotion = %emotion,
                        intensity = intensity,
                        recommended_agent = %agent,
                        "Secondary emotional state indicates a switch may be appropriate"
                    );
                    return Some(agent);
                }
            }
        }

        None
    }

    /// Evaluate conversation topics for a recommended agent.
    pub fn evaluate_topics(&self, topics: &[String]) -> Option<&str> {
        for topic in topics {
            if let Some(agent) = self.best_agent_for_topic(topic) {
                tracing::info!(
                    topic = %topic,
                    recommended_agent = %agent,
                    "Topic indicates a switch may be appropriate"
                );
                return Some(agent);
            }
        }
        None
    }

    /// Evaluate required capabilities for a recommended agent.
    ///
    /// Tallies candidate agents per capability (first-seen order preserved),
    /// picks the highest tally with ties broken by profile definition order,
    /// and only recommends when the winner covers at least half of the
    /// required capabilities.
    pub fn evaluate_capabilities(&self, capabilities_needed: &[AgentCapability]) -> Option<&str> {
        let mut tallies: Vec<(&str, usize)> = Vec::new();

        for capability in capabilities_needed {
            for agent in self.agents_with_capability(*capability) {
                match tallies.iter_mut().find(|(name, _)| *name == agent) {
                    Some((_, count)) => *count += 1,
                    None => tallies.push((agent, 1)),
                }
            }
        }

        let (best_agent, count) = tallies
            .iter()
            .copied()
            .reduce(|best, candidate| if candidate.1 > best.1 { candidate } else { best })?;

        if count * 2 >= capabilities_needed.len() {
            tracing::info!(
                capabilities_needed = ?capability_labels(capabilities_needed),
                recommended_agent = %best_agent,
                capabilities_match_count = count,
                "Required capabilities indicate a switch may be appropriate"
            );
            return Some(best_agent);
        }

        None
    }

    /// Evaluate whether to switch agents based on conversation state.
    ///
    /// Signals are checked in strict priority order: emotional state, then
    /// topics, then required capabilities. A stage recommending the current
    /// agent is discarded at that stage, letting later stages run.
    pub fn evaluate_switch(
        &self,
        current_agent: &str,
        emotional_state: Option<&EmotionalState>,
        topics: Option<&[String]>,
        capabilities_needed: Option<&[AgentCapability]>,
        _conversation_state: Option<&Value>,
    ) -> SwitchEvaluation {
        let mut evaluation = SwitchEvaluation::stay();

        if let Some(state) = emotional_state {
            if let Some(agent) = self.evaluate_emotional_state(state) {
                if agent != current_agent {
                    evaluation = SwitchEvaluation::switch_to(
                        agent,
                        format!(
                            "Emotional state ({} at {:.1} intensity) requires {}",
                            state.primary, state.intensity, agent
                        ),
                    );
                }
            }
        }

        if !evaluation.should_switch {
            if let Some(topics) = topics.filter(|t| !t.is_empty()) {
                if let Some(agent) = self.evaluate_topics(topics) {
                    if agent != current_agent {
                        evaluation = SwitchEvaluation::switch_to(
                            agent,
                            format!(
                                "Topic specialization in '{}' suggests {}",
                                topics.join(", "),
                                agent
                            ),
                        );
                    }
                }
            }
        }

        if !evaluation.should_switch {
            if let Some(needed) = capabilities_needed.filter(|c| !c.is_empty()) {
                if let Some(agent) = self.evaluate_capabilities(needed) {
                    if agent != current_agent {
                        evaluation = SwitchEvaluation::switch_to(
                            agent,
                            format!(
                                "Required capabilities [{}] are best handled by {}",
                                capability_labels(needed).join(", "),
                                agent
                            ),
                        );
                    }
                }
            }
        }

        if evaluation.should_switch {
            tracing::info!(
                current_agent = %current_agent,
                recommended_agent = evaluation.target_agent.as_deref().unwrap_or(""),
                reason = evaluation.reason.as_deref().unwrap_or(""),
                "Agent switch recommended"
            );
        }

        evaluation
    }

    /// Create a handoff message to switch agents.
    ///
    /// Extracts the fixed context subset from the conversation state; missing
    /// keys default to empty values.
    #[allow(clippy::too_many_arguments)]
    pub fn create_switch_message(
        &self,
        session_id: &str,
        user_id: &str,
        current_agent: &str,
        target_agent: &str,
        reason: &str,
        conversation_state: &Value,
        emotional_state: Option<EmotionalState>,
        urgency: MessagePriority,
    ) -> ChorusResult<AgentMessage> {
        let context = json!({
            "recent_topic": conversation_state.get("recent_topic").cloned()
                .unwrap_or_else(|| json!("")),
            "session_duration": conversation_state.get("session_duration").cloned()
                .unwrap_or_else(|| json!(0)),
            "user_goals": conversation_state.get("user_goals").cloned()
                .unwrap_or_else(|| json!([])),
            "previous_agents": conversation_state.get("previous_agents").cloned()
                .unwrap_or_else(|| json!([])),
            "tone_preferences": conversation_state.get("tone_preferences").cloned()
                .unwrap_or_else(|| json!({})),
        });

        let mut handoff =
            AgentHandoff::new(target_agent, reason, context, conversation_state.clone())
                .with_urgency(urgency);
        if let Some(state) = emotional_state {
            handoff = handoff.with_emotional_state(state);
        }

        let message = handoff_message(current_agent, handoff, session_id, user_id)?;

        tracing::info!(
            handoff_id = %message.message_id,
            session_id = %session_id,
            user_id = %user_id,
            reason = %reason,
            "Created handoff message for agent switch"
        );

        Ok(message)
    }
}

fn capability_labels(capabilities: &[AgentCapability]) -> Vec<&'static str> {
    capabilities.iter().map(|c| c.as_db_str()).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> SwitchingEngine {
        SwitchingEngine::new(RoutingConfig::default_routing()).unwrap()
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = RoutingConfig::default_routing();
        config.emotional_triggers[0].threshold = 1.5;
        assert!(SwitchingEngine::new(config).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_route() {
        let mut config = RoutingConfig::default_routing();
        config.topic_routes[0].agents.clear();
        assert!(SwitchingEngine::new(config).is_err());
    }

    #[test]
    fn test_emotion_below_threshold_is_no_match() {
        let engine = engine();
        assert!(engine.best_agent_for_emotion("distress", 0.5).is_none());
        assert_eq!(
            engine.best_agent_for_emotion("distress", 0.7),
            Some("Therapist")
        );
    }

    #[test]
    fn test_unknown_emotion_is_no_match() {
        let engine = engine();
        assert!(engine.best_agent_for_emotion("nostalgia", 1.0).is_none());
    }

    #[test]
    fn test_high_distress_routes_to_therapist() {
        let engine = engine();
        let state = EmotionalState::new("distress", 0.75, 0.9).unwrap();

        let evaluation =
            engine.evaluate_switch("EchoMind", Some(&state), None, None, None);

        assert!(evaluation.should_switch);
        assert_eq!(evaluation.target_agent.as_deref(), Some("Therapist"));
        assert!(evaluation.reason.unwrap().contains("distress"));
    }

    #[test]
    fn test_secondary_emotions_scanned_in_order() {
        let engine = engine();
        // Primary below threshold; first secondary below, second above.
        let state = EmotionalState::new("distress", 0.3, 0.8)
            .unwrap()
            .with_secondary(vec![
                ("anger".to_string(), 0.5),
                ("grief".to_string(), 0.9),
            ]);

        assert_eq!(engine.evaluate_emotional_state(&state), Some("Therapist"));
    }

    #[test]
    fn test_topic_substring_matches_both_directions() {
        let engine = engine();
        // Topic contains the area.
        assert_eq!(
            engine.best_agent_for_topic("Parenting Teenagers"),
            Some("Parent")
        );
        // Area contains the topic.
        assert_eq!(engine.best_agent_for_topic("relation"), Some("Elora"));
        assert!(engine.best_agent_for_topic("astronomy").is_none());
    }

    #[test]
    fn test_topic_routes_scanned_in_definition_order() {
        let engine = engine();
        // "conflict" appears in the conflict route before communication.
        assert_eq!(engine.best_agent_for_topic("conflict"), Some("Mediator"));
    }

    #[test]
    fn test_capability_tie_breaks_by_table_order() {
        let engine = engine();
        let needed = [AgentCapability::Therapy, AgentCapability::Coaching];

        // Therapist and Coach each match one capability; Therapist appears
        // first in the capability table, so the tie resolves to Therapist.
        let evaluation = engine.evaluate_switch("EchoMind", None, None, Some(&needed), None);
        assert!(evaluation.should_switch);
        assert_eq!(evaluation.target_agent.as_deref(), Some("Therapist"));
    }

    #[test]
    fn test_capability_majority_threshold() {
        let engine = engine();
        // Friend covers friendship only: 1 of 2 needed, exactly half, so the
        // recommendation stands.
        let needed = [AgentCapability::Friendship, AgentCapability::ParentingAdvice];
        let evaluation = engine.evaluate_switch("EchoMind", None, None, Some(&needed), None);
        assert!(evaluation.should_switch);
        assert_eq!(evaluation.target_agent.as_deref(), Some("Friend"));
    }

    #[test]
    fn test_emotional_takes_priority_over_topic() {
        let engine = engine();
        let state = EmotionalState::new("anger", 0.9, 0.8).unwrap();
        let topics = vec!["parenting".to_string()];

        let evaluation =
            engine.evaluate_switch("EchoMind", Some(&state), Some(&topics), None, None);

        assert_eq!(evaluation.target_agent.as_deref(), Some("Mediator"));
    }

    #[test]
    fn test_stage_recommending_current_agent_falls_through() {
        let engine = engine();
        // Emotional stage recommends Therapist, which is current; the topic
        // stage still runs and recommends Parent.
        let state = EmotionalState::new("grief", 0.8, 0.9).unwrap();
        let topics = vec!["parenting".to_string()];

        let evaluation =
            engine.evaluate_switch("Therapist", Some(&state), Some(&topics), None, None);

        assert!(evaluation.should_switch);
        assert_eq!(evaluation.target_agent.as_deref(), Some("Parent"));
    }

    #[test]
    fn test_no_signals_is_no_switch() {
        let engine = engine();
        let evaluation = engine.evaluate_switch("EchoMind", None, None, None, None);
        assert_eq!(evaluation, SwitchEvaluation::stay());
        assert_eq!(engine.default_agent(), "EchoMind");
    }

    #[test]
    fn test_create_switch_message_packages_context_subset() {
        let engine = engine();
        let conversation_state = json!({
            "recent_topic": "childhood",
            "session_duration": 15,
            "topic_history": ["family", "childhood"],
        });

        let message = engine
            .create_switch_message(
                "session_1",
                "user_1",
                "EchoMind",
                "Therapist",
                "User showing signs of distress",
                &conversation_state,
                Some(EmotionalState::new("distress", 0.7, 0.8).unwrap()),
                MessagePriority::High,
            )
            .unwrap();

        assert_eq!(message.recipient, "Therapist");
        assert_eq!(message.priority, MessagePriority::High);

        let handoff = message.handoff().unwrap();
        assert_eq!(handoff.target_agent, "Therapist");
        assert_eq!(handoff.urgency, MessagePriority::High);
        assert_eq!(handoff.context["recent_topic"], "childhood");
        assert_eq!(handoff.context["session_duration"], 15);
        // Missing keys default to empty values.
        assert_eq!(handoff.context["user_goals"], json!([]));
        assert_eq!(handoff.context["previous_agents"], json!([]));
        assert_eq!(handoff.context["tone_preferences"], json!({}));
        // The full conversation state rides along.
        assert_eq!(
            handoff.conversation_state["topic_history"],
            json!(["family", "childhood"])
        );
    }
}
