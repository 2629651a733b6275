//! Chorus Context - Context Window Packing
//!
//! Fits conversation history into a model's token budget before an LLM call.
//! Token counts come from a deterministic heuristic, not a real tokenizer;
//! the estimate is intentionally cheap and reproducible, and every packing
//! decision downstream depends on it being stable.

use chorus_core::{ChorusResult, ConfigError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

// ============================================================================
// MODEL TOKEN LIMITS
// ============================================================================

/// Default buffer reserved for the model's response.
pub const DEFAULT_BUFFER_TOKENS: i32 = 1000;

/// Fallback token limit when the model is not in the table.
pub const DEFAULT_TOKEN_LIMIT: i32 = 4096;

/// Model-name to maximum-token table, supplied as static configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTokenLimits {
    /// Known models and their context sizes
    pub limits: Vec<(String, i32)>,
    /// Limit applied to models absent from the table
    pub default_limit: i32,
}

impl ModelTokenLimits {
    /// Build the stock model table.
    pub fn default_limits() -> Self {
        Self {
            limits: vec![
                ("gpt-3.5-turbo".to_string(), 4096),
                ("gpt-3.5-turbo-16k".to_string(), 16384),
                ("gpt-4".to_string(), 8192),
                ("gpt-4-32k".to_string(), 32768),
                ("gpt-4-0613".to_string(), 8192),
                ("gpt-4-0125-preview".to_string(), 128_000),
                ("claude-2".to_string(), 100_000),
                ("claude-instant".to_string(), 100_000),
            ],
            default_limit: DEFAULT_TOKEN_LIMIT,
        }
    }

    /// Maximum tokens for a model, falling back to the default limit.
    pub fn limit_for(&self, model: &str) -> i32 {
        self.limits
            .iter()
            .find(|(name, _)| name == model)
            .map(|(_, limit)| *limit)
            .unwrap_or(self.default_limit)
    }
}

// ============================================================================
// CONTEXT BUDGET
// ============================================================================

/// Token budget for one model: maximum size minus a reserved response buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBudget {
    /// Model the budget applies to
    pub model: String,
    /// Maximum context tokens for the model
    pub max_tokens: i32,
    /// Tokens reserved for the response
    pub buffer_tokens: i32,
}

impl ContextBudget {
    /// Budget for a model, resolved through the limit table.
    pub fn for_model(model: &str, limits: &ModelTokenLimits) -> Self {
        Self {
            model: model.to_string(),
            max_tokens: limits.limit_for(model),
            buffer_tokens: DEFAULT_BUFFER_TOKENS,
        }
    }

    /// Override the maximum token count.
    pub fn with_max_tokens(mut self, max_tokens: i32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the response buffer.
    pub fn with_buffer_tokens(mut self, buffer_tokens: i32) -> Self {
        self.buffer_tokens = buffer_tokens;
        self
    }

    /// Tokens available for context after reserving the buffer.
    pub fn effective_limit(&self) -> i32 {
        self.max_tokens - self.buffer_tokens
    }

    /// Validate that the budget leaves room for any context at all.
    pub fn validate(&self) -> ChorusResult<()> {
        if self.effective_limit() < 0 {
            return Err(ConfigError::InvalidValue {
                field: "buffer_tokens".to_string(),
                value: self.buffer_tokens.to_string(),
                reason: format!(
                    "buffer exceeds max_tokens ({}), effective limit is negative",
                    self.max_tokens
                ),
            }
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// CHAT MESSAGE
// ============================================================================

/// A chat message as sent to the LLM collaborator.
///
/// Role and content are plain strings: a malformed message with an empty
/// role or content degrades to zero token cost instead of aborting the
/// batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role ("system", "user", "assistant", or other)
    pub role: String,
    /// Message text
    pub content: String,
    /// Optional speaker name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// Create a message.
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            name: None,
        }
    }

    /// Attach a speaker name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

// ============================================================================
// TOKEN ESTIMATION
// ============================================================================

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("valid regex"));
static PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Estimate the token count of a text.
///
/// Deterministic heuristic: 0.75 tokens per word, 1 per punctuation
/// character, 0.25 per whitespace run, truncated to an integer. Not a real
/// tokenizer; do not swap in one without revisiting every packing threshold.
pub fn estimate_tokens(text: &str) -> i32 {
    if text.is_empty() {
        return 0;
    }

    let words = WORD_RE.find_iter(text).count();
    let punctuation = PUNCT_RE.find_iter(text).count();
    let whitespace = WHITESPACE_RE.find_iter(text).count();

    (words as f64 * 0.75 + punctuation as f64 + whitespace as f64 * 0.25) as i32
}

/// Estimate the token count of a message list.
///
/// Each message carries a flat 4-token formatting overhead plus a small cost
/// for its role and optional name.
pub fn estimate_messages_tokens(messages: &[ChatMessage]) -> i32 {
    let mut total = messages.len() as i32 * 4;

    for message in messages {
        total += estimate_tokens(&message.content);
        total += message.role.len() as i32 / 4;
        if let Some(name) = &message.name {
            total += name.len() as i32 / 4;
        }
    }

    total
}

// ============================================================================
// CONTEXT WINDOW MANAGER
// ============================================================================

/// Packs conversation history into the effective token limit.
///
/// Stateless apart from its budget; safe to share across concurrent requests.
#[derive(Debug, Clone)]
pub struct ContextWindowManager {
    budget: ContextBudget,
}

impl ContextWindowManager {
    /// Create a manager over a validated budget.
    pub fn new(budget: ContextBudget) -> ChorusResult<Self> {
        budget.validate()?;
        tracing::debug!(
            model = %budget.model,
            max_tokens = budget.max_tokens,
            buffer_tokens = budget.buffer_tokens,
            effective_limit = budget.effective_limit(),
            "Initialized context window manager"
        );
        Ok(Self { budget })
    }

    /// The budget this manager packs into.
    pub fn budget(&self) -> &ContextBudget {
        &self.budget
    }

    /// Tokens available for context.
    pub fn effective_limit(&self) -> i32 {
        self.budget.effective_limit()
    }

    /// Fit messages within the context window.
    ///
    /// Messages already under budget are returned unchanged. Otherwise the
    /// newest user/assistant exchanges are kept greedily (system and
    /// important-indexed messages first) and the survivors are re-emitted in
    /// their original relative order. If even that exceeds the limit, the
    /// result is discarded for a last tier: system messages, one synthesized
    /// summary message, and the final few messages. Important messages do not
    /// survive into that last tier.
    pub fn fit_to_window(
        &self,
        messages: &[ChatMessage],
        include_system_prompt: bool,
        important_indices: Option<&[usize]>,
    ) -> Vec<ChatMessage> {
        let effective_limit = self.effective_limit();
        let estimated_tokens = estimate_messages_tokens(messages);

        if estimated_tokens <= effective_limit {
            return messages.to_vec();
        }

        tracing::info!(
            estimated_tokens,
            effective_limit,
            overflow = estimated_tokens - effective_limit,
            message_count = messages.len(),
            "Messages exceed context window, trimming"
        );

        let important = important_indices.unwrap_or(&[]);

        let mut system_messages: Vec<&ChatMessage> = Vec::new();
        let mut user_messages: Vec<&ChatMessage> = Vec::new();
        let mut assistant_messages: Vec<&ChatMessage> = Vec::new();
        let mut other_messages: Vec<&ChatMessage> = Vec::new();
        let mut important_messages: Vec<&ChatMessage> = Vec::new();

        for (i, message) in messages.iter().enumerate() {
            if important.contains(&i) {
                important_messages.push(message);
                continue;
            }
            match message.role.as_str() {
                "system" => system_messages.push(message),
                "user" => user_messages.push(message),
                "assistant" => assistant_messages.push(message),
                _ => other_messages.push(message),
            }
        }

        // Seed with the messages that are kept unconditionally.
        let mut seeded: Vec<ChatMessage> = Vec::new();
        if include_system_prompt {
            seeded.extend(system_messages.iter().map(|m| (*m).clone()));
        }
        seeded.extend(important_messages.iter().map(|m| (*m).clone()));
        let mut tokens_used = estimate_messages_tokens(&seeded);

        // Interleave user and assistant messages newest-first to keep the
        // most recent exchanges intact.
        let mut paired: Vec<&ChatMessage> = Vec::new();
        let mut users = user_messages.iter().rev().copied();
        let mut assistants = assistant_messages.iter().rev().copied();
        loop {
            let user = users.next();
            let assistant = assistants.next();
            if user.is_none() && assistant.is_none() {
                break;
            }
            if let Some(message) = user {
                paired.push(message);
            }
            if let Some(message) = assistant {
                paired.push(message);
            }
        }

        // Greedy selection stops permanently at the first message that does
        // not fit; later, smaller messages are not considered.
        let mut selected: Vec<ChatMessage> = Vec::new();
        for message in paired {
            let message_tokens = estimate_tokens(&message.content) + 4;
            if tokens_used + message_tokens <= effective_limit {
                selected.push(message.clone());
                tokens_used += message_tokens;
            } else {
                break;
            }
        }

        for message in &other_messages {
            let message_tokens = estimate_tokens(&message.content) + 4;
            if tokens_used + message_tokens <= effective_limit {
                selected.push((*message).clone());
                tokens_used += message_tokens;
            } else {
                break;
            }
        }

        // Rebuild the original relative order: system and important messages
        // keep their positions, survivors follow in input order. Membership
        // is tested by value, so duplicate-content messages are ambiguous
        // here; tracked as a known limitation.
        let mut original_order: Vec<ChatMessage> = Vec::new();
        let mut processed: HashSet<usize> = HashSet::new();

        for (i, message) in messages.iter().enumerate() {
            if message.role == "system" && include_system_prompt {
                original_order.push(message.clone());
                processed.insert(i);
            } else if important.contains(&i) {
                original_order.push(message.clone());
                processed.insert(i);
            }
        }

        for (i, message) in messages.iter().enumerate() {
            if !processed.contains(&i) && selected.contains(message) {
                original_order.push(message.clone());
            }
        }

        // Last tier: replace everything but system messages and the tail
        // with a synthesized summary.
        let final_tokens = estimate_messages_tokens(&original_order);
        if final_tokens > effective_limit {
            let summary = history_summary(&original_order);
            let preserved_count = original_order.len().min(4);

            let mut compacted: Vec<ChatMessage> = original_order
                .iter()
                .filter(|m| m.role == "system")
                .cloned()
                .collect();
            compacted.push(ChatMessage::new(
                "system",
                &format!("Earlier conversation summary: {}", summary),
            ));
            compacted.extend(
                original_order[original_order.len() - preserved_count..]
                    .iter()
                    .cloned(),
            );
            return compacted;
        }

        original_order
    }

    /// Prioritize arbitrary context items to fit within a token budget.
    ///
    /// Items are sorted by the priority function (then recency) when one is
    /// given, otherwise by recency alone with missing timestamps sorting
    /// oldest, and accepted greedily until the budget would overflow.
    pub fn prioritize_context(
        &self,
        items: &[Value],
        max_tokens: Option<i32>,
        priority_fn: Option<&dyn Fn(&Value) -> f64>,
    ) -> Vec<Value> {
        if items.is_empty() {
            return Vec::new();
        }

        // Default to 30% of the effective limit for side context.
        let max_tokens =
            max_tokens.unwrap_or_else(|| (self.effective_limit() as f64 * 0.3) as i32);

        let mut weighted: Vec<(&Value, i32)> = items
            .iter()
            .map(|item| {
                let serialized = match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (item, estimate_tokens(&serialized))
            })
            .collect();

        const OLDEST: &str = "0001-01-01T00:00:00";
        match priority_fn {
            Some(priority_fn) => weighted.sort_by(|a, b| {
                let priority_a = priority_fn(a.0);
                let priority_b = priority_fn(b.0);
                priority_b
                    .total_cmp(&priority_a)
                    .then_with(|| timestamp_of(b.0, "").cmp(timestamp_of(a.0, "")))
            }),
            None => {
                weighted.sort_by(|a, b| timestamp_of(b.0, OLDEST).cmp(timestamp_of(a.0, OLDEST)))
            }
        }

        let mut result: Vec<Value> = Vec::new();
        let mut tokens_used = 0;

        for (item, tokens) in weighted {
            if tokens_used + tokens <= max_tokens {
                result.push(item.clone());
                tokens_used += tokens;
            } else {
                break;
            }
        }

        result
    }
}

/// Timestamp string of an item, for recency ordering.
fn timestamp_of<'a>(item: &'a Value, default: &'a str) -> &'a str {
    item.get("timestamp")
        .and_then(Value::as_str)
        .unwrap_or(default)
}

/// Synthesize a one-line summary of dropped conversation history.
fn history_summary(messages: &[ChatMessage]) -> String {
    let mut points: Vec<String> = Vec::new();

    for message in messages {
        if message.role == "system" {
            continue;
        }
        let snippet = if message.content.chars().count() > 100 {
            let head: String = message.content.chars().take(100).collect();
            format!("{}...", head)
        } else {
            message.content.clone()
        };
        points.push(format!("{}: {}", message.role, snippet));
    }

    let mut summary = String::from("This conversation covered: ");
    summary.push_str(
        &points
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join("; "),
    );
    if points.len() > 3 {
        summary.push_str(&format!(" (plus {} more messages)", points.len() - 3));
    }

    summary
}

/// Truncate a conversation to fit a model's context window.
///
/// Convenience wrapper building a manager with the default buffer and the
/// stock model table.
pub fn truncate_conversation(
    messages: &[ChatMessage],
    model: &str,
    max_tokens: Option<i32>,
) -> ChorusResult<Vec<ChatMessage>> {
    let limits = ModelTokenLimits::default_limits();
    let mut budget = ContextBudget::for_model(model, &limits);
    if let Some(max_tokens) = max_tokens {
        budget.max_tokens = max_tokens;
    }
    let manager = ContextWindowManager::new(budget)?;
    Ok(manager.fit_to_window(messages, true, None))
}

// ============================================================================
// TESTS
// ============================================================================
