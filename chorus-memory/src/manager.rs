//! Memory access manager.
//!
//! Validates memory request messages, enforces the access policy, and
//! dispatches operations to the storage collaborator. Failures never cross
//! the agent boundary as errors: every outcome is a response message whose
//! content carries `status: success` or `status: error`.

use std::sync::Arc;

use chorus_core::{
    new_message_id, AgentMessage, ChorusError, ChorusResult, MemoryCategory, MemoryOperation,
    MessagePriority, MessageType, PolicyError, Timestamp, ValidationError, MEMORY_SERVICE,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::policy::AccessPolicy;
use crate::store::{MemoryStore, SummaryEntry};

/// Default number of tagged entries returned by an emotional read.
const DEFAULT_READ_LIMIT: usize = 10;

/// Manages memory access for agents.
///
/// Holds the immutable access policy and a shared handle to the storage
/// collaborator; safe to use from concurrent requests.
pub struct MemoryAccessManager {
    store: Arc<dyn MemoryStore>,
    policy: AccessPolicy,
}

impl MemoryAccessManager {
    /// Create a manager over a storage collaborator and access policy.
    pub fn new(store: Arc<dyn MemoryStore>, policy: AccessPolicy) -> Self {
        Self { store, policy }
    }

    /// The access policy this manager enforces.
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Handle a memory access request message.
    ///
    /// Always returns a response message addressed to the request sender and
    /// carrying the request's message id; never propagates an error to the
    /// caller.
    pub async fn handle_request(&self, message: &AgentMessage) -> AgentMessage {
        match self.process(message).await {
            Ok(result) => self.respond(
                message,
                json!({
                    "status": "success",
                    "result": result,
                }),
            ),
            Err(err) => {
                let error_text = boundary_text(&err);
                tracing::error!(
                    message_id = %message.message_id,
                    sender = %message.sender,
                    user_id = %message.user_id,
                    error = %error_text,
                    "Error handling memory request"
                );
                self.respond(
                    message,
                    json!({
                        "status": "error",
                        "error": error_text,
                    }),
                )
            }
        }
    }

    /// Validate, authorize, and dispatch a request.
    async fn process(&self, message: &AgentMessage) -> ChorusResult<Value> {
        if message.message_type != MessageType::MemoryAccess {
            return Err(ValidationError::InvalidValue {
                field: "message_type".to_string(),
                reason: format!("expected memory_access message, got {}", message.message_type),
            }
            .into());
        }

        let content = message.content.as_object().ok_or_else(|| {
            ChorusError::from(ValidationError::RequiredFieldMissing {
                field: "content".to_string(),
            })
        })?;

        let operation_raw = required_field(content, "operation")?;
        let memory_type = required_field(content, "memory_type")?;
        let path = required_field(content, "path")?;

        let category = MemoryCategory::from_alias(memory_type)?;
        let operation = MemoryOperation::from_db_str(operation_raw)?;

        if !self.policy.check_access(&message.sender, category, operation) {
            tracing::warn!(
                agent = %message.sender,
                operation = %operation,
                category = %category,
                "Memory access denied by policy"
            );
            return Err(PolicyError::AccessDenied {
                agent: message.sender.clone(),
                operation,
                category,
            }
            .into());
        }

        let filters = content
            .get("filters")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let data = content.get("data").cloned();

        match operation {
            MemoryOperation::Read => {
                self.handle_read(&message.sender, memory_type, path, &message.user_id, filters)
                    .await
            }
            MemoryOperation::Write => {
                self.store
                    .write_memory(&message.user_id, &message.sender, memory_type, path, data.as_ref())
                    .await?;
                tracing::info!(
                    agent = %message.sender,
                    memory_type = %memory_type,
                    path = %path,
                    user_id = %message.user_id,
                    "Memory write request"
                );
                Ok(operation_receipt(memory_type, path))
            }
            MemoryOperation::Update => {
                self.store
                    .update_memory(&message.user_id, &message.sender, memory_type, path, data.as_ref())
                    .await?;
                tracing::info!(
                    agent = %message.sender,
                    memory_type = %memory_type,
                    path = %path,
                    user_id = %message.user_id,
                    "Memory update request"
                );
                Ok(operation_receipt(memory_type, path))
            }
            MemoryOperation::Delete => {
                self.store
                    .delete_memory(&message.user_id, &message.sender, memory_type, path)
                    .await?;
                tracing::info!(
                    agent = %message.sender,
                    memory_type = %memory_type,
                    path = %path,
                    user_id = %message.user_id,
                    "Memory delete request"
                );
                Ok(operation_receipt(memory_type, path))
            }
        }
    }

    /// Dispatch a read by memory type, applying the agent's scope cutoff as
    /// a default `since` filter unless the caller supplied one.
    async fn handle_read(
        &self,
        agent: &str,
        memory_type: &str,
        path: &str,
        user_id: &str,
        mut filters: Map<String, Value>,
    ) -> ChorusResult<Value> {
        if let Some(cutoff) = self.policy.scope_cutoff(agent) {
            if !filters.contains_key("since") {
                filters.insert("since".to_string(), json!(cutoff.to_rfc3339()));
            }
        }

        match memory_type.to_lowercase().as_str() {
            "emotional" | "emotional_state" => self.read_emotional(user_id, path, &filters).await,
            "general" => self.read_general(user_id, agent, path).await,
            "session" | "conversation" => Ok(session_read_stub()),
            other => Ok(generic_read_stub(other, user_id, path)),
        }
    }

    /// Read emotional memory: the most recent tagged entries newer than the
    /// cutoff, with optional drilling into the latest entry.
    async fn read_emotional(
        &self,
        user_id: &str,
        path: &str,
        filters: &Map<String, Value>,
    ) -> ChorusResult<Value> {
        let since = match filters.get("since") {
            Some(value) => Some(parse_since(value)?),
            None => None,
        };

        let limit = match filters.get("limit") {
            Some(value) => parse_limit(value)?,
            None => DEFAULT_READ_LIMIT,
        };

        let entries = self.store.tagged_summaries(user_id, since, limit).await?;
        let data: Vec<Value> = entries.iter().map(summary_entry_value).collect();

        match path {
            "recent" => Ok(data.first().cloned().unwrap_or(Value::Null)),
            "history" => Ok(Value::Array(data)),
            _ => {
                if let Some(field) = path.strip_prefix("recent.") {
                    if let Some(first) = data.first() {
                        return Ok(first.get(field).cloned().unwrap_or(Value::Null));
                    }
                }
                Ok(Value::Array(data))
            }
        }
    }

    /// Read general memory: the latest snapshot for (user, agent) with
    /// dot-path traversal over its parsed content.
    ///
    /// Any missing segment or parse failure yields null, never an error.
    async fn read_general(&self, user_id: &str, agent: &str, path: &str) -> ChorusResult<Value> {
        let Some(snapshot) = self.store.latest_snapshot(user_id, agent).await? else {
            return Ok(Value::Null);
        };

        if path == "all" {
            return Ok(Value::String(snapshot.content));
        }

        let Ok(parsed) = serde_json::from_str::<Value>(&snapshot.content) else {
            return Ok(Value::Null);
        };

        let mut current = &parsed;
        for part in path.split('.') {
            match current.as_object().and_then(|o| o.get(part)) {
                Some(next) => current = next,
                None => return Ok(Value::Null),
            }
        }
        Ok(current.clone())
    }

    /// Build a response message answering `request`.
    fn respond(&self, request: &AgentMessage, content: Value) -> AgentMessage {
        AgentMessage {
            message_id: new_message_id(),
            message_type: MessageType::Response,
            timestamp: Utc::now(),
            sender: MEMORY_SERVICE.to_string(),
            recipient: request.sender.clone(),
            content,
            session_id: request.session_id.clone(),
            user_id: request.user_id.clone(),
            request_id: Some(request.message_id),
            priority: MessagePriority::Normal,
            requires_response: false,
            ttl_seconds: None,
        }
    }
}

/// Extract a required non-empty string field from request content.
fn required_field<'a>(content: &'a Map<String, Value>, field: &str) -> ChorusResult<&'a str> {
    content
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ValidationError::RequiredFieldMissing {
                field: field.to_string(),
            }
            .into()
        })
}

/// Parse a `since` filter value as an RFC 3339 timestamp.
fn parse_since(value: &Value) -> ChorusResult<Timestamp> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            ValidationError::InvalidValue {
                field: "since".to_string(),
                reason: "expected an RFC 3339 timestamp".to_string(),
            }
            .into()
        })
}

/// Parse a `limit` filter value as a positive count.
fn parse_limit(value: &Value) -> ChorusResult<usize> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.parse::<usize>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ValidationError::InvalidValue {
            field: "limit".to_string(),
            reason: "expected a non-negative integer".to_string(),
        }
        .into()
    })
}

/// Flatten a summary entry for the wire.
fn summary_entry_value(entry: &SummaryEntry) -> Value {
    json!({
        "timestamp": entry.timestamp.to_rfc3339(),
        "emotional_tone": entry.emotional_tone,
        "confidence": entry.confidence,
        "summary": entry.summary,
        "tags": entry.tags,
    })
}

/// Receipt returned by successful mutation operations.
fn operation_receipt(memory_type: &str, path: &str) -> Value {
    json!({
        "success": true,
        "memory_type": memory_type,
        "path": path,
    })
}

// TODO: back session reads with the session store once it lands; the stub
// mirrors the shape the session collaborator will return.
fn session_read_stub() -> Value {
    json!({
        "messages": [
            {"role": "user", "content": "Hello"},
            {"role": "assistant", "content": "Hi there! How can I help you today?"},
        ],
        "topic": "general conversation",
        "session_id": "placeholder_session_id",
        "session_start": Utc::now().to_rfc3339(),
    })
}

fn generic_read_stub(memory_type: &str, user_id: &str, path: &str) -> Value {
    json!({
        "type": memory_type,
        "user_id": user_id,
        "path": path,
        "note": "This is a placeholder for generic memory access",
    })
}

/// Text carried across the agent boundary for each failure class.
fn boundary_text(err: &ChorusError) -> String {
    match err {
        ChorusError::Validation(e) => e.to_string(),
        ChorusError::Lookup(e) => e.to_string(),
        ChorusError::Policy(e) => e.to_string(),
        ChorusError::Storage(e) => e.to_string(),
        ChorusError::Config(e) => e.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySnapshot;
    use async_trait::async_trait;
    use chorus_core::{memory_request_message, MemoryAccessRequest, StorageError};
    use chrono::Duration;
    use std::sync::Mutex;

    /// In-memory storage double recording the parameters it was called with.
    #[derive(Default)]
    struct StubStore {
        snapshot: Option<MemorySnapshot>,
        summaries: Vec<SummaryEntry>,
        fail_with: Option<String>,
        seen_since: Mutex<Option<Option<Timestamp>>>,
        seen_limit: Mutex<Option<usize>>,
        writes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MemoryStore for StubStore {
        async fn latest_snapshot(
            &self,
            _user_id: &str,
            _agent: &str,
        ) -> ChorusResult<Option<MemorySnapshot>> {
            if let Some(reason) = &self.fail_with {
                return Err(StorageError::QueryFailed {
                    reason: reason.clone(),
                }
                .into());
            }
            Ok(self.snapshot.clone())
        }

        async fn tagged_summaries(
            &self,
            _user_id: &str,
            since: Option<Timestamp>,
            limit: usize,
        ) -> ChorusResult<Vec<SummaryEntry>> {
            if let Some(reason) = &self.fail_with {
                return Err(StorageError::QueryFailed {
                    reason: reason.clone(),
                }
                .into());
            }
            *self.seen_since.lock().unwrap() = Some(since);
            *self.seen_limit.lock().unwrap() = Some(limit);
            Ok(self.summaries.iter().take(limit).cloned().collect())
        }

        async fn write_memory(
            &self,
            _user_id: &str,
            agent: &str,
            memory_type: &str,
            path: &str,
            _data: Option<&Value>,
        ) -> ChorusResult<()> {
            self.writes
                .lock()
                .unwrap()
                .push(format!("write:{agent}:{memory_type}:{path}"));
            Ok(())
        }

        async fn update_memory(
            &self,
            _user_id: &str,
            agent: &str,
            memory_type: &str,
            path: &str,
            _data: Option<&Value>,
        ) -> ChorusResult<()> {
            self.writes
                .lock()
                .unwrap()
                .push(format!("update:{agent}:{memory_type}:{path}"));
            Ok(())
        }

        async fn delete_memory(
            &self,
            _user_id: &str,
            agent: &str,
            memory_type: &str,
            path: &str,
        ) -> ChorusResult<()> {
            self.writes
                .lock()
                .unwrap()
                .push(format!("delete:{agent}:{memory_type}:{path}"));
            Ok(())
        }
    }

    fn entry(tone: &str, summary: &str, age_hours: i64) -> SummaryEntry {
        SummaryEntry {
            timestamp: Utc::now() - Duration::hours(age_hours),
            emotional_tone: Some(tone.to_string()),
            confidence: Some(0.8),
            summary: summary.to_string(),
            tags: vec!["session".to_string()],
        }
    }

    fn manager_with(store: StubStore) -> (MemoryAccessManager, Arc<StubStore>) {
        let stub = Arc::new(store);
        let manager = MemoryAccessManager::new(stub.clone(), AccessPolicy::default_policy());
        (manager, stub)
    }

    fn request(sender: &str, operation: &str, memory_type: &str, path: &str) -> AgentMessage {
        let mut request = MemoryAccessRequest::read(memory_type, path);
        request.operation = MemoryOperation::from_db_str(operation)
            .unwrap_or(MemoryOperation::Read);
        memory_request_message(sender, request, "session_1", "user_1").unwrap()
    }

    #[tokio::test]
    async fn test_unknown_memory_type_is_error_response_not_panic() {
        let (manager, _store) = manager_with(StubStore::default());
        let message = request("EchoMind", "read", "unknown_type", "all");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.message_type, MessageType::Response);
        assert_eq!(response.content["status"], "error");
        assert_eq!(
            response.content["error"],
            "unknown memory type: unknown_type"
        );
    }

    #[tokio::test]
    async fn test_response_answers_the_request() {
        let (manager, _store) = manager_with(StubStore::default());
        let message = request("EchoMind", "read", "general", "all");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.sender, MEMORY_SERVICE);
        assert_eq!(response.recipient, "EchoMind");
        assert_eq!(response.request_id, Some(message.message_id));
        assert_eq!(response.session_id, "session_1");
        assert_eq!(response.user_id, "user_1");
    }

    #[tokio::test]
    async fn test_wrong_message_type_is_error_response() {
        let (manager, _store) = manager_with(StubStore::default());
        let message = AgentMessage::builder(
            MessageType::Query,
            "EchoMind",
            MEMORY_SERVICE,
            json!({"operation": "read", "memory_type": "general", "path": "all"}),
            "session_1",
            "user_1",
        )
        .build()
        .unwrap();

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["status"], "error");
        let text = response.content["error"].as_str().unwrap();
        assert!(text.contains("expected memory_access message"));
    }

    #[tokio::test]
    async fn test_missing_fields_is_error_response() {
        let (manager, _store) = manager_with(StubStore::default());
        let message = AgentMessage::builder(
            MessageType::MemoryAccess,
            "EchoMind",
            MEMORY_SERVICE,
            json!({"operation": "read", "path": "all"}),
            "session_1",
            "user_1",
        )
        .build()
        .unwrap();

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["status"], "error");
        assert_eq!(
            response.content["error"],
            "invalid memory request: missing required fields"
        );
    }

    #[tokio::test]
    async fn test_empty_field_counts_as_missing() {
        let (manager, _store) = manager_with(StubStore::default());
        let message = AgentMessage::builder(
            MessageType::MemoryAccess,
            "EchoMind",
            MEMORY_SERVICE,
            json!({"operation": "read", "memory_type": "general", "path": ""}),
            "session_1",
            "user_1",
        )
        .build()
        .unwrap();

        let response = manager.handle_request(&message).await;
        assert_eq!(
            response.content["error"],
            "invalid memory request: missing required fields"
        );
    }

    #[tokio::test]
    async fn test_invalid_operation_is_error_response() {
        let (manager, _store) = manager_with(StubStore::default());
        let message = AgentMessage::builder(
            MessageType::MemoryAccess,
            "MemoryService",
            MEMORY_SERVICE,
            json!({"operation": "merge", "memory_type": "general", "path": "all"}),
            "session_1",
            "user_1",
        )
        .build()
        .unwrap();

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["status"], "error");
        assert_eq!(response.content["error"], "invalid operation: merge");
    }

    #[tokio::test]
    async fn test_policy_denial_text() {
        let (manager, _store) = manager_with(StubStore::default());
        let message = request("Bridge", "read", "medical", "all");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["status"], "error");
        assert_eq!(
            response.content["error"],
            "access denied: Bridge cannot read medical memory"
        );
    }

    #[tokio::test]
    async fn test_emotional_read_recent_returns_latest_entry() {
        let store = StubStore {
            summaries: vec![entry("calm", "latest", 1), entry("anxious", "older", 5)],
            ..Default::default()
        };
        let (manager, _store) = manager_with(store);
        let message = request("Therapist", "read", "emotional", "recent");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["status"], "success");
        assert_eq!(response.content["result"]["emotional_tone"], "calm");
        assert_eq!(response.content["result"]["summary"], "latest");
    }

    #[tokio::test]
    async fn test_emotional_read_history_returns_all_entries() {
        let store = StubStore {
            summaries: vec![entry("calm", "latest", 1), entry("anxious", "older", 5)],
            ..Default::default()
        };
        let (manager, _store) = manager_with(store);
        let message = request("Therapist", "read", "emotional_state", "history");

        let response = manager.handle_request(&message).await;

        let result = response.content["result"].as_array().unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[1]["emotional_tone"], "anxious");
    }

    #[tokio::test]
    async fn test_emotional_read_drills_into_recent_field() {
        let store = StubStore {
            summaries: vec![entry("calm", "latest", 1)],
            ..Default::default()
        };
        let (manager, _store) = manager_with(store);
        let message = request("Therapist", "read", "emotional", "recent.emotional_tone");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["result"], "calm");
    }

    #[tokio::test]
    async fn test_emotional_read_missing_field_is_null() {
        let store = StubStore {
            summaries: vec![entry("calm", "latest", 1)],
            ..Default::default()
        };
        let (manager, _store) = manager_with(store);
        let message = request("Therapist", "read", "emotional", "recent.nonexistent");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["status"], "success");
        assert_eq!(response.content["result"], Value::Null);
    }

    #[tokio::test]
    async fn test_scope_cutoff_applied_as_default_since() {
        let store = StubStore {
            summaries: vec![entry("calm", "latest", 1)],
            ..Default::default()
        };
        let (manager, stub) = manager_with(store);
        // Bridge's scope is Recent (30 days).
        let message = request("Bridge", "read", "emotional", "history");

        let response = manager.handle_request(&message).await;
        assert_eq!(response.content["status"], "success");

        let since = stub.seen_since.lock().unwrap().unwrap().unwrap();
        let age = Utc::now() - since;
        assert!(age >= Duration::days(30) && age < Duration::days(31));
        assert_eq!(stub.seen_limit.lock().unwrap().unwrap(), DEFAULT_READ_LIMIT);
    }

    #[tokio::test]
    async fn test_caller_supplied_since_and_limit_win() {
        let store = StubStore {
            summaries: vec![entry("calm", "a", 1), entry("calm", "b", 2)],
            ..Default::default()
        };
        let (manager, _store) = manager_with(store);

        let since = (Utc::now() - Duration::days(2)).to_rfc3339();
        let mut filters = Map::new();
        filters.insert("since".to_string(), json!(since));
        filters.insert("limit".to_string(), json!(1));
        let request = MemoryAccessRequest::read("emotional", "history").with_filters(filters);
        let message =
            memory_request_message("Therapist", request, "session_1", "user_1").unwrap();

        let response = manager.handle_request(&message).await;

        let result = response.content["result"].as_array().unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_since_is_error_response() {
        let store = StubStore {
            summaries: vec![entry("calm", "a", 1)],
            ..Default::default()
        };
        let (manager, _store) = manager_with(store);

        let mut filters = Map::new();
        filters.insert("since".to_string(), json!("not-a-timestamp"));
        let request = MemoryAccessRequest::read("emotional", "history").with_filters(filters);
        let message =
            memory_request_message("Therapist", request, "session_1", "user_1").unwrap();

        let response = manager.handle_request(&message).await;
        assert_eq!(response.content["status"], "error");
    }

    #[tokio::test]
    async fn test_general_read_traverses_dot_path() {
        let store = StubStore {
            snapshot: Some(MemorySnapshot {
                agent: "EchoMind".to_string(),
                content: r#"{"preferences": {"tone": "warm"}, "goals": ["sleep"]}"#.to_string(),
                updated_at: Utc::now(),
            }),
            ..Default::default()
        };
        let (manager, _store) = manager_with(store);
        let message = request("EchoMind", "read", "general", "preferences.tone");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["result"], "warm");
    }

    #[tokio::test]
    async fn test_general_read_missing_segment_is_null() {
        let store = StubStore {
            snapshot: Some(MemorySnapshot {
                agent: "EchoMind".to_string(),
                content: r#"{"preferences": {"tone": "warm"}}"#.to_string(),
                updated_at: Utc::now(),
            }),
            ..Default::default()
        };
        let (manager, _store) = manager_with(store);
        let message = request("EchoMind", "read", "general", "preferences.color.hue");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["status"], "success");
        assert_eq!(response.content["result"], Value::Null);
    }

    #[tokio::test]
    async fn test_general_read_unparseable_content_is_null() {
        let store = StubStore {
            snapshot: Some(MemorySnapshot {
                agent: "EchoMind".to_string(),
                content: "free-form notes, not json".to_string(),
                updated_at: Utc::now(),
            }),
            ..Default::default()
        };
        let (manager, _store) = manager_with(store);
        let message = request("EchoMind", "read", "general", "preferences.tone");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["result"], Value::Null);
    }

    #[tokio::test]
    async fn test_general_read_all_returns_raw_content() {
        let store = StubStore {
            snapshot: Some(MemorySnapshot {
                agent: "EchoMind".to_string(),
                content: "free-form notes".to_string(),
                updated_at: Utc::now(),
            }),
            ..Default::default()
        };
        let (manager, _store) = manager_with(store);
        let message = request("EchoMind", "read", "general", "all");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["result"], "free-form notes");
    }

    #[tokio::test]
    async fn test_general_read_without_snapshot_is_null() {
        let (manager, _store) = manager_with(StubStore::default());
        let message = request("EchoMind", "read", "general", "preferences");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["status"], "success");
        assert_eq!(response.content["result"], Value::Null);
    }

    #[tokio::test]
    async fn test_session_read_returns_placeholder_shape() {
        let (manager, _store) = manager_with(StubStore::default());
        let message = request("EchoMind", "read", "session", "messages");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["status"], "success");
        assert!(response.content["result"]["messages"].is_array());
        assert_eq!(response.content["result"]["topic"], "general conversation");
    }

    #[tokio::test]
    async fn test_write_enforces_policy_and_forwards() {
        let (manager, stub) = manager_with(StubStore::default());
        let request = MemoryAccessRequest::write("therapeutic", "notes.session_4", json!("note"));
        let message =
            memory_request_message("Therapist", request, "session_1", "user_1").unwrap();

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["status"], "success");
        assert_eq!(response.content["result"]["success"], true);
        assert_eq!(response.content["result"]["memory_type"], "therapeutic");

        let writes = stub.writes.lock().unwrap();
        assert_eq!(
            writes.as_slice(),
            ["write:Therapist:therapeutic:notes.session_4"]
        );
    }

    #[tokio::test]
    async fn test_delete_requires_admin() {
        let (manager, _store) = manager_with(StubStore::default());
        let request = MemoryAccessRequest {
            operation: MemoryOperation::Delete,
            memory_type: "general".to_string(),
            path: "all".to_string(),
            data: None,
            filters: None,
        };
        let message =
            memory_request_message("Therapist", request, "session_1", "user_1").unwrap();

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["status"], "error");
        assert_eq!(
            response.content["error"],
            "access denied: Therapist cannot delete general memory"
        );
    }

    #[tokio::test]
    async fn test_storage_failure_becomes_error_response() {
        let store = StubStore {
            fail_with: Some("connection reset".to_string()),
            ..Default::default()
        };
        let (manager, _store) = manager_with(store);
        let message = request("EchoMind", "read", "general", "all");

        let response = manager.handle_request(&message).await;

        assert_eq!(response.content["status"], "error");
        let text = response.content["error"].as_str().unwrap();
        assert!(text.contains("connection reset"));
    }
}
