//! Storage collaborator boundary.
//!
//! The core issues only these logical queries; raw storage commands, schema,
//! and transactions belong to the implementing collaborator. Concurrent
//! requests for the same (user, agent) carry no cross-request ordering
//! guarantee; callers needing read-after-write consistency must serialize at
//! the storage layer.

use async_trait::async_trait;
use chorus_core::{ChorusResult, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Latest persisted memory snapshot for a (user, agent) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Agent the snapshot belongs to
    pub agent: String,
    /// Snapshot content; dot-path reads parse this as JSON
    pub content: String,
    /// When the snapshot was last updated
    pub updated_at: Timestamp,
}

/// A tagged summary entry, most-recent-first in query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// When the summary was recorded
    pub timestamp: Timestamp,
    /// Dominant emotional tone, when assessed
    pub emotional_tone: Option<String>,
    /// Confidence of the assessment
    pub confidence: Option<f32>,
    /// Summary text
    pub summary: String,
    /// Tags attached to the entry
    pub tags: Vec<String>,
}

/// Async storage trait consumed by the memory access manager.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Latest memory snapshot for (user, agent), if any.
    async fn latest_snapshot(
        &self,
        user_id: &str,
        agent: &str,
    ) -> ChorusResult<Option<MemorySnapshot>>;

    /// Tagged summary entries for a user, most recent first, optionally
    /// bounded below by `since` and limited to `limit` entries.
    async fn tagged_summaries(
        &self,
        user_id: &str,
        since: Option<Timestamp>,
        limit: usize,
    ) -> ChorusResult<Vec<SummaryEntry>>;

    /// Persist new memory content.
    async fn write_memory(
        &self,
        user_id: &str,
        agent: &str,
        memory_type: &str,
        path: &str,
        data: Option<&Value>,
    ) -> ChorusResult<()>;

    /// Modify existing memory content.
    async fn update_memory(
        &self,
        user_id: &str,
        agent: &str,
        memory_type: &str,
        path: &str,
        data: Option<&Value>,
    ) -> ChorusResult<()>;

    /// Remove memory content.
    async fn delete_memory(
        &self,
        user_id: &str,
        agent: &str,
        memory_type: &str,
        path: &str,
    ) -> ChorusResult<()>;
}
