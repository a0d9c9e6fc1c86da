//! Audit entry types.

use chrono::{DateTime, Utc};
use directory::{UserId, ZoneId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved action sentinel: the entry documents a rejected attempt, not a
/// completed mutation.
pub const ACTION_DENIED: &str = "denied";

/// A unique identifier for an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One immutable record of a state change or a denied attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: EntryId,
    pub zone_id: ZoneId,
    pub user_id: UserId,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        zone_id: ZoneId,
        user_id: UserId,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: EntryId::new(),
            zone_id,
            user_id,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            action: action.into(),
            old_value: None,
            new_value: None,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    /// Attach before/after snapshots of the mutated entity.
    pub fn with_change(
        mut self,
        old_value: impl Into<Option<serde_json::Value>>,
        new_value: impl Into<Option<serde_json::Value>>,
    ) -> Self {
        self.old_value = old_value.into();
        self.new_value = new_value.into();
        self
    }

    /// Attach requester metadata for forensics.
    pub fn with_request_info(
        mut self,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    /// A denial record: `action = "denied"`, reason captured in
    /// `new_value`.
    pub fn denial(
        zone_id: ZoneId,
        user_id: UserId,
        reason: &str,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self::new(zone_id, user_id, entity_type, entity_id, ACTION_DENIED)
            .with_change(None, Some(serde_json::json!({ "reason": reason })))
    }

    pub fn is_denial(&self) -> bool {
        self.action == ACTION_DENIED
    }
}
