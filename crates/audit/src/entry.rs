//! Audit log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use gasflow_auth::Actor;

/// One record of a mutating action. Written in the same atomic unit as the
/// mutation it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor: Actor,
    /// Human-readable action description, e.g. "distribution.collection".
    pub action: String,
    /// Optional before/after payload.
    pub detail: Option<JsonValue>,
    /// Server timestamp, assigned when the entry is built.
    pub recorded_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn record(actor: Actor, action: impl Into<String>, detail: Option<JsonValue>) -> Self {
        Self {
            id: Uuid::now_v7(),
            actor,
            action: action.into(),
            detail,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasflow_auth::Role;
    use gasflow_core::UserId;
    use serde_json::json;

    #[test]
    fn record_stamps_actor_and_time() {
        let actor = Actor::new(UserId::new(), Role::Admin);
        let before = Utc::now();
        let entry = AuditLogEntry::record(
            actor,
            "distribution.collection",
            Some(json!({"before": 100, "after": 70})),
        );
        assert_eq!(entry.actor, actor);
        assert_eq!(entry.action, "distribution.collection");
        assert!(entry.recorded_at >= before);
    }
}
