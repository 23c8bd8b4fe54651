//! Identity domain model.
//!
//! # Responsibility
//! - Define the person-scoped records the reconciliation flow reads.
//! - Expose soft-delete state as a nullable `deleted_at` marker.
//!
//! # Invariants
//! - `user_id` is the join key for every per-person table.
//! - A non-null `deleted_at` means logically absent, never physically gone.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Stable identifier for one person across every per-person table.
pub type UserId = Uuid;

/// Entity name that marks a data record as an intake record.
pub const INTAKE_ENTITY_NAME: &str = "Intake";

/// Core identity row from `users`.
///
/// Employers are stored as users too and are matched by `display_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub user_id: UserId,
    pub display_name: String,
    /// Epoch ms soft-delete marker.
    pub deleted_at: Option<i64>,
}

impl User {
    /// Returns whether this user is visible to scoped queries.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Email contact row from `user_emails`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: i64,
    pub user_id: UserId,
    pub email: String,
    pub verified: bool,
    pub deleted_at: Option<i64>,
}

/// Data record whose entity is [`INTAKE_ENTITY_NAME`].
///
/// Only read as a name oracle during resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeRecord {
    pub id: i64,
    pub user_id: UserId,
    /// Free-form metadata captured at intake time.
    pub meta: Value,
    pub created_at: i64,
}

impl IntakeRecord {
    /// First name captured at intake, when present as a string.
    pub fn first_name(&self) -> Option<&str> {
        self.meta.pointer("/first_name").and_then(Value::as_str)
    }

    /// Last name captured at intake, when present as a string.
    pub fn last_name(&self) -> Option<&str> {
        self.meta.pointer("/last_name").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::IntakeRecord;
    use serde_json::json;
    use uuid::Uuid;

    fn intake(meta: serde_json::Value) -> IntakeRecord {
        IntakeRecord {
            id: 1,
            user_id: Uuid::new_v4(),
            meta,
            created_at: 0,
        }
    }

    #[test]
    fn names_are_read_from_metadata() {
        let record = intake(json!({"first_name": "Jane", "last_name": "Doe", "age": 40}));
        assert_eq!(record.first_name(), Some("Jane"));
        assert_eq!(record.last_name(), Some("Doe"));
    }

    #[test]
    fn non_string_or_missing_names_are_none() {
        let record = intake(json!({"first_name": 7}));
        assert_eq!(record.first_name(), None);
        assert_eq!(record.last_name(), None);
    }
}
