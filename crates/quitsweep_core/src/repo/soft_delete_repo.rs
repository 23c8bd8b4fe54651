//! Soft-delete writes for every table owned by one identity.
//!
//! # Invariants
//! - Only rows keyed by the given identity are touched. Stored identity text
//!   is compared lowercased, matching `Uuid::to_string`.
//! - Already soft-deleted rows keep their original `deleted_at`.
//! - Rows are never physically removed.

use crate::model::identity::UserId;
use crate::repo::RepoResult;
use rusqlite::{params, Connection};
use std::fmt::{Display, Formatter};

/// Tables a cascade soft-delete walks, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CascadeTable {
    Users,
    UserStates,
    UserSettings,
    UserEmails,
    UserLogs,
    UserAddresses,
    Associations,
    Records,
}

impl CascadeTable {
    pub const ALL: [CascadeTable; 8] = [
        Self::Users,
        Self::UserStates,
        Self::UserSettings,
        Self::UserEmails,
        Self::UserLogs,
        Self::UserAddresses,
        Self::Associations,
        Self::Records,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::UserStates => "user_states",
            Self::UserSettings => "user_settings",
            Self::UserEmails => "user_emails",
            Self::UserLogs => "user_logs",
            Self::UserAddresses => "user_addresses",
            Self::Associations => "associations",
            Self::Records => "records",
        }
    }
}

impl Display for CascadeTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Write access for identity-scoped soft deletes.
pub trait SoftDeleteRepository {
    /// Marks live rows of `table` belonging to `user_id` as deleted at
    /// `deleted_at` (epoch ms). Returns the number of rows changed.
    fn soft_delete_for_user(
        &self,
        table: CascadeTable,
        user_id: UserId,
        deleted_at: i64,
    ) -> RepoResult<usize>;
}

/// SQLite-backed soft-delete repository.
pub struct SqliteSoftDeleteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSoftDeleteRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SoftDeleteRepository for SqliteSoftDeleteRepository<'_> {
    fn soft_delete_for_user(
        &self,
        table: CascadeTable,
        user_id: UserId,
        deleted_at: i64,
    ) -> RepoResult<usize> {
        let changed = self.conn.execute(
            &soft_delete_sql(table),
            params![user_id.to_string(), deleted_at],
        )?;
        Ok(changed)
    }
}

fn soft_delete_sql(table: CascadeTable) -> String {
    match table {
        // Associations hold the identity inside the role map, under any role.
        CascadeTable::Associations => "UPDATE associations
             SET deleted_at = ?2,
                 updated_at = ?2
             WHERE deleted_at IS NULL
               AND EXISTS (
                    SELECT 1
                    FROM json_each(CASE WHEN json_valid(associations.users)
                                        THEN associations.users ELSE '{}' END) AS member
                    WHERE member.type = 'text'
                      AND lower(member.value) = ?1
               );"
        .to_string(),
        other => format!(
            "UPDATE {}
             SET deleted_at = ?2,
                 updated_at = ?2
             WHERE lower(user_id) = ?1
               AND deleted_at IS NULL;",
            other.table_name()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{soft_delete_sql, CascadeTable};

    #[test]
    fn every_statement_guards_live_rows_only() {
        for table in CascadeTable::ALL {
            let sql = soft_delete_sql(table);
            assert!(sql.contains(table.table_name()));
            assert!(sql.contains("deleted_at IS NULL"), "{table} must keep first delete");
        }
    }

    #[test]
    fn identity_keyed_tables_filter_by_user_id() {
        for table in CascadeTable::ALL {
            let sql = soft_delete_sql(table);
            if table == CascadeTable::Associations {
                assert!(sql.contains("json_each"));
            } else {
                assert!(sql.contains("WHERE lower(user_id) = ?1"));
            }
        }
    }
}
