//! Association lookups over the JSON role map in `associations.users`.
//!
//! # Invariants
//! - A match requires both roles to name the expected identities.
//! - Rows whose `users` column is not valid JSON never match and never fail
//!   the query.

use crate::model::association::{Association, AssociationKind};
use crate::model::identity::UserId;
use crate::repo::{parse_json, RepoResult};
use rusqlite::{params, Connection, Row};

const ASSOCIATION_SELECT_SQL: &str = "SELECT id, type, users, deleted_at FROM associations";

/// Read access to typed associations.
pub trait AssociationRepository {
    /// Most recent live association of `kind` linking `primary` and `secondary`
    /// in their respective roles.
    fn find_association(
        &self,
        kind: AssociationKind,
        primary: UserId,
        secondary: UserId,
    ) -> RepoResult<Option<Association>>;
}

/// SQLite-backed association repository.
pub struct SqliteAssociationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAssociationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AssociationRepository for SqliteAssociationRepository<'_> {
    fn find_association(
        &self,
        kind: AssociationKind,
        primary: UserId,
        secondary: UserId,
    ) -> RepoResult<Option<Association>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ASSOCIATION_SELECT_SQL}
             WHERE type = ?1
               AND deleted_at IS NULL
               AND lower(CASE WHEN json_valid(users) THEN json_extract(users, ?2) END) = ?3
               AND lower(CASE WHEN json_valid(users) THEN json_extract(users, ?4) END) = ?5
             ORDER BY created_at DESC, id DESC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query(params![
            kind.tag(),
            role_path(kind.primary.as_str()),
            primary.to_string(),
            role_path(kind.secondary.as_str()),
            secondary.to_string(),
        ])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_association_row(row)?)),
            None => Ok(None),
        }
    }
}

fn role_path(role: &str) -> String {
    format!("$.{role}")
}

fn parse_association_row(row: &Row<'_>) -> RepoResult<Association> {
    let tag: String = row.get("type")?;
    let users: String = row.get("users")?;
    let payload = parse_json(&users, "associations.users")?;
    Ok(Association::from_payload(
        row.get("id")?,
        &tag,
        &payload,
        row.get("deleted_at")?,
    )?)
}
