//! Identity lookups: contacts, intake records and users.
//!
//! # Invariants
//! - Email matching is case-insensitive.
//! - `user_id` columns are compared lowercased; `Uuid::to_string` is lowercase.
//! - When several live rows qualify, the most recent (`created_at`, then `id`)
//!   wins; ties on contacts prefer verified emails.

use crate::model::identity::{ContactRecord, IntakeRecord, User, UserId, INTAKE_ENTITY_NAME};
use crate::repo::{parse_bool, parse_json, parse_uuid, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Read-only identity lookups used by resolution and verification.
pub trait IdentityRepository {
    /// Live contact record for `email`.
    fn find_contact_by_email(&self, email: &str) -> RepoResult<Option<ContactRecord>>;
    /// Most recent live intake record for `user_id`.
    fn latest_intake_record(&self, user_id: UserId) -> RepoResult<Option<IntakeRecord>>;
    /// Live users whose display name equals `display_name`, oldest first.
    fn find_users_by_display_name(&self, display_name: &str) -> RepoResult<Vec<User>>;
    /// One user by id; `include_deleted` reads past the soft-delete scope.
    fn get_user(&self, user_id: UserId, include_deleted: bool) -> RepoResult<Option<User>>;
}

/// SQLite-backed identity repository.
pub struct SqliteIdentityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteIdentityRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl IdentityRepository for SqliteIdentityRepository<'_> {
    fn find_contact_by_email(&self, email: &str) -> RepoResult<Option<ContactRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, email, verified, deleted_at
             FROM user_emails
             WHERE email = ?1 COLLATE NOCASE
               AND deleted_at IS NULL
             ORDER BY verified DESC, created_at DESC, id DESC
             LIMIT 1;",
        )?;
        let mut rows = stmt.query([email])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_contact_row(row)?)),
            None => Ok(None),
        }
    }

    fn latest_intake_record(&self, user_id: UserId) -> RepoResult<Option<IntakeRecord>> {
        let found = self
            .conn
            .query_row(
                "SELECT r.id, r.meta, r.created_at
                 FROM records r
                 JOIN entities e ON e.id = r.entity_id
                 WHERE lower(r.user_id) = ?1
                   AND e.name = ?2
                   AND r.deleted_at IS NULL
                   AND e.deleted_at IS NULL
                 ORDER BY r.created_at DESC, r.id DESC
                 LIMIT 1;",
                params![user_id.to_string(), INTAKE_ENTITY_NAME],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, meta_text, created_at)) = found else {
            return Ok(None);
        };
        Ok(Some(IntakeRecord {
            id,
            user_id,
            meta: parse_json(&meta_text, "records.meta")?,
            created_at,
        }))
    }

    fn find_users_by_display_name(&self, display_name: &str) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, display_name, deleted_at
             FROM users
             WHERE display_name = ?1
               AND deleted_at IS NULL
             ORDER BY created_at ASC, id ASC;",
        )?;
        let mut rows = stmt.query([display_name])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn get_user(&self, user_id: UserId, include_deleted: bool) -> RepoResult<Option<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, display_name, deleted_at
             FROM users
             WHERE lower(user_id) = ?1
               AND (?2 = 1 OR deleted_at IS NULL);",
        )?;
        let mut rows = stmt.query(params![user_id.to_string(), i64::from(include_deleted)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }
}

fn parse_contact_row(row: &Row<'_>) -> RepoResult<ContactRecord> {
    let user_id: String = row.get("user_id")?;
    Ok(ContactRecord {
        id: row.get("id")?,
        user_id: parse_uuid(&user_id, "user_emails.user_id")?,
        email: row.get("email")?,
        verified: parse_bool(row.get("verified")?, "user_emails.verified")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let user_id: String = row.get("user_id")?;
    Ok(User {
        id: row.get("id")?,
        user_id: parse_uuid(&user_id, "users.user_id")?,
        display_name: row.get("display_name")?,
        deleted_at: row.get("deleted_at")?,
    })
}
