#![allow(dead_code)]

use quitsweep_core::db::open_db_in_memory;
use quitsweep_core::{Association, AssociationKind, UserId, INTAKE_ENTITY_NAME};
use rusqlite::{params, Connection};
use serde_json::json;
use uuid::Uuid;

pub const PER_USER_TABLES: [&str; 7] = [
    "users",
    "user_states",
    "user_settings",
    "user_emails",
    "user_logs",
    "user_addresses",
    "records",
];

pub const ALL_TABLES: [&str; 10] = [
    "users",
    "user_states",
    "user_settings",
    "user_emails",
    "user_logs",
    "user_addresses",
    "associations",
    "types",
    "entities",
    "records",
];

/// Jane Doe employed by Acme, with one row in every per-user table.
pub struct JaneFixture {
    pub jane: UserId,
    pub acme: UserId,
}

pub fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

pub fn seed_jane(conn: &Connection) -> JaneFixture {
    let jane = insert_user(conn, "Jane Doe");
    let acme = insert_user(conn, "Acme");
    insert_email(conn, jane, "jane@x.com");
    insert_intake(conn, jane, "Jane", "Doe");
    insert_profile(conn, jane);
    insert_association(conn, AssociationKind::PARTICIPANT_EMPLOYER, jane, acme);
    JaneFixture { jane, acme }
}

pub fn insert_user(conn: &Connection, display_name: &str) -> UserId {
    let user_id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO users (user_id, display_name) VALUES (?1, ?2);",
        params![user_id.to_string(), display_name],
    )
    .unwrap();
    user_id
}

pub fn insert_email(conn: &Connection, user_id: UserId, email: &str) {
    conn.execute(
        "INSERT INTO user_emails (user_id, email, verified) VALUES (?1, ?2, 1);",
        params![user_id.to_string(), email],
    )
    .unwrap();
}

pub fn intake_entity_id(conn: &Connection) -> i64 {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM entities WHERE name = ?1;",
            [INTAKE_ENTITY_NAME],
            |row| row.get(0),
        )
        .ok();
    if let Some(id) = existing {
        return id;
    }
    conn.execute("INSERT INTO types (name) VALUES ('Clinical');", [])
        .unwrap();
    let type_id = conn.last_insert_rowid();
    conn.execute(
        "INSERT INTO entities (name, type_id) VALUES (?1, ?2);",
        params![INTAKE_ENTITY_NAME, type_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn insert_intake_meta(conn: &Connection, user_id: UserId, meta: &serde_json::Value) -> i64 {
    let entity_id = intake_entity_id(conn);
    conn.execute(
        "INSERT INTO records (user_id, entity_id, meta) VALUES (?1, ?2, ?3);",
        params![user_id.to_string(), entity_id, meta.to_string()],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn insert_intake(conn: &Connection, user_id: UserId, first_name: &str, last_name: &str) -> i64 {
    insert_intake_meta(
        conn,
        user_id,
        &json!({"first_name": first_name, "last_name": last_name}),
    )
}

/// One row each in states, settings, logs and addresses.
pub fn insert_profile(conn: &Connection, user_id: UserId) {
    let id = user_id.to_string();
    conn.execute(
        "INSERT INTO user_states (user_id, type, state) VALUES (?1, 'program', 'active');",
        [&id],
    )
    .unwrap();
    conn.execute("INSERT INTO user_settings (user_id) VALUES (?1);", [&id])
        .unwrap();
    conn.execute(
        "INSERT INTO user_logs (user_id, name, message) VALUES (?1, 'login', 'ok');",
        [&id],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO user_addresses (user_id, city) VALUES (?1, 'Springfield');",
        [&id],
    )
    .unwrap();
}

pub fn insert_association(
    conn: &Connection,
    kind: AssociationKind,
    primary: UserId,
    secondary: UserId,
) -> i64 {
    let payload = Association::new(0, kind, primary, secondary).payload();
    conn.execute(
        "INSERT INTO associations (type, users) VALUES (?1, ?2);",
        params![kind.tag(), payload.to_string()],
    )
    .unwrap();
    conn.last_insert_rowid()
}

/// Rows per table, for before/after mutation checks.
pub fn deleted_snapshot(conn: &Connection) -> Vec<(String, i64, i64)> {
    ALL_TABLES
        .iter()
        .map(|table| {
            let (total, deleted): (i64, i64) = conn
                .query_row(
                    &format!(
                        "SELECT COUNT(*), COUNT(deleted_at) FROM {table};"
                    ),
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .unwrap();
            (table.to_string(), total, deleted)
        })
        .collect()
}

/// `deleted_at` values of every row `user_id` owns in `table`.
pub fn deleted_at_values(conn: &Connection, table: &str, user_id: UserId) -> Vec<Option<i64>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT deleted_at FROM {table} WHERE lower(user_id) = ?1 ORDER BY id;"
        ))
        .unwrap();
    let rows = stmt
        .query_map([user_id.to_string()], |row| row.get(0))
        .unwrap();
    rows.map(Result::unwrap).collect()
}

pub fn association_deleted_at(conn: &Connection, id: i64) -> Option<i64> {
    conn.query_row(
        "SELECT deleted_at FROM associations WHERE id = ?1;",
        [id],
        |row| row.get(0),
    )
    .unwrap()
}

/// Makes every UPDATE on `table` fail.
pub fn fail_updates_on(conn: &Connection, table: &str) {
    conn.execute_batch(&format!(
        "CREATE TRIGGER fail_{table}_update BEFORE UPDATE ON {table}
         BEGIN
             SELECT RAISE(ABORT, 'injected failure on {table}');
         END;"
    ))
    .unwrap();
}

/// Rewrites `user_id` in `table` to uppercase text for `user_id`'s rows.
pub fn uppercase_user_id(conn: &Connection, table: &str, user_id: UserId) {
    let changed = conn
        .execute(
            &format!("UPDATE {table} SET user_id = upper(user_id) WHERE user_id = ?1;"),
            [user_id.to_string()],
        )
        .unwrap();
    assert!(changed > 0, "no {table} rows for {user_id}");
}

/// Makes COMMIT fail after any UPDATE on `table`, through a deferred
/// foreign key that is left dangling.
pub fn fail_commit_after_update_on(conn: &Connection, table: &str) {
    conn.execute_batch(&format!(
        "CREATE TABLE commit_guard_parent (id INTEGER PRIMARY KEY);
         CREATE TABLE commit_guard (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             parent_id INTEGER NOT NULL
                 REFERENCES commit_guard_parent (id) DEFERRABLE INITIALLY DEFERRED
         );
         CREATE TRIGGER dangle_{table}_update AFTER UPDATE ON {table}
         BEGIN
             INSERT INTO commit_guard (parent_id) VALUES (-1);
         END;"
    ))
    .unwrap();
}
