mod common;

use common::{
    association_deleted_at, deleted_at_values, deleted_snapshot, fail_updates_on,
    insert_association, insert_email, insert_intake, insert_profile, insert_user, seed_jane,
    setup, uppercase_user_id, PER_USER_TABLES,
};
use quitsweep_core::{
    AssociationKind, AssociationVerifier, CascadeExecutor, CascadeTable, DeletionAuthorization,
    IdentityRepository, SqliteAssociationRepository, SqliteIdentityRepository,
    SqliteSoftDeleteRepository, UserId,
};
use rusqlite::Connection;

const DELETED_AT: i64 = 1_700_000_000_000;

fn authorize(conn: &Connection, participant: UserId, company: &str) -> DeletionAuthorization {
    AssociationVerifier::new(
        SqliteIdentityRepository::new(conn),
        SqliteAssociationRepository::new(conn),
    )
    .verify(participant, company)
    .unwrap()
}

#[test]
fn cascade_marks_every_owned_row_deleted() {
    let conn = setup();
    let fixture = seed_jane(&conn);
    let authorization = authorize(&conn, fixture.jane, "Acme");

    let summary = CascadeExecutor::new(SqliteSoftDeleteRepository::new(&conn))
        .soft_delete_all(&authorization, DELETED_AT)
        .unwrap();

    assert_eq!(summary.user_id, fixture.jane);
    assert_eq!(summary.tables_processed(), CascadeTable::ALL.len());
    assert_eq!(summary.tables_affected(), CascadeTable::ALL.len());
    assert_eq!(summary.rows_in(CascadeTable::Associations), 1);
    for table in PER_USER_TABLES {
        let values = deleted_at_values(&conn, table, fixture.jane);
        assert!(!values.is_empty(), "no rows seeded in {table}");
        assert!(
            values.iter().all(|value| *value == Some(DELETED_AT)),
            "{table} not fully soft-deleted: {values:?}"
        );
    }
}

#[test]
fn deleted_user_stays_retrievable_with_include_deleted() {
    let conn = setup();
    let fixture = seed_jane(&conn);
    let authorization = authorize(&conn, fixture.jane, "Acme");
    CascadeExecutor::new(SqliteSoftDeleteRepository::new(&conn))
        .soft_delete_all(&authorization, DELETED_AT)
        .unwrap();

    let repo = SqliteIdentityRepository::new(&conn);
    assert!(repo.get_user(fixture.jane, false).unwrap().is_none());
    let user = repo.get_user(fixture.jane, true).unwrap().unwrap();
    assert_eq!(user.deleted_at, Some(DELETED_AT));
    assert!(!user.is_active());
}

#[test]
fn cascade_leaves_other_identities_untouched() {
    let conn = setup();
    let fixture = seed_jane(&conn);
    let john = insert_user(&conn, "John Roe");
    insert_email(&conn, john, "john@x.com");
    insert_intake(&conn, john, "John", "Roe");
    insert_profile(&conn, john);
    let johns_job = insert_association(
        &conn,
        AssociationKind::PARTICIPANT_EMPLOYER,
        john,
        fixture.acme,
    );

    let authorization = authorize(&conn, fixture.jane, "Acme");
    CascadeExecutor::new(SqliteSoftDeleteRepository::new(&conn))
        .soft_delete_all(&authorization, DELETED_AT)
        .unwrap();

    for table in PER_USER_TABLES {
        assert!(deleted_at_values(&conn, table, john)
            .iter()
            .all(Option::is_none));
    }
    assert_eq!(association_deleted_at(&conn, johns_job), None);
    let employer = SqliteIdentityRepository::new(&conn)
        .get_user(fixture.acme, false)
        .unwrap();
    assert!(employer.is_some(), "employer must stay live");
}

#[test]
fn associations_are_matched_under_any_role() {
    let conn = setup();
    let fixture = seed_jane(&conn);
    let bob = insert_user(&conn, "Bob");
    // Jane appears as the employer here.
    let as_employer =
        insert_association(&conn, AssociationKind::PARTICIPANT_EMPLOYER, bob, fixture.jane);

    let authorization = authorize(&conn, fixture.jane, "Acme");
    let summary = CascadeExecutor::new(SqliteSoftDeleteRepository::new(&conn))
        .soft_delete_all(&authorization, DELETED_AT)
        .unwrap();

    assert_eq!(summary.rows_in(CascadeTable::Associations), 2);
    assert_eq!(association_deleted_at(&conn, as_employer), Some(DELETED_AT));
}

#[test]
fn reapplying_cascade_keeps_first_timestamp() {
    let conn = setup();
    let fixture = seed_jane(&conn);
    let authorization = authorize(&conn, fixture.jane, "Acme");
    let executor = CascadeExecutor::new(SqliteSoftDeleteRepository::new(&conn));

    executor.soft_delete_all(&authorization, DELETED_AT).unwrap();
    let again = executor
        .soft_delete_all(&authorization, DELETED_AT + 60_000)
        .unwrap();

    assert_eq!(again.rows_affected(), 0);
    for table in PER_USER_TABLES {
        assert!(deleted_at_values(&conn, table, fixture.jane)
            .iter()
            .all(|value| *value == Some(DELETED_AT)));
    }
}

#[test]
fn failing_table_rolls_back_whole_cascade() {
    let mut conn = setup();
    let fixture = seed_jane(&conn);
    fail_updates_on(&conn, "user_logs");
    let before = deleted_snapshot(&conn);

    let tx = conn.transaction().unwrap();
    let authorization = authorize(&tx, fixture.jane, "Acme");
    let err = CascadeExecutor::new(SqliteSoftDeleteRepository::new(&tx))
        .soft_delete_all(&authorization, DELETED_AT)
        .unwrap_err();
    assert_eq!(err.table, CascadeTable::UserLogs);
    tx.rollback().unwrap();

    assert_eq!(deleted_snapshot(&conn), before);
    for table in PER_USER_TABLES {
        assert!(deleted_at_values(&conn, table, fixture.jane)
            .iter()
            .all(Option::is_none));
    }
}

#[test]
fn uppercase_identity_text_is_still_deleted() {
    let conn = setup();
    let fixture = seed_jane(&conn);
    uppercase_user_id(&conn, "users", fixture.jane);
    uppercase_user_id(&conn, "user_logs", fixture.jane);
    let authorization = authorize(&conn, fixture.jane, "Acme");

    let summary = CascadeExecutor::new(SqliteSoftDeleteRepository::new(&conn))
        .soft_delete_all(&authorization, DELETED_AT)
        .unwrap();

    assert_eq!(summary.rows_in(CascadeTable::Users), 1);
    assert_eq!(summary.rows_in(CascadeTable::UserLogs), 1);
    assert_eq!(deleted_at_values(&conn, "users", fixture.jane), vec![Some(DELETED_AT)]);
    let user = SqliteIdentityRepository::new(&conn)
        .get_user(fixture.jane, true)
        .unwrap()
        .unwrap();
    assert_eq!(user.deleted_at, Some(DELETED_AT));
}
