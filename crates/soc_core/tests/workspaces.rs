use tempfile::tempdir;

use soc_core::demo::seed_demo_dataset;
use soc_core::repo::count_incidents;
use soc_core::workspace::{
    create_workspace, create_workspace_connection, db_is_empty, open_workspace_connection,
};

#[test]
fn workspace_isolation_create_open_switch() {
    let tmp = tempdir().unwrap();
    let w1 = tmp.path().join("w1.sqlite");
    let w2 = tmp.path().join("w2.sqlite");

    // Create workspace A and seed it.
    let mut conn1 = create_workspace_connection(&w1).expect("create w1");
    seed_demo_dataset(&mut conn1).expect("seed w1");
    assert!(count_incidents(&conn1).unwrap() > 0);

    // Create workspace B and ensure it's empty.
    let conn2 = create_workspace_connection(&w2).expect("create w2");
    assert_eq!(count_incidents(&conn2).unwrap(), 0);
    assert!(db_is_empty(&w2).expect("is_empty"));

    // Re-open A and confirm data is still there.
    let conn1b = open_workspace_connection(&w1).expect("open w1");
    assert!(count_incidents(&conn1b).unwrap() > 0);
}

#[test]
fn migrations_run_on_open_and_create() {
    let tmp = tempdir().unwrap();
    let w = tmp.path().join("migrate.sqlite");

    let meta = create_workspace(&w).expect("create meta");
    assert!(meta.is_empty);

    // Re-open: should still succeed and preserve emptiness.
    let conn = open_workspace_connection(&w).expect("open");
    assert_eq!(count_incidents(&conn).unwrap(), 0);
}

#[test]
fn workspace_db_is_empty_reports_correctly() {
    let tmp = tempdir().unwrap();
    let w = tmp.path().join("empty.sqlite");

    let mut conn = create_workspace_connection(&w).expect("create");
    assert!(db_is_empty(&w).expect("empty true"));
    seed_demo_dataset(&mut conn).expect("seed");
    assert!(!db_is_empty(&w).expect("empty false"));
}

#[test]
fn creating_over_an_existing_file_fails() {
    let tmp = tempdir().unwrap();
    let w = tmp.path().join("dup.sqlite");

    create_workspace(&w).expect("first create");
    let err = create_workspace(&w).expect_err("second create");
    assert_eq!(err.code, "WORKSPACE_CREATE_FAILED");
}

#[test]
fn opening_a_missing_file_fails() {
    let tmp = tempdir().unwrap();
    let w = tmp.path().join("missing.sqlite");

    let err = open_workspace_connection(&w).expect_err("open missing");
    assert_eq!(err.code, "WORKSPACE_DB_NOT_FOUND");
}
