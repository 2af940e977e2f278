//! Malformed stored rows must fail loudly at the decode boundary instead of
//! propagating silently defaulted values.

use soc_core::db;
use soc_core::repo::{get_incident, list_incidents};

fn insert_raw_incident(conn: &rusqlite::Connection, status: &str, notification: &str) -> i64 {
    conn.execute(
        "INSERT INTO incidents(incident_number, title, status, customer_notification, created_at, updated_at)
         VALUES ('IR-2026-0500', 'boundary test', ?1, ?2, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        [status, notification],
    )
    .expect("raw insert");
    conn.last_insert_rowid()
}

#[test]
fn unknown_status_string_fails_the_read() {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    let id = insert_raw_incident(&conn, "escalated", "pending");

    let err = get_incident(&conn, id).expect_err("unknown status must not decode");
    assert_eq!(err.code, "DB_QUERY_FAILED");
    assert!(err.details.unwrap_or_default().contains("escalated"));

    let err = list_incidents(&conn).expect_err("list hits the same row");
    assert_eq!(err.code, "DB_QUERY_FAILED");
}

#[test]
fn unknown_notification_string_fails_the_read() {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    let id = insert_raw_incident(&conn, "open", "maybe");

    let err = get_incident(&conn, id).expect_err("unknown notification must not decode");
    assert_eq!(err.code, "DB_QUERY_FAILED");
    assert!(err.details.unwrap_or_default().contains("maybe"));
}
