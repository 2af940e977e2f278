use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::domain::ReportVersion;
use crate::error::AppError;

const VERSION_COLUMNS: &str = r#"
  id, incident_id, version_number, content, created_by, created_at,
  is_current, change_summary, template_id
"#;

/// Two racing saves can both read the same max version number; the unique
/// constraint on (incident_id, version_number) makes the loser fail, and we
/// re-run the read-max-then-insert sequence a bounded number of times.
const SAVE_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewReportVersion {
    pub incident_id: i64,
    pub content: String,
    pub created_by: String,
    pub created_at: String, // RFC3339
    pub change_summary: Option<String>,
    pub template_id: Option<String>,
}

fn map_version_row(row: &Row<'_>) -> Result<ReportVersion, rusqlite::Error> {
    Ok(ReportVersion {
        id: row.get(0)?,
        incident_id: row.get(1)?,
        version_number: row.get(2)?,
        content: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
        is_current: row.get::<_, i64>(6)? != 0,
        change_summary: row.get(7)?,
        template_id: row.get(8)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn incident_exists(conn: &Connection, incident_id: i64) -> Result<bool, AppError> {
    conn.query_row(
        "SELECT COUNT(*) FROM incidents WHERE id = ?1",
        [incident_id],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
    .map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to check incident existence")
            .with_details(e.to_string())
    })
}

/// Append a new report version and make it current.
///
/// The version number is `max(existing) + 1` (1 when no history exists);
/// the demote-then-insert sequence runs in a single transaction so a
/// failure can never leave the incident with zero or two current versions.
pub fn save_report_version(
    conn: &mut Connection,
    input: NewReportVersion,
) -> Result<ReportVersion, AppError> {
    if input.content.is_empty() {
        return Err(AppError::new("VERSION_INVALID", "content is required"));
    }
    if input.created_by.trim().is_empty() {
        return Err(AppError::new("VERSION_INVALID", "created_by is required"));
    }
    if !incident_exists(conn, input.incident_id)? {
        return Err(AppError::not_found("Incident not found")
            .with_details(format!("incident_id={}", input.incident_id)));
    }

    let mut attempts = 0;
    loop {
        attempts += 1;
        match try_save(conn, &input) {
            Ok(id) => return get_version(conn, id),
            Err(SaveError::Conflict) if attempts < SAVE_CONFLICT_RETRIES => continue,
            Err(SaveError::Conflict) => {
                return Err(AppError::conflict(
                    "Concurrent report saves kept colliding on the version number",
                )
                .with_details(format!(
                    "incident_id={}; attempts={attempts}",
                    input.incident_id
                )));
            }
            Err(SaveError::Store(e)) => return Err(e),
        }
    }
}

enum SaveError {
    Conflict,
    Store(AppError),
}

fn try_save(conn: &mut Connection, input: &NewReportVersion) -> Result<i64, SaveError> {
    let tx = conn.transaction().map_err(|e| {
        SaveError::Store(
            AppError::new("DB_TX_FAILED", "Failed to start save transaction")
                .with_details(e.to_string()),
        )
    })?;

    let max_version: i64 = tx
        .query_row(
            "SELECT COALESCE(MAX(version_number), 0) FROM report_versions WHERE incident_id = ?1",
            [input.incident_id],
            |row| row.get(0),
        )
        .map_err(|e| {
            SaveError::Store(
                AppError::new("DB_QUERY_FAILED", "Failed to read max report version number")
                    .with_details(e.to_string()),
            )
        })?;

    tx.execute(
        "UPDATE report_versions SET is_current = 0 WHERE incident_id = ?1 AND is_current = 1",
        [input.incident_id],
    )
    .map_err(|e| {
        SaveError::Store(
            AppError::new("DB_WRITE_FAILED", "Failed to demote current report version")
                .with_details(e.to_string()),
        )
    })?;

    let inserted = tx.execute(
        r#"
        INSERT INTO report_versions(
          incident_id, version_number, content, created_by, created_at,
          is_current, change_summary, template_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
        "#,
        params![
            input.incident_id,
            max_version + 1,
            input.content,
            input.created_by,
            input.created_at,
            input.change_summary,
            input.template_id,
        ],
    );

    match inserted {
        Ok(_) => {}
        // Dropping the transaction rolls the demote back as well.
        Err(e) if is_unique_violation(&e) => return Err(SaveError::Conflict),
        Err(e) => {
            return Err(SaveError::Store(
                AppError::new("DB_WRITE_FAILED", "Failed to insert report version")
                    .with_details(e.to_string()),
            ))
        }
    }

    let id = tx.last_insert_rowid();

    tx.commit().map_err(|e| {
        SaveError::Store(
            AppError::new("DB_TX_FAILED", "Failed to commit save transaction")
                .with_details(e.to_string()),
        )
    })?;

    Ok(id)
}

/// Repoint the current flag at an existing version. The restored version
/// keeps its original number; no new row is created.
pub fn restore_report_version(
    conn: &mut Connection,
    incident_id: i64,
    version_id: i64,
) -> Result<ReportVersion, AppError> {
    let target = get_version_opt(conn, version_id)?;
    let target = match target {
        Some(v) if v.incident_id == incident_id => v,
        _ => {
            return Err(AppError::not_found("Report version not found for incident")
                .with_details(format!(
                    "incident_id={incident_id}; version_id={version_id}"
                )))
        }
    };

    let tx = conn.transaction().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to start restore transaction")
            .with_details(e.to_string())
    })?;

    tx.execute(
        "UPDATE report_versions SET is_current = 0 WHERE incident_id = ?1 AND is_current = 1",
        [incident_id],
    )
    .map_err(|e| {
        AppError::new("DB_WRITE_FAILED", "Failed to demote current report version")
            .with_details(e.to_string())
    })?;

    tx.execute(
        "UPDATE report_versions SET is_current = 1 WHERE id = ?1",
        [target.id],
    )
    .map_err(|e| {
        AppError::new("DB_WRITE_FAILED", "Failed to mark restored version current")
            .with_details(e.to_string())
    })?;

    tx.commit().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to commit restore transaction")
            .with_details(e.to_string())
    })?;

    get_version(conn, target.id)
}

fn get_version_opt(conn: &Connection, version_id: i64) -> Result<Option<ReportVersion>, AppError> {
    conn.prepare(&format!(
        "SELECT {VERSION_COLUMNS} FROM report_versions WHERE id = ?1"
    ))
    .map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to prepare report version query")
            .with_details(e.to_string())
    })?
    .query_row([version_id], map_version_row)
    .optional()
    .map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to decode report version row")
            .with_details(e.to_string())
    })
}

pub fn get_version(conn: &Connection, version_id: i64) -> Result<ReportVersion, AppError> {
    get_version_opt(conn, version_id)?.ok_or_else(|| {
        AppError::not_found("Report version not found")
            .with_details(format!("version_id={version_id}"))
    })
}

pub fn get_current_version(
    conn: &Connection,
    incident_id: i64,
) -> Result<Option<ReportVersion>, AppError> {
    conn.prepare(&format!(
        "SELECT {VERSION_COLUMNS} FROM report_versions WHERE incident_id = ?1 AND is_current = 1"
    ))
    .map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to prepare current version query")
            .with_details(e.to_string())
    })?
    .query_row([incident_id], map_version_row)
    .optional()
    .map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to decode current version row")
            .with_details(e.to_string())
    })
}

/// Full history, newest first.
pub fn list_versions(conn: &Connection, incident_id: i64) -> Result<Vec<ReportVersion>, AppError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM report_versions WHERE incident_id = ?1 ORDER BY version_number DESC"
        ))
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare versions query")
                .with_details(e.to_string())
        })?;

    let rows = stmt.query_map([incident_id], map_version_row).map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to query report versions")
            .with_details(e.to_string())
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode report version row")
                .with_details(e.to_string())
        })?);
    }

    Ok(out)
}
