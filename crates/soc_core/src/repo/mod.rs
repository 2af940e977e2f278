use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::domain::{CustomerNotification, Incident, IncidentStatus, ReportVersion, ValidationWarning};
use crate::error::AppError;
use crate::validate::{validate_incident, validate_report_history};
use crate::versions::list_versions;

const INCIDENT_COLUMNS: &str = r#"
  id, incident_number, title, description, severity,
  status, customer_notification,
  created_at, updated_at, updated_by, closed_time
"#;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewIncident {
    pub incident_number: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: Option<String>,
    pub status: IncidentStatus,
    pub customer_notification: CustomerNotification,
    pub created_at: String, // RFC3339
}

/// Detail payload for the incident page: the incident, its full report
/// history, and any invariant warnings the audit surfaces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentDetail {
    pub incident: Incident,
    pub versions: Vec<ReportVersion>,
    pub warnings: Vec<ValidationWarning>,
}

fn malformed(column: usize, what: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            what.to_string(),
        )),
    )
}

/// Decode an incident row, parsing the status and notification enums at the
/// store boundary. Malformed stored values fail the read; they are never
/// silently defaulted.
pub(crate) fn map_incident_row(row: &Row<'_>) -> Result<Incident, rusqlite::Error> {
    let status_raw: String = row.get(5)?;
    let status = IncidentStatus::parse(&status_raw)
        .ok_or_else(|| malformed(5, &format!("invalid incident status '{status_raw}'")))?;

    let notification_raw: String = row.get(6)?;
    let customer_notification = CustomerNotification::parse(&notification_raw).ok_or_else(|| {
        malformed(
            6,
            &format!("invalid customer_notification '{notification_raw}'"),
        )
    })?;

    Ok(Incident {
        id: row.get(0)?,
        incident_number: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        severity: row.get(4)?,
        status,
        customer_notification,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        updated_by: row.get(9)?,
        closed_time: row.get(10)?,
    })
}

pub fn create_incident(conn: &Connection, input: NewIncident) -> Result<Incident, AppError> {
    if input.incident_number.trim().is_empty() {
        return Err(AppError::new(
            "INCIDENT_INVALID",
            "incident_number is required",
        ));
    }
    if input.title.trim().is_empty() {
        return Err(AppError::new("INCIDENT_INVALID", "title is required"));
    }

    conn.execute(
        r#"
        INSERT INTO incidents(
          incident_number, title, description, severity,
          status, customer_notification, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        "#,
        params![
            input.incident_number,
            input.title,
            input.description,
            input.severity,
            input.status.as_str(),
            input.customer_notification.as_str(),
            input.created_at,
        ],
    )
    .map_err(|e| {
        AppError::new("DB_WRITE_FAILED", "Failed to insert incident").with_details(e.to_string())
    })?;

    get_incident(conn, conn.last_insert_rowid())
}

pub fn get_incident(conn: &Connection, id: i64) -> Result<Incident, AppError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = ?1"
        ))
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare incident query")
                .with_details(e.to_string())
        })?;

    let incident = stmt
        .query_row([id], map_incident_row)
        .optional()
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode incident row")
                .with_details(e.to_string())
        })?;

    incident.ok_or_else(|| {
        AppError::not_found("Incident not found").with_details(format!("incident_id={id}"))
    })
}

pub fn list_incidents(conn: &Connection) -> Result<Vec<Incident>, AppError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents ORDER BY created_at DESC, id DESC"
        ))
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare incidents query")
                .with_details(e.to_string())
        })?;

    let rows = stmt.query_map([], map_incident_row).map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to query incidents").with_details(e.to_string())
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode incident row")
                .with_details(e.to_string())
        })?);
    }

    Ok(out)
}

pub fn count_incidents(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to count incidents")
                .with_details(e.to_string())
        })
}

/// Record the outcome of the customer-notification workflow so the closure
/// gate can be satisfied (or explicitly rejected) through the API.
pub fn set_customer_notification(
    conn: &Connection,
    incident_id: i64,
    value: CustomerNotification,
    actor: &str,
    now: &str,
) -> Result<Incident, AppError> {
    let changed = conn
        .execute(
            "UPDATE incidents SET customer_notification = ?1, updated_at = ?2, updated_by = ?3 WHERE id = ?4",
            params![value.as_str(), now, actor, incident_id],
        )
        .map_err(|e| {
            AppError::new("DB_WRITE_FAILED", "Failed to update customer notification")
                .with_details(e.to_string())
        })?;

    if changed == 0 {
        return Err(AppError::not_found("Incident not found")
            .with_details(format!("incident_id={incident_id}")));
    }

    get_incident(conn, incident_id)
}

pub fn get_incident_detail(conn: &Connection, incident_id: i64) -> Result<IncidentDetail, AppError> {
    let incident = get_incident(conn, incident_id)?;
    let versions = list_versions(conn, incident_id)?;

    let mut warnings = validate_incident(&incident);
    warnings.extend(validate_report_history(&versions));
    warnings.sort_by(|a, b| a.code.cmp(&b.code));

    Ok(IncidentDetail {
        incident,
        versions,
        warnings,
    })
}
