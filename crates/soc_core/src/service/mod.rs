//! Facade consumed by the UI shell: owns the store connection and the
//! detail cache, stamps mutation times, and signals cache invalidation
//! after every successful mutation.

use rusqlite::Connection;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::cache::{compute_detail_hash, DetailCache};
use crate::domain::{CustomerNotification, Incident, IncidentStatus, ReportVersion};
use crate::error::AppError;
use crate::repo::{self, IncidentDetail, NewIncident};
use crate::versions::{self, NewReportVersion};
use crate::workflow::{self, StatusTransition};

pub fn now_rfc3339() -> Result<String, AppError> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new("TIME_FORMAT_FAILED", "Failed to format current time")
            .with_details(e.to_string())
    })
}

pub struct IncidentService {
    conn: Connection,
    cache: DetailCache,
}

impl IncidentService {
    pub fn new(conn: Connection) -> Self {
        IncidentService {
            conn,
            cache: DetailCache::new(),
        }
    }

    pub fn with_cache(conn: Connection, cache: DetailCache) -> Self {
        IncidentService { conn, cache }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn create_incident(
        &mut self,
        incident_number: impl Into<String>,
        title: impl Into<String>,
        description: Option<String>,
        severity: Option<String>,
    ) -> Result<Incident, AppError> {
        let now = now_rfc3339()?;
        repo::create_incident(
            &self.conn,
            NewIncident {
                incident_number: incident_number.into(),
                title: title.into(),
                description,
                severity,
                status: IncidentStatus::Open,
                customer_notification: CustomerNotification::Pending,
                created_at: now,
            },
        )
    }

    pub fn list_incidents(&self) -> Result<Vec<Incident>, AppError> {
        repo::list_incidents(&self.conn)
    }

    /// Actions the detail page may offer for this incident, derived from
    /// its stored status.
    pub fn list_transitions(&self, incident_id: i64) -> Result<Vec<StatusTransition>, AppError> {
        let incident = repo::get_incident(&self.conn, incident_id)?;
        Ok(workflow::transitions_for(incident.status))
    }

    pub fn apply_transition(
        &mut self,
        incident_id: i64,
        transition: &StatusTransition,
        actor: &str,
        confirmed: bool,
    ) -> Result<Incident, AppError> {
        let now = now_rfc3339()?;
        let incident =
            workflow::apply_transition(&self.conn, incident_id, transition, actor, confirmed, &now)?;
        self.cache.invalidate(incident_id);
        Ok(incident)
    }

    pub fn set_customer_notification(
        &mut self,
        incident_id: i64,
        value: CustomerNotification,
        actor: &str,
    ) -> Result<Incident, AppError> {
        let now = now_rfc3339()?;
        let incident = repo::set_customer_notification(&self.conn, incident_id, value, actor, &now)?;
        self.cache.invalidate(incident_id);
        Ok(incident)
    }

    pub fn save_report_version(
        &mut self,
        incident_id: i64,
        content: impl Into<String>,
        created_by: impl Into<String>,
        change_summary: Option<String>,
        template_id: Option<String>,
    ) -> Result<ReportVersion, AppError> {
        let now = now_rfc3339()?;
        let version = versions::save_report_version(
            &mut self.conn,
            NewReportVersion {
                incident_id,
                content: content.into(),
                created_by: created_by.into(),
                created_at: now,
                change_summary,
                template_id,
            },
        )?;
        self.cache.invalidate(incident_id);
        Ok(version)
    }

    pub fn restore_report_version(
        &mut self,
        incident_id: i64,
        version_id: i64,
    ) -> Result<ReportVersion, AppError> {
        let version = versions::restore_report_version(&mut self.conn, incident_id, version_id)?;
        self.cache.invalidate(incident_id);
        Ok(version)
    }

    pub fn get_current_version(&self, incident_id: i64) -> Result<Option<ReportVersion>, AppError> {
        versions::get_current_version(&self.conn, incident_id)
    }

    pub fn list_versions(&self, incident_id: i64) -> Result<Vec<ReportVersion>, AppError> {
        versions::list_versions(&self.conn, incident_id)
    }

    /// Detail payload for the incident page, served through the cache.
    ///
    /// A cheap probe (updated_at plus the version id set and current
    /// pointer) is hashed first so an out-of-band store edit invalidates a
    /// cached entry even before its TTL runs out.
    pub fn incident_detail(&self, incident_id: i64) -> Result<IncidentDetail, AppError> {
        let hash = self.detail_probe_hash(incident_id)?;

        if let Some(cached) = self.cache.get(incident_id, &hash) {
            return Ok(cached);
        }

        let detail = repo::get_incident_detail(&self.conn, incident_id)?;
        self.cache.set(incident_id, detail.clone(), hash);
        Ok(detail)
    }

    fn detail_probe_hash(&self, incident_id: i64) -> Result<String, AppError> {
        let updated_at: String = self
            .conn
            .query_row(
                "SELECT updated_at FROM incidents WHERE id = ?1",
                [incident_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => AppError::not_found("Incident not found")
                    .with_details(format!("incident_id={incident_id}")),
                other => AppError::new("DB_QUERY_FAILED", "Failed to probe incident")
                    .with_details(other.to_string()),
            })?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, is_current FROM report_versions WHERE incident_id = ?1 ORDER BY id",
            )
            .map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to prepare version probe")
                    .with_details(e.to_string())
            })?;

        let rows = stmt
            .query_map([incident_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? != 0))
            })
            .map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to probe report versions")
                    .with_details(e.to_string())
            })?;

        let mut version_ids = Vec::new();
        let mut current_version_id = None;
        for r in rows {
            let (id, is_current) = r.map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to read version probe row")
                    .with_details(e.to_string())
            })?;
            version_ids.push(id);
            if is_current {
                current_version_id = Some(id);
            }
        }

        Ok(compute_detail_hash(
            &updated_at,
            &version_ids,
            current_version_id,
        ))
    }
}
