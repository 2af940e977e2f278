use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::domain::{CustomerNotification, IncidentStatus};
use crate::error::AppError;
use crate::repo::{create_incident, set_customer_notification, NewIncident};
use crate::versions::{restore_report_version, save_report_version, NewReportVersion};
use crate::workflow::{apply_transition, transitions_for};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemoSeedSummary {
    pub inserted_incidents: i64,
    pub inserted_versions: i64,
}

const SEED_ACTOR: &str = "demo.analyst";

fn ts(day: u32, hour: u32) -> String {
    format!("2026-01-{day:02}T{hour:02}:00:00Z")
}

/// Deterministic demo dataset: incidents across the status spectrum with
/// report histories, including one restored version and two closed
/// incidents, so the detail page and the audit have realistic data.
pub fn seed_demo_dataset(conn: &mut Connection) -> Result<DemoSeedSummary, AppError> {
    let severities = ["SEV1", "SEV2", "SEV3"];
    let titles = [
        "Phishing campaign targeting finance staff",
        "Suspicious OAuth consent grant",
        "Malware beaconing from workstation",
        "Credential stuffing against customer portal",
        "Benign vulnerability scanner traffic",
        "Unusual outbound data transfer",
    ];

    let mut inserted_versions = 0i64;
    let mut ids = Vec::new();

    for (i, title) in titles.iter().enumerate() {
        let n = i as u32 + 1;
        let incident = create_incident(
            conn,
            NewIncident {
                incident_number: format!("IR-2026-{n:04}"),
                title: (*title).to_string(),
                description: Some(format!("Demo incident {n} seeded for evaluation.")),
                severity: Some(severities[i % severities.len()].to_string()),
                status: if i % 2 == 0 {
                    IncidentStatus::Open
                } else {
                    IncidentStatus::Incident
                },
                customer_notification: CustomerNotification::Pending,
                created_at: ts(n, 8),
            },
        )?;
        ids.push(incident.id);

        // Two drafts each; the second becomes current.
        for (v, body) in [
            (1, "Initial triage notes."),
            (2, "Expanded findings after log review."),
        ] {
            save_report_version(
                conn,
                NewReportVersion {
                    incident_id: incident.id,
                    content: format!("{body} ({})", incident.incident_number),
                    created_by: SEED_ACTOR.to_string(),
                    created_at: ts(n, 8 + v),
                    change_summary: Some(if v == 1 {
                        "Initial draft".to_string()
                    } else {
                        "Added log review findings".to_string()
                    }),
                    template_id: None,
                },
            )?;
            inserted_versions += 1;
        }
    }

    // Incident 3: the analyst rolled the report back to the first draft.
    let third = ids[2];
    let first_version_id: i64 = conn
        .query_row(
            "SELECT id FROM report_versions WHERE incident_id = ?1 AND version_number = 1",
            [third],
            |row| row.get(0),
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to look up seeded version")
                .with_details(e.to_string())
        })?;
    restore_report_version(conn, third, first_version_id)?;

    // Incident 2: customer notification approved, then closed.
    let second = ids[1];
    set_customer_notification(conn, second, CustomerNotification::Approved, SEED_ACTOR, &ts(2, 15))?;
    let close = transitions_for(IncidentStatus::Incident)
        .into_iter()
        .find(|t| t.to == IncidentStatus::IncidentClosed)
        .ok_or_else(|| AppError::new("DEMO_SEED_FAILED", "Close transition missing from table"))?;
    apply_transition(conn, second, &close, SEED_ACTOR, true, &ts(2, 16))?;

    // Incident 4: closed as a false positive, no approval involved.
    let fourth = ids[3];
    let false_positive = transitions_for(IncidentStatus::Incident)
        .into_iter()
        .find(|t| t.to == IncidentStatus::FalsePositiveClosed)
        .ok_or_else(|| {
            AppError::new("DEMO_SEED_FAILED", "False positive transition missing from table")
        })?;
    apply_transition(conn, fourth, &false_positive, SEED_ACTOR, false, &ts(4, 12))?;

    Ok(DemoSeedSummary {
        inserted_incidents: ids.len() as i64,
        inserted_versions,
    })
}
