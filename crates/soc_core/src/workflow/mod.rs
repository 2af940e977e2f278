use rusqlite::{params, Connection};
use serde::Serialize;

use crate::domain::{CustomerNotification, Incident, IncidentStatus};
use crate::error::AppError;
use crate::repo::get_incident;

/// One edge of the status graph.
///
/// `from` is `None` for the fallback edge, which applies to any status with
/// no explicit entry in the table. That deliberately includes closed
/// statuses: reopening a closed incident is allowed until product says
/// otherwise (see DESIGN.md).
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: Option<IncidentStatus>,
    pub to: IncidentStatus,
    pub display_name: &'static str,
    pub requires_approval: bool,
}

/// The status graph as data, consumed by both the query and apply paths.
const TRANSITIONS: &[StatusTransition] = &[
    StatusTransition {
        from: Some(IncidentStatus::Open),
        to: IncidentStatus::Incident,
        display_name: "Reopen as Incident",
        requires_approval: false,
    },
    StatusTransition {
        from: Some(IncidentStatus::Incident),
        to: IncidentStatus::IncidentClosed,
        display_name: "Close Incident",
        requires_approval: true,
    },
    StatusTransition {
        from: Some(IncidentStatus::Incident),
        to: IncidentStatus::FalsePositiveClosed,
        display_name: "Close as False Positive",
        requires_approval: false,
    },
];

const FALLBACK_TRANSITION: StatusTransition = StatusTransition {
    from: None,
    to: IncidentStatus::Incident,
    display_name: "Reopen as Incident",
    requires_approval: false,
};

/// Legal transitions out of `status`. Pure; consults no external state.
pub fn transitions_for(status: IncidentStatus) -> Vec<StatusTransition> {
    let matched: Vec<StatusTransition> = TRANSITIONS
        .iter()
        .filter(|t| t.from == Some(status))
        .copied()
        .collect();

    if matched.is_empty() {
        vec![FALLBACK_TRANSITION]
    } else {
        matched
    }
}

fn is_legal(status: IncidentStatus, transition: &StatusTransition) -> bool {
    transitions_for(status)
        .iter()
        .any(|t| t.to == transition.to && t.requires_approval == transition.requires_approval)
}

/// Apply `transition` to the incident.
///
/// `confirmed` is the caller's pre-obtained human confirmation; transitions
/// marked `requires_approval` are rejected without it, before any store
/// read. Closing `incident -> incident_closed` additionally requires the
/// incident's customer notification to be `approved`; that rule is fixed,
/// not data-driven.
///
/// On success the incident's status, `updated_at`, and `updated_by` change,
/// and `closed_time` is stamped when entering a closed status. The failure
/// paths leave the incident untouched.
pub fn apply_transition(
    conn: &Connection,
    incident_id: i64,
    transition: &StatusTransition,
    actor: &str,
    confirmed: bool,
    now: &str,
) -> Result<Incident, AppError> {
    if transition.requires_approval && !confirmed {
        return Err(AppError::new(
            "CONFIRMATION_REQUIRED",
            format!(
                "Transition '{}' requires explicit confirmation",
                transition.display_name
            ),
        ));
    }

    let incident = get_incident(conn, incident_id)?;

    if !is_legal(incident.status, transition) {
        return Err(AppError::new(
            "TRANSITION_NOT_ALLOWED",
            format!(
                "No transition from '{}' to '{}'",
                incident.status.as_str(),
                transition.to.as_str()
            ),
        ));
    }

    if incident.status == IncidentStatus::Incident
        && transition.to == IncidentStatus::IncidentClosed
        && incident.customer_notification != CustomerNotification::Approved
    {
        return Err(AppError::approval_required(
            "Customer notification must be approved before closing the incident",
        )
        .with_details(format!(
            "customer_notification={}",
            incident.customer_notification.as_str()
        )));
    }

    if transition.to.is_closed() {
        conn.execute(
            "UPDATE incidents SET status = ?1, updated_at = ?2, updated_by = ?3, closed_time = ?2 WHERE id = ?4",
            params![transition.to.as_str(), now, actor, incident_id],
        )
    } else {
        conn.execute(
            "UPDATE incidents SET status = ?1, updated_at = ?2, updated_by = ?3 WHERE id = ?4",
            params![transition.to.as_str(), now, actor, incident_id],
        )
    }
    .map_err(|e| {
        AppError::new("DB_WRITE_FAILED", "Failed to update incident status")
            .with_details(e.to_string())
    })?;

    get_incident(conn, incident_id)
}
