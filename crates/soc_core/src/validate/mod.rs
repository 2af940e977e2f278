use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use rusqlite::Connection;

use crate::domain::{Incident, ReportVersion, ValidationWarning};
use crate::error::AppError;
use crate::repo::list_incidents;
use crate::versions::list_versions;

fn check_ts(field: &str, value: &Option<String>, warnings: &mut Vec<ValidationWarning>) {
    let Some(s) = value.as_deref() else { return };
    if OffsetDateTime::parse(s, &Rfc3339).is_err() {
        warnings.push(
            ValidationWarning::new(
                "VALIDATION_TS_PARSE_FAILED",
                format!("Failed to parse {field}"),
            )
            .with_details(format!("value={s}")),
        );
    }
}

/// Validate a single incident record:
/// - closed statuses must carry a `closed_time`;
/// - a `closed_time` on a non-closed status means the incident was reopened
///   (surfaced as information, not an error);
/// - stored timestamps must be RFC3339.
pub fn validate_incident(incident: &Incident) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if incident.status.is_closed() && incident.closed_time.is_none() {
        warnings.push(
            ValidationWarning::new(
                "VALIDATION_CLOSED_WITHOUT_CLOSED_TIME",
                "Incident is in a closed status but has no closed_time",
            )
            .with_details(format!("status={}", incident.status.as_str())),
        );
    }

    if !incident.status.is_closed() && incident.closed_time.is_some() {
        warnings.push(
            ValidationWarning::new(
                "VALIDATION_REOPENED_INCIDENT",
                "Incident carries a closed_time but is not in a closed status",
            )
            .with_details(format!("status={}", incident.status.as_str())),
        );
    }

    check_ts(
        "created_at",
        &Some(incident.created_at.clone()),
        &mut warnings,
    );
    check_ts(
        "updated_at",
        &Some(incident.updated_at.clone()),
        &mut warnings,
    );
    check_ts("closed_time", &incident.closed_time, &mut warnings);

    warnings
}

/// Audit a report history against the versioning invariants:
/// - exactly one current version (or none when the history is empty);
/// - version numbers start at 1, strictly increasing, no gaps or reuse.
///
/// Accepts the history in any order.
pub fn validate_report_history(versions: &[ReportVersion]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if versions.is_empty() {
        return warnings;
    }

    let current_count = versions.iter().filter(|v| v.is_current).count();
    if current_count == 0 {
        warnings.push(ValidationWarning::new(
            "VALIDATION_NO_CURRENT_VERSION",
            "Report history exists but no version is marked current",
        ));
    } else if current_count > 1 {
        warnings.push(
            ValidationWarning::new(
                "VALIDATION_MULTIPLE_CURRENT_VERSIONS",
                "More than one report version is marked current",
            )
            .with_details(format!("current_count={current_count}")),
        );
    }

    let mut numbers: Vec<i64> = versions.iter().map(|v| v.version_number).collect();
    numbers.sort_unstable();

    if numbers[0] != 1 {
        warnings.push(
            ValidationWarning::new(
                "VALIDATION_VERSION_NUMBERING_START",
                "Report version numbering does not start at 1",
            )
            .with_details(format!("first={}", numbers[0])),
        );
    }

    for pair in numbers.windows(2) {
        if pair[1] == pair[0] {
            warnings.push(
                ValidationWarning::new(
                    "VALIDATION_VERSION_NUMBER_REUSED",
                    "Duplicate report version number",
                )
                .with_details(format!("version_number={}", pair[0])),
            );
        } else if pair[1] != pair[0] + 1 {
            warnings.push(
                ValidationWarning::new(
                    "VALIDATION_VERSION_NUMBER_GAP",
                    "Gap in report version numbering",
                )
                .with_details(format!("after={}; next={}", pair[0], pair[1])),
            );
        }
    }

    warnings
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentValidationReportItem {
    pub incident_id: i64,
    pub incident_number: String,
    pub warnings: Vec<ValidationWarning>,
}

/// Audit every incident and its report history. Ordering is stable
/// (incident id ascending) so output is snapshot-testable.
pub fn validate_all_incidents(
    conn: &Connection,
) -> Result<Vec<IncidentValidationReportItem>, AppError> {
    let mut incidents = list_incidents(conn)?;
    incidents.sort_by_key(|i| i.id);

    let mut out = Vec::new();
    for incident in incidents {
        let versions = list_versions(conn, incident.id)?;
        let mut warnings = validate_incident(&incident);
        warnings.extend(validate_report_history(&versions));
        warnings.sort_by(|a, b| a.code.cmp(&b.code));

        out.push(IncidentValidationReportItem {
            incident_id: incident.id,
            incident_number: incident.incident_number,
            warnings,
        });
    }

    Ok(out)
}
