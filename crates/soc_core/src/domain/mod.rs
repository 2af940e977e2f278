use serde::{Deserialize, Serialize};

/// Lifecycle status of an incident.
///
/// Stored as a stable snake_case string. A stored value outside this set is
/// malformed data and must fail row decoding; statuses are never silently
/// defaulted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Incident,
    InProgress,
    PendingCustomer,
    IncidentClosed,
    FalsePositiveClosed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Incident => "incident",
            IncidentStatus::InProgress => "in_progress",
            IncidentStatus::PendingCustomer => "pending_customer",
            IncidentStatus::IncidentClosed => "incident_closed",
            IncidentStatus::FalsePositiveClosed => "false_positive_closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "incident" => Some(Self::Incident),
            "in_progress" => Some(Self::InProgress),
            "pending_customer" => Some(Self::PendingCustomer),
            "incident_closed" => Some(Self::IncidentClosed),
            "false_positive_closed" => Some(Self::FalsePositiveClosed),
            _ => None,
        }
    }

    /// Closed statuses receive a `closed_time` stamp when entered.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::IncidentClosed | Self::FalsePositiveClosed)
    }
}

/// Customer-facing notification state. Closing an incident as a confirmed
/// incident requires this to be exactly `Approved`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CustomerNotification {
    Pending,
    Approved,
    Rejected,
}

impl CustomerNotification {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerNotification::Pending => "pending",
            CustomerNotification::Approved => "approved",
            CustomerNotification::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Canonical incident representation.
///
/// Notes:
/// - `incident_number` is the human-readable identifier (unique), distinct
///   from the opaque row `id` used by all store operations.
/// - Timestamps are RFC3339 UTC strings; `closed_time` is set when the
///   incident enters a closed status and is deliberately left in place if
///   the incident is later reopened (reopen history stays visible).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Incident {
    pub id: i64,
    pub incident_number: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: Option<String>,
    pub status: IncidentStatus,
    pub customer_notification: CustomerNotification,
    pub created_at: String,
    pub updated_at: String,
    pub updated_by: Option<String>,
    pub closed_time: Option<String>,
}

/// One immutable snapshot of an incident's narrative report.
///
/// `version_number` is assigned once at save time and never reused, even
/// across restores; `is_current` is the single authoritative pointer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportVersion {
    pub id: i64,
    pub incident_id: i64,
    pub version_number: i64,
    pub content: String,
    pub created_by: String,
    pub created_at: String,
    pub is_current: bool,
    pub change_summary: Option<String>,
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
