use pretty_assertions::assert_eq;

use soc_core::db;
use soc_core::domain::{CustomerNotification, IncidentStatus};
use soc_core::service::IncidentService;

fn service() -> IncidentService {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    IncidentService::new(conn)
}

#[test]
fn detail_reflects_saves_despite_caching() {
    let mut svc = service();
    let incident = svc
        .create_incident("IR-2026-0400", "Beaconing host", None, Some("SEV2".to_string()))
        .expect("create");

    svc.save_report_version(incident.id, "first draft", "analyst", None, None)
        .expect("save v1");

    let detail = svc.incident_detail(incident.id).expect("detail");
    assert_eq!(detail.versions.len(), 1);

    // Served from cache on the second read.
    let again = svc.incident_detail(incident.id).expect("detail again");
    assert_eq!(again, detail);

    // A save invalidates the cached entry.
    svc.save_report_version(incident.id, "second draft", "analyst", None, None)
        .expect("save v2");
    let after_save = svc.incident_detail(incident.id).expect("detail after save");
    assert_eq!(after_save.versions.len(), 2);
    assert_eq!(after_save.versions[0].content, "second draft");
    assert!(after_save.versions[0].is_current);
}

#[test]
fn detail_reflects_restores_and_transitions() {
    let mut svc = service();
    let incident = svc
        .create_incident("IR-2026-0401", "OAuth consent abuse", None, None)
        .expect("create");
    let v1 = svc
        .save_report_version(incident.id, "A", "analyst", None, None)
        .expect("v1");
    svc.save_report_version(incident.id, "B", "analyst", None, None)
        .expect("v2");

    svc.incident_detail(incident.id).expect("warm cache");
    svc.restore_report_version(incident.id, v1.id).expect("restore");

    let detail = svc.incident_detail(incident.id).expect("detail");
    let current = detail
        .versions
        .iter()
        .find(|v| v.is_current)
        .expect("one current");
    assert_eq!(current.content, "A");
    assert_eq!(current.version_number, 1);

    // Reopen as incident, approve, close; the cached detail must follow.
    let reopen = svc.list_transitions(incident.id).expect("transitions")[0];
    assert_eq!(reopen.to, IncidentStatus::Incident);
    svc.apply_transition(incident.id, &reopen, "analyst", false)
        .expect("reopen");
    svc.set_customer_notification(incident.id, CustomerNotification::Approved, "manager")
        .expect("approve");

    let close = svc
        .list_transitions(incident.id)
        .expect("transitions")
        .into_iter()
        .find(|t| t.to == IncidentStatus::IncidentClosed)
        .expect("close edge");
    svc.apply_transition(incident.id, &close, "analyst", true)
        .expect("close");

    let closed = svc.incident_detail(incident.id).expect("detail");
    assert_eq!(closed.incident.status, IncidentStatus::IncidentClosed);
    assert!(closed.incident.closed_time.is_some());
}

#[test]
fn out_of_band_store_edits_bypass_stale_cache_entries() {
    let mut svc = service();
    let incident = svc
        .create_incident("IR-2026-0402", "Old title", None, None)
        .expect("create");

    svc.incident_detail(incident.id).expect("warm cache");

    // Simulate a direct store edit behind the service's back. The probe
    // hash covers updated_at, so the stale entry is not served.
    svc.connection()
        .execute(
            "UPDATE incidents SET title = 'New title', updated_at = '2026-03-05T00:00:00Z' WHERE id = ?1",
            [incident.id],
        )
        .expect("raw update");

    let detail = svc.incident_detail(incident.id).expect("detail");
    assert_eq!(detail.incident.title, "New title");
}

#[test]
fn list_transitions_follows_the_stored_status() {
    let mut svc = service();
    let incident = svc
        .create_incident("IR-2026-0403", "Scanner noise", None, None)
        .expect("create");

    let from_open = svc.list_transitions(incident.id).expect("transitions");
    assert_eq!(from_open.len(), 1);
    assert_eq!(from_open[0].to, IncidentStatus::Incident);

    svc.apply_transition(incident.id, &from_open[0], "analyst", false)
        .expect("promote");

    let from_incident = svc.list_transitions(incident.id).expect("transitions");
    assert_eq!(from_incident.len(), 2);
}

#[test]
fn detail_for_missing_incident_is_not_found() {
    let svc = service();
    let err = svc.incident_detail(12345).expect_err("missing incident");
    assert_eq!(err.code, "NOT_FOUND");
}
