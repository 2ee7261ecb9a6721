//! Runs the three services against the in-memory transport and walks one
//! incident through its full lifecycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use siren_dispatch::{AssignmentStatus, UnitType};
use siren_events::InMemoryTransport;
use siren_incident::{IncidentCategory, IncidentStatus, NewIncident, Severity};
use siren_infra::{SirenRuntime, Topology};

fn main() {
    siren_observability::init();

    let topology = Topology::from_env();
    let transport = Arc::new(InMemoryTransport::new());
    let runtime = SirenRuntime::start_with_wait(transport, &topology, Duration::from_millis(200))
        .expect("failed to provision topology");

    if let Err(err) = run_scenario(&runtime) {
        tracing::error!(error = %err, "scenario failed");
    }

    runtime.shutdown();
}

fn run_scenario(runtime: &SirenRuntime) -> Result<(), Box<dyn std::error::Error>> {
    let incident = runtime.incident.create_incident(NewIncident {
        title: "Warehouse fire".into(),
        description: Some("Smoke visible from the street".into()),
        category: IncidentCategory::Fire,
        severity: Severity::Critical,
        latitude: 42.66,
        longitude: 21.17,
        reporter_name: Some("On-scene caller".into()),
        reporter_contact: None,
        created_by_user_id: Some(siren_core::UserId::new()),
    })?;

    wait_for("incident cached in dispatch", || {
        Ok(runtime.dispatch.incident(incident.id)?.is_some())
    })?;

    let order = runtime.dispatch.create_order(incident.id, vec![])?;
    let unit = runtime.dispatch.create_unit("FIRE-01", UnitType::FireTruck)?;
    let assignment = runtime.dispatch.assign_unit(order.id, unit.id)?;
    for next in [
        AssignmentStatus::EnRoute,
        AssignmentStatus::OnSite,
        AssignmentStatus::Completed,
    ] {
        runtime.dispatch.transition_assignment(assignment.id, next)?;
    }

    wait_for("incident resolved", || {
        Ok(runtime.incident.incident(incident.id)?.status == IncidentStatus::Resolved)
    })?;

    let notifications = runtime.notification.notifications()?;
    tracing::info!(
        incident = %incident.code,
        order_status = ?runtime.dispatch.order(order.id)?.status,
        notifications = notifications.len(),
        "scenario complete"
    );
    Ok(())
}

fn wait_for(
    what: &str,
    mut condition: impl FnMut() -> Result<bool, Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition()? {
        if Instant::now() >= deadline {
            return Err(format!("timed out waiting for {what}").into());
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}
