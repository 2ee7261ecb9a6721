//! Consumer-side effect for dispatch events.

use std::str::FromStr;

use tracing::warn;

use siren_core::{DispatchError, IncidentId};
use siren_events::contracts::{event_type, DispatchEventData};
use siren_events::{EffectError, EffectOutcome, EffectResult, EventMessage, Transport};

use crate::incident::IncidentStatus;
use crate::service::IncidentService;
use crate::store::IncidentStore;

/// Maps dispatch events onto the incident status ladder and applies the
/// upgrade. Events with no mapping are acknowledged untouched.
pub fn dispatch_event_effect<S, T>(
    service: &IncidentService<S, T>,
    message: &EventMessage,
) -> EffectResult
where
    S: IncidentStore,
    T: Transport,
{
    let target = match message.event_type.as_str() {
        event_type::DISPATCH_ORDER_CREATED => IncidentStatus::Acknowledged,
        event_type::DISPATCH_ASSIGNMENT_CREATED => IncidentStatus::InProgress,
        event_type::DISPATCH_ORDER_COMPLETED => IncidentStatus::Resolved,
        _ => return Ok(EffectOutcome::Skipped("no status mapping for event")),
    };

    let data: DispatchEventData = message.decode().map_err(EffectError::discard)?;
    let incident_id = IncidentId::from_str(&data.incident_id)
        .map_err(|err| EffectError::discard(format!("incident id: {err}")))?;

    match service.apply_dispatch_status(incident_id, target) {
        Ok(true) => Ok(EffectOutcome::Applied),
        Ok(false) => Ok(EffectOutcome::Skipped("status already at or past target")),
        Err(DispatchError::NotFound(_)) => {
            warn!(incident_id = %incident_id, "dispatch event for unknown incident");
            Ok(EffectOutcome::Skipped("incident not found"))
        }
        Err(err) if err.is_retryable() => Err(EffectError::retry(err)),
        Err(err) => Err(EffectError::discard(err)),
    }
}
