//! Consumer-side effects for incident events.
//!
//! These functions sit behind the generic consumer loop and must be
//! idempotent: the channel redelivers anything that is not acknowledged.

use tracing::warn;

use siren_core::DispatchError;
use siren_events::contracts::{event_type, IncidentEventData};
use siren_events::{EffectError, EffectOutcome, EffectResult, EventMessage, Transport};

use crate::engine::{DispatchEngine, IncidentSync};
use crate::store::DispatchStore;

/// Effect for the `IncidentCreated` queue: cache the incident locally.
pub fn incident_created_effect<S, T>(
    engine: &DispatchEngine<S, T>,
    message: &EventMessage,
) -> EffectResult
where
    S: DispatchStore,
    T: Transport,
{
    if message.event_type != event_type::INCIDENT_CREATED {
        return Err(EffectError::discard(format!(
            "unexpected event type '{}'",
            message.event_type
        )));
    }
    let data: IncidentEventData = message.decode().map_err(EffectError::discard)?;

    match engine.cache_incident(&data) {
        Ok(true) => Ok(EffectOutcome::Applied),
        Ok(false) => Ok(EffectOutcome::Skipped("incident already cached")),
        Err(err) => Err(classify(err)),
    }
}

/// Effect for the `IncidentUpdated` queue: merge into the cache and annotate
/// the incident's dispatch order.
pub fn incident_updated_effect<S, T>(
    engine: &DispatchEngine<S, T>,
    message: &EventMessage,
) -> EffectResult
where
    S: DispatchStore,
    T: Transport,
{
    if message.event_type != event_type::INCIDENT_UPDATED {
        return Err(EffectError::discard(format!(
            "unexpected event type '{}'",
            message.event_type
        )));
    }
    let data: IncidentEventData = message.decode().map_err(EffectError::discard)?;

    match engine.sync_incident(&data) {
        Ok(IncidentSync::UnknownIncident) => {
            warn!(incident_id = %data.id, "update for incident not in cache");
            Ok(EffectOutcome::Skipped("incident not cached"))
        }
        Ok(IncidentSync::Synced { .. }) => Ok(EffectOutcome::Applied),
        Err(err) => Err(classify(err)),
    }
}

/// Retryable engine errors leave the message on the queue; everything else
/// can never succeed and is dropped.
fn classify(err: DispatchError) -> EffectError {
    if err.is_retryable() {
        EffectError::retry(err)
    } else {
        EffectError::discard(err)
    }
}
