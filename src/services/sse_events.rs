use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        common::CountdownSettingsDto,
        sse::{CountdownTickEvent, ServerEvent, SettingsChangedEvent, SystemStatus},
    },
    state::{
        SharedState,
        countdown::{CountdownSettings, Derived},
    },
};

pub const EVENT_COUNTDOWN_TICK: &str = "countdown.tick";
pub const EVENT_COUNTDOWN_SETTINGS: &str = "countdown.settings";
pub const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Broadcast the freshly derived countdown to public subscribers.
pub fn broadcast_tick(state: &SharedState, derived: Derived) {
    let payload = CountdownTickEvent::from(derived);
    send_public_event(state, EVENT_COUNTDOWN_TICK, &payload);
}

/// Broadcast the resident settings after they changed.
pub fn broadcast_settings(state: &SharedState, settings: &CountdownSettings) {
    let payload = SettingsChangedEvent(CountdownSettingsDto::from(settings.clone()));
    send_public_event(state, EVENT_COUNTDOWN_SETTINGS, &payload);
    send_admin_event(state, EVENT_COUNTDOWN_SETTINGS, &payload);
}

/// Broadcast whether the store is currently unusable.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_public_event(state, EVENT_SYSTEM_STATUS, &payload);
    send_admin_event(state, EVENT_SYSTEM_STATUS, &payload);
}

/// Events replayed to a freshly connected subscriber so it can render immediately.
pub async fn snapshot_events(state: &SharedState) -> Vec<ServerEvent> {
    let snapshot = state.engine().snapshot().await;
    let mut events = Vec::with_capacity(3);

    push_event(
        &mut events,
        EVENT_SYSTEM_STATUS,
        &SystemStatus {
            degraded: !snapshot.connected,
        },
    );
    if let Some(settings) = snapshot.settings {
        push_event(
            &mut events,
            EVENT_COUNTDOWN_SETTINGS,
            &SettingsChangedEvent(settings.into()),
        );
        push_event(
            &mut events,
            EVENT_COUNTDOWN_TICK,
            &CountdownTickEvent::from(Derived {
                remaining: snapshot.remaining,
                finished: snapshot.finished,
            }),
        );
    }

    events
}

fn push_event(events: &mut Vec<ServerEvent>, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => events.push(event),
        Err(err) => warn!(event, error = %err, "failed to serialize snapshot SSE payload"),
    }
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    if let Err(err) = state.public_sse().publish(event, payload) {
        warn!(event, error = %err, "failed to serialize public SSE payload");
    }
}

fn send_admin_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    if let Err(err) = state.admin_sse().publish(event, payload) {
        warn!(event, error = %err, "failed to serialize admin SSE payload");
    }
}
