use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::common::CountdownSettingsDto,
    state::countdown::{Derived, TimeRemaining, Urgency},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event whose data is a raw string.
    pub fn new<E>(event: E, data: String) -> Self
    where
        E: Into<Option<String>>,
    {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Token handed to the single admin SSE subscriber.
pub struct AdminHandshake {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the store connection is lost or regained.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast once per second with the freshly derived countdown.
pub struct CountdownTickEvent {
    pub remaining: TimeRemaining,
    /// `remaining` as a plain number of seconds.
    pub total_seconds: u64,
    /// `DD:HH:MM:SS` rendering of `remaining`.
    pub formatted: String,
    pub finished: bool,
    pub urgency: Urgency,
}

impl From<Derived> for CountdownTickEvent {
    fn from(derived: Derived) -> Self {
        Self {
            remaining: derived.remaining,
            total_seconds: derived.remaining.total_seconds(),
            formatted: derived.remaining.to_string(),
            finished: derived.finished,
            urgency: Urgency::from_remaining(&derived.remaining),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever the resident countdown settings change.
pub struct SettingsChangedEvent(pub CountdownSettingsDto);
