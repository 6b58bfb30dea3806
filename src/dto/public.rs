use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::common::CountdownSettingsDto,
    state::{
        countdown::{TimeRemaining, Urgency},
        engine::{EngineError, EnginePhase, EngineSnapshot, ErrorKind},
    },
};

/// Everything a viewer needs to render the countdown page.
#[derive(Debug, Serialize, ToSchema)]
pub struct CountdownView {
    pub phase: EnginePhase,
    /// Current settings; absent until the first successful load.
    pub settings: Option<CountdownSettingsDto>,
    pub remaining: TimeRemaining,
    /// `DD:HH:MM:SS` rendering of `remaining`.
    pub formatted: String,
    pub finished: bool,
    pub urgency: Urgency,
    /// False while the store is unreachable or not configured; retained settings keep ticking.
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorView>,
}

/// Last failure recorded by the engine.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorView {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&EngineError> for ErrorView {
    fn from(err: &EngineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<EngineSnapshot> for CountdownView {
    fn from(snapshot: EngineSnapshot) -> Self {
        Self {
            phase: snapshot.phase,
            settings: snapshot.settings.map(Into::into),
            formatted: snapshot.remaining.to_string(),
            remaining: snapshot.remaining,
            finished: snapshot.finished,
            urgency: snapshot.urgency,
            connected: snapshot.connected,
            error: snapshot.error.as_ref().map(ErrorView::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unloaded_engine_view_serializes_without_settings() {
        let view = CountdownView::from(EngineSnapshot {
            phase: EnginePhase::Errored,
            settings: None,
            remaining: TimeRemaining::ZERO,
            finished: false,
            urgency: Urgency::Urgent,
            connected: false,
            error: Some(EngineError::Configuration("SUPABASE_URL is not set".into())),
        });

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["phase"], json!("errored"));
        assert_eq!(value["settings"], json!(null));
        assert_eq!(value["formatted"], json!("00:00:00:00"));
        assert_eq!(value["urgency"], json!("urgent"));
        assert_eq!(value["error"]["kind"], json!("configuration"));
        assert_eq!(
            value["remaining"],
            json!({ "days": 0, "hours": 0, "minutes": 0, "seconds": 0 })
        );
    }
}
