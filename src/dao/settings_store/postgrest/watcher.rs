//! Change detection for the hosted table: local writes are forwarded immediately and
//! edits made by other processes are picked up by polling the current row's visible fields.

use std::time::Duration;

use serde::Deserialize;
use time::OffsetDateTime;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dao::models::{ChangeEvent, ChangeKind};

use super::store::PostgrestSettingsStore;

/// Columns fetched on every poll. The display fields are included so edits are noticed
/// even when the table has no trigger maintaining `updated_at`.
pub(super) const FINGERPRINT_COLUMNS: &str = "id,updated_at,target_date,is_active,title,description";

/// Identity and display fields of the current row; any difference between two polls is a change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RowFingerprint {
    pub id: Uuid,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub target_date: OffsetDateTime,
    pub is_active: bool,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Compare two consecutive observations of the current row.
pub fn diff(
    previous: Option<&RowFingerprint>,
    current: Option<&RowFingerprint>,
) -> Option<ChangeEvent> {
    match (previous, current) {
        (None, None) => None,
        (None, Some(current)) => Some(ChangeEvent::countdown(ChangeKind::Insert, Some(current.id))),
        (Some(previous), None) => Some(ChangeEvent::countdown(ChangeKind::Delete, Some(previous.id))),
        (Some(previous), Some(current)) if previous.id != current.id => {
            Some(ChangeEvent::countdown(ChangeKind::Insert, Some(current.id)))
        }
        (Some(previous), Some(current)) if previous != current => {
            Some(ChangeEvent::countdown(ChangeKind::Update, Some(current.id)))
        }
        _ => None,
    }
}

/// Forward local write announcements and polled remote changes into `tx` until aborted.
pub(super) async fn run(
    store: PostgrestSettingsStore,
    poll_every: Duration,
    mut local: broadcast::Receiver<ChangeEvent>,
    tx: broadcast::Sender<ChangeEvent>,
) {
    let mut ticker = interval(poll_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // `None` until the first successful poll establishes a baseline.
    let mut baseline: Option<Option<RowFingerprint>> = None;

    loop {
        tokio::select! {
            received = local.recv() => match received {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "local change feed lagged");
                    let _ = tx.send(ChangeEvent::countdown(ChangeKind::Update, None));
                }
                Err(RecvError::Closed) => break,
            },
            _ = ticker.tick() => match store.fetch_fingerprint().await {
                Ok(current) => {
                    if let Some(previous) = &baseline {
                        if let Some(event) = diff(previous.as_ref(), current.as_ref()) {
                            debug!(kind = ?event.kind, "remote countdown change detected");
                            let _ = tx.send(event);
                        }
                    }
                    baseline = Some(current);
                }
                Err(err) => warn!(error = %err, "countdown change poll failed"),
            },
        }

        if tx.receiver_count() == 0 {
            break;
        }
    }
}
