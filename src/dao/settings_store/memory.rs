//! In-process settings store with the same observable semantics as the hosted table.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::future::BoxFuture;
use time::{Duration, OffsetDateTime};
use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

use crate::{
    clock::SharedClock,
    dao::{
        models::{
            ChangeEvent, ChangeKind, CountdownSettingsEntity, CountdownSettingsPatch,
            NewCountdownSettings,
        },
        settings_store::{CHANGE_CHANNEL_CAPACITY, ChangeSubscription, SettingsStore},
        storage::{StorageError, StorageResult},
    },
};

#[derive(Debug, thiserror::Error)]
#[error("memory store is offline")]
struct Offline;

/// Settings store kept entirely in memory.
///
/// Timestamps are truncated to microseconds on write, like a `timestamptz` column.
#[derive(Clone)]
pub struct MemorySettingsStore {
    rows: Arc<RwLock<Vec<CountdownSettingsEntity>>>,
    changes: broadcast::Sender<ChangeEvent>,
    reachable: Arc<AtomicBool>,
    clock: SharedClock,
}

impl MemorySettingsStore {
    pub fn new(clock: SharedClock) -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
            changes,
            reachable: Arc::new(AtomicBool::new(true)),
            clock,
        }
    }

    /// Simulate the store going away (or coming back).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of rows currently stored.
    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    fn ensure_reachable(&self) -> StorageResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::unavailable(
                "memory store unreachable".into(),
                Offline,
            ))
        }
    }

    fn notify(&self, kind: ChangeKind, id: Uuid) {
        // No subscribers is fine.
        let _ = self.changes.send(ChangeEvent::countdown(kind, Some(id)));
    }
}

fn normalize(instant: OffsetDateTime) -> OffsetDateTime {
    let micros = instant.microsecond();
    instant
        .replace_microsecond(micros)
        .unwrap_or(instant)
}

fn check_title(title: &str) -> StorageResult<()> {
    if title.trim().is_empty() {
        return Err(StorageError::rejected(
            "new row violates check constraint \"countdown_settings_title_check\"",
        ));
    }
    Ok(())
}

/// Index of the current row: latest `created_at`, insertion order breaking ties.
fn latest_index(rows: &[CountdownSettingsEntity]) -> Option<usize> {
    rows.iter()
        .enumerate()
        .max_by_key(|(index, row)| (row.created_at, *index))
        .map(|(index, _)| index)
}

impl SettingsStore for MemorySettingsStore {
    fn latest(&self) -> BoxFuture<'static, StorageResult<Option<CountdownSettingsEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_reachable()?;
            let rows = store.rows.read().await;
            Ok(latest_index(&rows).map(|index| rows[index].clone()))
        })
    }

    fn insert(
        &self,
        settings: NewCountdownSettings,
    ) -> BoxFuture<'static, StorageResult<CountdownSettingsEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_reachable()?;
            check_title(&settings.title)?;

            let now = normalize(store.clock.now());
            let row = CountdownSettingsEntity {
                id: Uuid::new_v4(),
                target_date: normalize(settings.target_date),
                is_active: settings.is_active,
                title: settings.title,
                description: settings.description,
                created_at: Some(now),
                updated_at: Some(now),
                created_by: settings.created_by,
            };

            store.rows.write().await.push(row.clone());
            debug!(id = %row.id, "inserted countdown row");
            store.notify(ChangeKind::Insert, row.id);
            Ok(row)
        })
    }

    fn update(
        &self,
        id: Uuid,
        patch: CountdownSettingsPatch,
    ) -> BoxFuture<'static, StorageResult<CountdownSettingsEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_reachable()?;
            if let Some(title) = &patch.title {
                check_title(title)?;
            }

            let updated = {
                let mut rows = store.rows.write().await;
                let row = rows
                    .iter_mut()
                    .find(|row| row.id == id)
                    .ok_or_else(|| StorageError::not_found(format!("countdown row `{id}`")))?;
                patch.apply_to(row);
                row.target_date = normalize(row.target_date);
                row.updated_at = Some(normalize(store.clock.now()));
                row.clone()
            };

            store.notify(ChangeKind::Update, id);
            Ok(updated)
        })
    }

    fn reset_countdown(
        &self,
        hours_from_now: u32,
    ) -> BoxFuture<'static, StorageResult<CountdownSettingsEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_reachable()?;

            let updated = {
                let mut rows = store.rows.write().await;
                let index = latest_index(&rows)
                    .ok_or_else(|| StorageError::not_found("countdown row to reset"))?;

                let now = normalize(store.clock.now());
                let row = &mut rows[index];
                row.target_date = now + Duration::hours(i64::from(hours_from_now));
                row.updated_at = Some(now);
                row.clone()
            };

            store.notify(ChangeKind::Update, updated.id);
            Ok(updated)
        })
    }

    fn probe(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_reachable() })
    }

    fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription::new(self.changes.subscribe())
    }
}
