pub mod memory;
#[cfg(feature = "postgrest-store")]
pub mod postgrest;

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::dao::{
    models::{ChangeEvent, CountdownSettingsEntity, CountdownSettingsPatch, NewCountdownSettings},
    storage::StorageResult,
};

/// Capacity of the per-store change broadcast channel.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 32;

/// Abstraction over the persistence layer holding countdown configuration.
pub trait SettingsStore: Send + Sync {
    /// Most recently created row, if any.
    fn latest(&self) -> BoxFuture<'static, StorageResult<Option<CountdownSettingsEntity>>>;
    fn insert(
        &self,
        settings: NewCountdownSettings,
    ) -> BoxFuture<'static, StorageResult<CountdownSettingsEntity>>;
    fn update(
        &self,
        id: Uuid,
        patch: CountdownSettingsPatch,
    ) -> BoxFuture<'static, StorageResult<CountdownSettingsEntity>>;
    /// Atomically retarget the current row to `now + hours_from_now` on the store side.
    fn reset_countdown(
        &self,
        hours_from_now: u32,
    ) -> BoxFuture<'static, StorageResult<CountdownSettingsEntity>>;
    /// Cheap round-trip used to check connectivity.
    fn probe(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Register for change notifications on the settings table.
    fn subscribe(&self) -> ChangeSubscription;
}

/// Store handle that may or may not have been configured.
#[derive(Clone)]
pub enum StoreHandle {
    /// Credentials are missing or malformed; nothing can be sent to the store.
    Unconfigured { reason: String },
    Connected(Arc<dyn SettingsStore>),
}

impl StoreHandle {
    pub fn connected(store: impl SettingsStore + 'static) -> Self {
        StoreHandle::Connected(Arc::new(store))
    }

    pub fn unconfigured(reason: impl Into<String>) -> Self {
        StoreHandle::Unconfigured {
            reason: reason.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, StoreHandle::Connected(_))
    }
}

/// Live registration on a store's change feed.
///
/// Dropping the subscription unsubscribes and stops any watcher task spawned for it.
pub struct ChangeSubscription {
    receiver: Option<broadcast::Receiver<ChangeEvent>>,
    watcher: Option<JoinHandle<()>>,
}

impl ChangeSubscription {
    pub fn new(receiver: broadcast::Receiver<ChangeEvent>) -> Self {
        Self {
            receiver: Some(receiver),
            watcher: None,
        }
    }

    /// Subscription that never yields, used when no store is configured.
    pub fn inert() -> Self {
        Self {
            receiver: None,
            watcher: None,
        }
    }

    /// Tie a background watcher to the lifetime of this subscription.
    pub fn with_watcher(mut self, watcher: JoinHandle<()>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Wait for the next change. Missed notifications collapse into a single wake-up.
    ///
    /// Returns `None` once the feed is closed; an inert subscription waits forever.
    pub async fn changed(&mut self) -> Option<ChangeEvent> {
        let Some(receiver) = self.receiver.as_mut() else {
            return futures::future::pending().await;
        };

        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "change feed lagged; coalescing into one reload");
                    *receiver = receiver.resubscribe();
                    return Some(ChangeEvent::countdown(
                        crate::dao::models::ChangeKind::Update,
                        None,
                    ));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}
