//! Locally-consistent view of the current countdown row.
//!
//! The engine is the only writer of its in-memory state. Store round-trips happen without
//! holding the state lock; results are adopted (or recorded as failures) afterwards, so the
//! last operation to complete wins.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    clock::SharedClock,
    config::BootstrapDefaults,
    dao::{
        models::{CountdownSettingsPatch, NewCountdownSettings},
        settings_store::{ChangeSubscription, SettingsStore, StoreHandle},
        storage::{StorageError, StorageResult},
    },
    state::countdown::{self, CountdownSettings, Derived, TimeRemaining, Urgency},
};

/// Lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    /// Nothing has been requested from the store yet.
    Uninitialized,
    /// First load in flight, no data resident.
    Loading,
    /// Settings are resident and ticking.
    Ready,
    /// Loading failed and there is no data to show.
    Errored,
}

/// Failures surfaced by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Store credentials are missing, malformed or refused by the store.
    #[error("store is not configured: {0}")]
    Configuration(String),
    #[error("store unreachable: {0}")]
    Connectivity(String),
    #[error("store request timed out")]
    Timeout,
    /// The store refused the write (constraint violation, bad payload).
    #[error("store rejected the request: {0}")]
    Rejected(String),
    #[error("no countdown settings are loaded")]
    NoCurrentSettings,
}

/// Coarse grouping of [`EngineError`] for callers that only need to tell failures apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Connectivity,
    Validation,
    NoCurrentSettings,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Configuration(_) => ErrorKind::Configuration,
            EngineError::Connectivity(_) | EngineError::Timeout => ErrorKind::Connectivity,
            EngineError::Rejected(_) => ErrorKind::Validation,
            EngineError::NoCurrentSettings => ErrorKind::NoCurrentSettings,
        }
    }

    /// Whether the failure means the store cannot currently be used at all.
    pub fn disconnects(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Connectivity
        )
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable { .. } => EngineError::Connectivity(err.to_string()),
            StorageError::Timeout => EngineError::Timeout,
            StorageError::Rejected { message } => EngineError::Rejected(message),
            StorageError::Unauthorized { message } => EngineError::Configuration(message),
            // The row addressed by the write no longer exists.
            StorageError::NotFound { .. } => EngineError::NoCurrentSettings,
        }
    }
}

/// Point-in-time copy of everything the engine knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub phase: EnginePhase,
    pub settings: Option<CountdownSettings>,
    pub remaining: TimeRemaining,
    pub finished: bool,
    pub urgency: Urgency,
    pub connected: bool,
    pub error: Option<EngineError>,
}

struct EngineState {
    phase: EnginePhase,
    settings: Option<CountdownSettings>,
    error: Option<EngineError>,
    derived: Derived,
}

/// Owns the resident countdown settings and keeps them in step with the store.
pub struct CountdownEngine {
    store: StoreHandle,
    clock: SharedClock,
    bootstrap: BootstrapDefaults,
    request_timeout: Duration,
    state: RwLock<EngineState>,
    /// Serializes bootstrap so an empty store only ever receives one default row per engine.
    bootstrap_gate: Mutex<()>,
    connected: watch::Sender<bool>,
}

impl CountdownEngine {
    pub fn new(
        store: StoreHandle,
        clock: SharedClock,
        bootstrap: BootstrapDefaults,
        request_timeout: Duration,
    ) -> Self {
        let (connected, _rx) = watch::channel(false);
        Self {
            store,
            clock,
            bootstrap,
            request_timeout,
            state: RwLock::new(EngineState {
                phase: EnginePhase::Uninitialized,
                settings: None,
                error: None,
                derived: Derived::default(),
            }),
            bootstrap_gate: Mutex::new(()),
            connected,
        }
    }

    /// Fetch the current row, creating the default one if the store is empty.
    ///
    /// On failure the previous settings are kept and the error is recorded.
    pub async fn load(&self) -> Result<CountdownSettings, EngineError> {
        {
            let mut state = self.state.write().await;
            if state.settings.is_none() {
                state.phase = EnginePhase::Loading;
            }
        }

        let outcome = match self.connected_store() {
            Ok(store) => self.fetch_or_bootstrap(store).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(settings) => {
                debug!(id = %settings.id, "countdown settings loaded");
                self.adopt(settings.clone()).await;
                Ok(settings)
            }
            Err(err) => {
                warn!(error = %err, "failed to load countdown settings");
                self.record_failure(err.clone(), true).await;
                Err(err)
            }
        }
    }

    /// Recompute the remaining time from resident settings and the clock.
    ///
    /// Returns `None` until settings are resident. Store connectivity plays no part: the
    /// retained settings keep counting down while the store is unreachable.
    pub async fn tick(&self) -> Option<Derived> {
        let mut state = self.state.write().await;
        let settings = state.settings.as_ref()?;
        let derived = countdown::derive(settings, self.clock.now());
        state.derived = derived;
        Some(derived)
    }

    /// Apply a partial update to the current row and adopt the store's version of it.
    pub async fn save(
        &self,
        patch: CountdownSettingsPatch,
    ) -> Result<CountdownSettings, EngineError> {
        let id = {
            let state = self.state.read().await;
            state
                .settings
                .as_ref()
                .map(|settings| settings.id)
                .ok_or(EngineError::NoCurrentSettings)?
        };

        let outcome = match self.connected_store() {
            Ok(store) => self.bounded(store.update(id, patch)).await,
            Err(err) => Err(err),
        };
        self.finish_write(outcome, "save").await
    }

    /// Flip `is_active` on the current row.
    pub async fn toggle_active(&self) -> Result<CountdownSettings, EngineError> {
        let is_active = {
            let state = self.state.read().await;
            state
                .settings
                .as_ref()
                .map(|settings| settings.is_active)
                .ok_or(EngineError::NoCurrentSettings)?
        };

        self.save(CountdownSettingsPatch {
            is_active: Some(!is_active),
            ..Default::default()
        })
        .await
    }

    /// Insert a brand-new countdown, which becomes current.
    pub async fn create(
        &self,
        settings: NewCountdownSettings,
    ) -> Result<CountdownSettings, EngineError> {
        let outcome = match self.connected_store() {
            Ok(store) => self.bounded(store.insert(settings)).await,
            Err(err) => Err(err),
        };
        self.finish_write(outcome, "create").await
    }

    /// Retarget the current row to `hours_from_now` hours after the store's own clock.
    pub async fn reset(&self, hours_from_now: u32) -> Result<CountdownSettings, EngineError> {
        let outcome = match self.connected_store() {
            Ok(store) => self.bounded(store.reset_countdown(hours_from_now)).await,
            Err(err) => Err(err),
        };
        self.finish_write(outcome, "reset").await
    }

    /// Display urgency of the last computed remaining time.
    pub async fn urgency_class(&self) -> Urgency {
        let state = self.state.read().await;
        Urgency::from_remaining(&state.derived.remaining)
    }

    pub async fn phase(&self) -> EnginePhase {
        self.state.read().await.phase
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        let state = self.state.read().await;
        EngineSnapshot {
            phase: state.phase,
            settings: state.settings.clone(),
            remaining: state.derived.remaining,
            finished: state.derived.finished,
            urgency: Urgency::from_remaining(&state.derived.remaining),
            connected: *self.connected.borrow(),
            error: state.error.clone(),
        }
    }

    /// Bounded connectivity check that leaves engine state untouched.
    pub async fn probe(&self) -> Result<(), EngineError> {
        let store = self.connected_store()?;
        self.bounded(store.probe()).await
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_configured()
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Subscribe to changes of the connected flag.
    pub fn connection_watcher(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Register on the store's change feed; inert when no store is configured.
    pub fn subscribe_changes(&self) -> ChangeSubscription {
        match &self.store {
            StoreHandle::Connected(store) => store.subscribe(),
            StoreHandle::Unconfigured { .. } => ChangeSubscription::inert(),
        }
    }

    fn connected_store(&self) -> Result<&dyn SettingsStore, EngineError> {
        match &self.store {
            StoreHandle::Connected(store) => Ok(store.as_ref()),
            StoreHandle::Unconfigured { reason } => {
                Err(EngineError::Configuration(reason.clone()))
            }
        }
    }

    async fn fetch_or_bootstrap(
        &self,
        store: &dyn SettingsStore,
    ) -> Result<CountdownSettings, EngineError> {
        if let Some(row) = self.bounded(store.latest()).await? {
            return Ok(row.into());
        }

        let _gate = self.bootstrap_gate.lock().await;
        // Another load may have bootstrapped while we waited for the gate.
        if let Some(row) = self.bounded(store.latest()).await? {
            return Ok(row.into());
        }

        let row = self
            .bounded(store.insert(self.bootstrap.new_settings(self.clock.now())))
            .await?;
        info!(
            id = %row.id,
            target_date = %row.target_date,
            "store was empty; bootstrapped default countdown"
        );
        Ok(row.into())
    }

    async fn bounded<T>(
        &self,
        call: BoxFuture<'static, StorageResult<T>>,
    ) -> Result<T, EngineError> {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::Timeout),
        }
    }

    async fn finish_write<R>(
        &self,
        outcome: Result<R, EngineError>,
        operation: &'static str,
    ) -> Result<CountdownSettings, EngineError>
    where
        R: Into<CountdownSettings>,
    {
        match outcome {
            Ok(row) => {
                let settings = row.into();
                info!(id = %settings.id, operation, "countdown settings written");
                self.adopt(settings.clone()).await;
                Ok(settings)
            }
            Err(err) => {
                warn!(error = %err, operation, "countdown write failed");
                self.record_failure(err.clone(), false).await;
                Err(err)
            }
        }
    }

    async fn adopt(&self, settings: CountdownSettings) {
        {
            let mut state = self.state.write().await;
            state.derived = countdown::derive(&settings, self.clock.now());
            state.settings = Some(settings);
            state.phase = EnginePhase::Ready;
            state.error = None;
        }
        self.set_connected(true);
    }

    async fn record_failure(&self, err: EngineError, during_load: bool) {
        let disconnects = err.disconnects();
        {
            let mut state = self.state.write().await;
            if during_load && state.settings.is_none() {
                state.phase = EnginePhase::Errored;
            }
            state.error = Some(err);
        }
        if disconnects {
            self.set_connected(false);
        }
    }

    fn set_connected(&self, value: bool) {
        self.connected.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}
