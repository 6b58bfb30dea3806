//! Background tasks keeping the engine ticking and in step with the store.

use std::time::Duration;

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval, sleep},
};
use tracing::{debug, info, warn};

use crate::{
    dao::settings_store::ChangeSubscription,
    services::sse_events,
    state::SharedState,
};

/// Cadence of the countdown derivation.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);
const RETRY_INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

/// Timing knobs of the runtime.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeTiming {
    pub tick_period: Duration,
    /// First delay before reloading after the store became unreachable; doubles up to `retry_max`.
    pub retry_initial: Duration,
    pub retry_max: Duration,
}

impl Default for RuntimeTiming {
    fn default() -> Self {
        Self {
            tick_period: TICK_PERIOD,
            retry_initial: RETRY_INITIAL_DELAY,
            retry_max: RETRY_MAX_DELAY,
        }
    }
}

/// Handle on the tick loop, change listener, status watcher and reconnect supervisor.
///
/// Dropping it stops every task and releases the change subscription.
pub struct CountdownRuntime {
    tasks: Vec<JoinHandle<()>>,
}

impl CountdownRuntime {
    /// Start with the default timing.
    pub async fn start(state: SharedState) -> Self {
        Self::start_with(state, RuntimeTiming::default()).await
    }

    /// Subscribe to store changes, perform the initial load and spawn the background tasks.
    pub async fn start_with(state: SharedState, timing: RuntimeTiming) -> Self {
        // Subscribe first so a change landing during the initial load is not missed.
        let subscription = state.engine().subscribe_changes();
        let connection = state.connection_watcher();

        match state.engine().load().await {
            Ok(settings) => {
                info!(id = %settings.id, title = %settings.title, "countdown loaded");
                sse_events::broadcast_settings(&state, &settings);
            }
            Err(err) => warn!(error = %err, "initial countdown load failed"),
        }

        let tasks = vec![
            tokio::spawn(run_ticker(state.clone(), timing.tick_period)),
            tokio::spawn(run_change_listener(state.clone(), subscription)),
            tokio::spawn(run_status_watcher(state.clone(), connection.clone())),
            tokio::spawn(run_reconnect_supervisor(state, connection, timing)),
        ];

        Self { tasks }
    }
}

impl Drop for CountdownRuntime {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

async fn run_ticker(state: SharedState, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Some(derived) = state.engine().tick().await {
            sse_events::broadcast_tick(&state, derived);
        }
    }
}

/// Re-fetch on every notification; the payload only says that something changed.
async fn run_change_listener(state: SharedState, mut subscription: ChangeSubscription) {
    while let Some(change) = subscription.changed().await {
        debug!(table = change.table, kind = ?change.kind, "store change received");
        match state.engine().load().await {
            Ok(settings) => sse_events::broadcast_settings(&state, &settings),
            Err(err) => warn!(error = %err, "reload after store change failed"),
        }
    }
    info!("store change feed closed");
}

async fn run_status_watcher(state: SharedState, mut connection: watch::Receiver<bool>) {
    while connection.changed().await.is_ok() {
        let connected = *connection.borrow_and_update();
        if connected {
            info!("store reachable; leaving degraded mode");
        } else {
            warn!("store unreachable; entering degraded mode");
        }
        sse_events::broadcast_system_status(&state, !connected);
    }
}

/// Reload with exponential backoff whenever the store connection is lost.
async fn run_reconnect_supervisor(
    state: SharedState,
    mut connection: watch::Receiver<bool>,
    timing: RuntimeTiming,
) {
    if !state.engine().is_configured() {
        // Missing credentials never heal on their own.
        return;
    }

    loop {
        if connection.wait_for(|connected| !connected).await.is_err() {
            return;
        }

        let mut delay = timing.retry_initial;
        loop {
            sleep(delay).await;
            match state.engine().load().await {
                Ok(settings) => {
                    info!(id = %settings.id, "store reconnected");
                    sse_events::broadcast_settings(&state, &settings);
                    break;
                }
                Err(err) => {
                    warn!(error = %err, retry_in = ?delay, "store reconnect attempt failed");
                    delay = (delay * 2).min(timing.retry_max);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;
    use time::macros::datetime;
    use tokio::sync::broadcast::{
        self,
        error::{RecvError, TryRecvError},
    };

    use super::*;
    use crate::{
        clock::FixedClock,
        config::BootstrapDefaults,
        dao::{
            models::CountdownSettingsPatch,
            settings_store::{SettingsStore, StoreHandle, memory::MemorySettingsStore},
        },
        dto::sse::ServerEvent,
        state::{AppState, engine::CountdownEngine},
    };

    const FAST: RuntimeTiming = RuntimeTiming {
        tick_period: Duration::from_millis(10),
        retry_initial: Duration::from_millis(10),
        retry_max: Duration::from_millis(40),
    };

    fn fixture() -> (SharedState, MemorySettingsStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(datetime!(2025-08-15 09:30 UTC)));
        let store = MemorySettingsStore::new(clock.clone());
        let engine = CountdownEngine::new(
            StoreHandle::connected(store.clone()),
            clock.clone(),
            BootstrapDefaults::default(),
            Duration::from_secs(5),
        );
        (AppState::new(Arc::new(engine)), store, clock)
    }

    /// Wait for the next `name` event whose JSON payload satisfies `accept`.
    async fn next_matching(
        rx: &mut broadcast::Receiver<ServerEvent>,
        name: &str,
        accept: impl Fn(&Value) -> bool,
    ) -> Value {
        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(event) if event.event.as_deref() == Some(name) => {
                        let payload: Value = serde_json::from_str(&event.data).unwrap();
                        if accept(&payload) {
                            return payload;
                        }
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => panic!("hub closed"),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(2), wait)
            .await
            .unwrap_or_else(|_| panic!("no matching `{name}` event received"))
    }

    async fn next_named(rx: &mut broadcast::Receiver<ServerEvent>, name: &str) -> Value {
        next_matching(rx, name, |_| true).await
    }

    fn drain(rx: &mut broadcast::Receiver<ServerEvent>) {
        loop {
            match rx.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    #[tokio::test]
    async fn start_bootstraps_and_announces_settings() {
        let (state, store, _clock) = fixture();
        let mut public = state.public_sse().subscribe();

        let _runtime = CountdownRuntime::start_with(state.clone(), FAST).await;

        let payload = next_named(&mut public, sse_events::EVENT_COUNTDOWN_SETTINGS).await;
        assert_eq!(payload["title"], "LES RÉSULTATS SERONT DISPONIBLES DANS");
        assert_eq!(payload["target_date"], "2025-08-16T09:30:00Z");
        assert_eq!(store.row_count().await, 1);
    }

    #[tokio::test]
    async fn ticker_broadcasts_remaining_time() {
        let (state, _store, _clock) = fixture();
        let mut public = state.public_sse().subscribe();
        let _runtime = CountdownRuntime::start_with(state.clone(), FAST).await;

        let payload = next_named(&mut public, sse_events::EVENT_COUNTDOWN_TICK).await;
        assert_eq!(payload["formatted"], "01:00:00:00");
        assert_eq!(payload["total_seconds"], 86_400);
        assert_eq!(payload["urgency"], "urgent");
        assert_eq!(payload["finished"], false);
    }

    #[tokio::test]
    async fn writes_from_another_process_converge() {
        let (state, store, clock) = fixture();
        let _runtime = CountdownRuntime::start_with(state.clone(), FAST).await;
        let mut public = state.public_sse().subscribe();
        let current = state.engine().snapshot().await.settings.unwrap();

        // A second writer sharing the store, as another admin session would.
        let other = CountdownEngine::new(
            StoreHandle::connected(store.clone()),
            clock.clone(),
            BootstrapDefaults::default(),
            Duration::from_secs(5),
        );
        other.load().await.unwrap();
        other
            .save(CountdownSettingsPatch {
                title: Some("Résultats officiels".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        next_matching(&mut public, sse_events::EVENT_COUNTDOWN_SETTINGS, |payload| {
            payload["title"] == "Résultats officiels"
        })
        .await;
        let resident = state.engine().snapshot().await.settings.unwrap();
        assert_eq!(resident.id, current.id);
        assert_eq!(resident.title, "Résultats officiels");
    }

    #[tokio::test]
    async fn toggle_on_one_engine_reaches_another_through_its_listener() {
        let (writer, store, clock) = fixture();
        let viewer = AppState::new(Arc::new(CountdownEngine::new(
            StoreHandle::connected(store.clone()),
            clock.clone(),
            BootstrapDefaults::default(),
            Duration::from_secs(5),
        )));
        let _writer_runtime = CountdownRuntime::start_with(writer.clone(), FAST).await;
        let _viewer_runtime = CountdownRuntime::start_with(viewer.clone(), FAST).await;
        let mut viewer_public = viewer.public_sse().subscribe();
        assert!(viewer.engine().snapshot().await.settings.unwrap().is_active);

        let toggled = writer.engine().toggle_active().await.unwrap();
        assert!(!toggled.is_active);

        next_matching(&mut viewer_public, sse_events::EVENT_COUNTDOWN_SETTINGS, |payload| {
            payload["is_active"] == false
        })
        .await;
        assert_eq!(viewer.engine().snapshot().await.settings, Some(toggled));
        assert!(viewer.engine().tick().await.unwrap().finished);
        assert_eq!(store.row_count().await, 1);
    }

    #[tokio::test]
    async fn lost_store_is_reported_and_recovered() {
        let (state, store, _clock) = fixture();
        let _runtime = CountdownRuntime::start_with(state.clone(), FAST).await;
        let mut admin = state.admin_sse().subscribe();

        store.set_reachable(false);
        assert!(state.engine().load().await.is_err());
        next_matching(&mut admin, sse_events::EVENT_SYSTEM_STATUS, |payload| {
            payload["degraded"] == true
        })
        .await;
        assert!(state.is_degraded());

        store.set_reachable(true);
        next_matching(&mut admin, sse_events::EVENT_SYSTEM_STATUS, |payload| {
            payload["degraded"] == false
        })
        .await;
        assert!(!state.is_degraded());
    }

    #[tokio::test]
    async fn dropping_the_runtime_stops_ticking_and_unsubscribes() {
        let (state, store, _clock) = fixture();
        let runtime = CountdownRuntime::start_with(state.clone(), FAST).await;
        let mut public = state.public_sse().subscribe();
        next_named(&mut public, sse_events::EVENT_COUNTDOWN_TICK).await;

        drop(runtime);
        tokio::task::yield_now().await;
        drain(&mut public);

        sleep(Duration::from_millis(100)).await;
        assert!(matches!(public.try_recv(), Err(TryRecvError::Empty)));

        // No listener is left to reload on writes.
        let id = state.engine().snapshot().await.settings.unwrap().id;
        store
            .update(
                id,
                CountdownSettingsPatch {
                    title: Some("après arrêt".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        sleep(Duration::from_millis(50)).await;
        let resident = state.engine().snapshot().await.settings.unwrap();
        assert_ne!(resident.title, "après arrêt");
    }
}
