use tracing::warn;

use crate::{
    dto::health::{HealthResponse, HealthStatus},
    state::SharedState,
};

/// Probe the store with a bounded request and report the outcome.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let engine = state.engine();
    let phase = engine.phase().await;

    if !engine.is_configured() {
        warn!("store credentials missing; running unconfigured");
        return HealthResponse::new(HealthStatus::Unconfigured, phase);
    }

    match engine.probe().await {
        Ok(()) => HealthResponse::new(HealthStatus::Ok, phase),
        Err(err) => {
            warn!(error = %err, "store health check failed");
            HealthResponse::new(HealthStatus::Degraded, phase).with_detail(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        clock::SystemClock,
        config::BootstrapDefaults,
        dao::settings_store::{StoreHandle, memory::MemorySettingsStore},
        state::{
            AppState,
            engine::{CountdownEngine, EnginePhase},
        },
    };

    fn state_with(store: StoreHandle) -> SharedState {
        AppState::new(Arc::new(CountdownEngine::new(
            store,
            Arc::new(SystemClock),
            BootstrapDefaults::default(),
            Duration::from_secs(1),
        )))
    }

    #[tokio::test]
    async fn reports_each_store_condition() {
        let unconfigured = state_with(StoreHandle::unconfigured("no url"));
        let health = health_status(&unconfigured).await;
        assert_eq!(health.status, HealthStatus::Unconfigured);
        assert_eq!(health.detail, None);

        let store = MemorySettingsStore::new(Arc::new(SystemClock));
        let state = state_with(StoreHandle::connected(store.clone()));
        assert_eq!(health_status(&state).await.status, HealthStatus::Ok);

        store.set_reachable(false);
        let health = health_status(&state).await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert!(health.detail.is_some());
    }

    #[tokio::test]
    async fn probing_does_not_load_settings() {
        let store = MemorySettingsStore::new(Arc::new(SystemClock));
        let state = state_with(StoreHandle::connected(store));

        let health = health_status(&state).await;
        assert_eq!(health.phase, EnginePhase::Uninitialized);
        assert_eq!(state.engine().phase().await, EnginePhase::Uninitialized);
    }
}
