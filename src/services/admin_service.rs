//! Business logic powering the admin REST routes. Every write goes through the
//! engine so the resident state is the store's answer, never a local merge.
//! Viewers are updated by the change listener once the store announces the write.

use tracing::{debug, info};

use crate::{
    dao::models::CountdownSettingsPatch,
    dto::{
        admin::{CreateCountdownRequest, ResetCountdownRequest, UpdateCountdownRequest},
        common::CountdownSettingsDto,
    },
    error::ServiceError,
    state::SharedState,
};

/// Create a new countdown which becomes the current one.
pub async fn create_countdown(
    state: &SharedState,
    request: CreateCountdownRequest,
) -> Result<CountdownSettingsDto, ServiceError> {
    let settings = state.engine().create(request.into()).await?;
    info!(id = %settings.id, target_date = %settings.target_date, "countdown created");
    Ok(settings.into())
}

/// Apply a partial update to the current countdown.
pub async fn update_countdown(
    state: &SharedState,
    request: UpdateCountdownRequest,
) -> Result<CountdownSettingsDto, ServiceError> {
    let patch = CountdownSettingsPatch::from(request);
    debug!(?patch, "updating countdown");
    let settings = state.engine().save(patch).await?;
    Ok(settings.into())
}

/// Flip the active flag of the current countdown.
pub async fn toggle_countdown(state: &SharedState) -> Result<CountdownSettingsDto, ServiceError> {
    let settings = state.engine().toggle_active().await?;
    info!(id = %settings.id, is_active = settings.is_active, "countdown toggled");
    Ok(settings.into())
}

/// Restart the current countdown relative to the store's clock.
pub async fn reset_countdown(
    state: &SharedState,
    request: ResetCountdownRequest,
) -> Result<CountdownSettingsDto, ServiceError> {
    let settings = state.engine().reset(request.hours_from_now).await?;
    info!(
        id = %settings.id,
        hours_from_now = request.hours_from_now,
        target_date = %settings.target_date,
        "countdown reset"
    );
    Ok(settings.into())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use time::macros::datetime;

    use super::*;
    use crate::{
        clock::FixedClock,
        config::BootstrapDefaults,
        dao::settings_store::{StoreHandle, memory::MemorySettingsStore},
        state::{AppState, engine::CountdownEngine},
    };

    fn state_with(store: StoreHandle, clock: Arc<FixedClock>) -> SharedState {
        AppState::new(Arc::new(CountdownEngine::new(
            store,
            clock,
            BootstrapDefaults::default(),
            Duration::from_secs(5),
        )))
    }

    async fn loaded_state() -> (SharedState, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(datetime!(2025-03-20 08:00 UTC)));
        let store = MemorySettingsStore::new(clock.clone());
        let state = state_with(StoreHandle::connected(store), clock.clone());
        state.engine().load().await.unwrap();
        (state, clock)
    }

    #[tokio::test]
    async fn update_returns_the_stored_row() {
        let (state, _clock) = loaded_state().await;
        let dto = update_countdown(
            &state,
            UpdateCountdownRequest {
                title: Some("Palmarès".into()),
                description: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(dto.title, "Palmarès");
        assert!(dto.description.is_none());
        assert!(dto.is_active);
    }

    #[tokio::test]
    async fn toggle_and_reset_go_through_the_engine() {
        let (state, clock) = loaded_state().await;
        assert!(!toggle_countdown(&state).await.unwrap().is_active);

        clock.advance(time::Duration::minutes(30));
        let dto = reset_countdown(&state, ResetCountdownRequest { hours_from_now: 2 })
            .await
            .unwrap();
        assert_eq!(dto.target_date, datetime!(2025-03-20 10:30 UTC));
        assert_eq!(
            state.engine().snapshot().await.settings.map(|s| s.target_date),
            Some(dto.target_date)
        );
    }

    #[tokio::test]
    async fn writes_without_settings_are_invalid_state() {
        let clock = Arc::new(FixedClock::new(datetime!(2025-03-20 08:00 UTC)));
        let state = state_with(
            StoreHandle::connected(MemorySettingsStore::new(clock.clone())),
            clock,
        );

        assert!(matches!(
            toggle_countdown(&state).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn unconfigured_store_is_reported_as_such() {
        let clock = Arc::new(FixedClock::new(datetime!(2025-03-20 08:00 UTC)));
        let state = state_with(StoreHandle::unconfigured("SUPABASE_URL is not set"), clock);

        let err = reset_countdown(&state, ResetCountdownRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured(_)));
    }
}
