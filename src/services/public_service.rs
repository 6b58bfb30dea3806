//! Service helpers that expose read-only public projections of the countdown.

use tracing::info;

use crate::{
    dto::public::CountdownView,
    error::ServiceError,
    services::sse_events,
    state::SharedState,
};

/// Return everything a viewer needs to render the countdown.
pub async fn get_countdown(state: &SharedState) -> CountdownView {
    state.engine().snapshot().await.into()
}

/// Manual retry: reload from the store and announce the result.
pub async fn retry(state: &SharedState) -> Result<CountdownView, ServiceError> {
    let settings = state.engine().load().await?;
    info!(id = %settings.id, "manual reload succeeded");
    sse_events::broadcast_settings(state, &settings);
    Ok(get_countdown(state).await)
}
