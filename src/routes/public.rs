use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::public::CountdownView, error::AppError, services::public_service, state::SharedState,
};

/// Public endpoints exposing the countdown to viewers.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/countdown", get(get_countdown))
        .route("/public/countdown/retry", post(retry_countdown))
}

#[utoipa::path(
    get,
    path = "/public/countdown",
    tag = "public",
    responses((status = 200, description = "Current countdown", body = CountdownView))
)]
/// Return the current countdown, including the last error when the store is unreachable.
pub async fn get_countdown(State(state): State<SharedState>) -> Json<CountdownView> {
    Json(public_service::get_countdown(&state).await)
}

#[utoipa::path(
    post,
    path = "/public/countdown/retry",
    tag = "public",
    responses(
        (status = 200, description = "Countdown reloaded", body = CountdownView),
        (status = 503, description = "Store still not configured or unreachable")
    )
)]
/// Reload the countdown from the store after a failure.
pub async fn retry_countdown(
    State(state): State<SharedState>,
) -> Result<Json<CountdownView>, AppError> {
    Ok(Json(public_service::retry(&state).await?))
}
