use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use validator::Validate;

use crate::{
    dto::{
        admin::{CreateCountdownRequest, ResetCountdownRequest, UpdateCountdownRequest},
        common::CountdownSettingsDto,
    },
    error::AppError,
    services::admin_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only endpoints writing the countdown configuration.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route(
            "/admin/countdown",
            post(create_countdown).patch(update_countdown),
        )
        .route("/admin/countdown/toggle", post(toggle_countdown))
        .route("/admin/countdown/reset", post(reset_countdown))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Create a new countdown; it becomes the current one for every viewer.
#[utoipa::path(
    post,
    path = "/admin/countdown",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = CreateCountdownRequest,
    responses(
        (status = 200, description = "Countdown created", body = CountdownSettingsDto),
        (status = 400, description = "Invalid payload"),
        (status = 422, description = "Rejected by the store"),
        (status = 503, description = "Store not configured or unreachable")
    )
)]
pub async fn create_countdown(
    State(state): State<SharedState>,
    Json(payload): Json<CreateCountdownRequest>,
) -> Result<Json<CountdownSettingsDto>, AppError> {
    payload.validate()?;
    Ok(Json(admin_service::create_countdown(&state, payload).await?))
}

/// Change any subset of target date, active flag, title and description.
#[utoipa::path(
    patch,
    path = "/admin/countdown",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = UpdateCountdownRequest,
    responses(
        (status = 200, description = "Countdown updated", body = CountdownSettingsDto),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "No countdown loaded yet"),
        (status = 422, description = "Rejected by the store"),
        (status = 503, description = "Store not configured or unreachable")
    )
)]
pub async fn update_countdown(
    State(state): State<SharedState>,
    Json(payload): Json<UpdateCountdownRequest>,
) -> Result<Json<CountdownSettingsDto>, AppError> {
    payload.validate()?;
    Ok(Json(admin_service::update_countdown(&state, payload).await?))
}

/// Pause or resume the countdown display.
#[utoipa::path(
    post,
    path = "/admin/countdown/toggle",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Active flag flipped", body = CountdownSettingsDto),
        (status = 409, description = "No countdown loaded yet"),
        (status = 503, description = "Store not configured or unreachable")
    )
)]
pub async fn toggle_countdown(
    State(state): State<SharedState>,
) -> Result<Json<CountdownSettingsDto>, AppError> {
    Ok(Json(admin_service::toggle_countdown(&state).await?))
}

/// Restart the countdown `hours_from_now` hours after the store's clock.
#[utoipa::path(
    post,
    path = "/admin/countdown/reset",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = ResetCountdownRequest,
    responses(
        (status = 200, description = "Countdown reset", body = CountdownSettingsDto),
        (status = 400, description = "Hours out of range"),
        (status = 409, description = "No countdown to reset"),
        (status = 503, description = "Store not configured or unreachable")
    )
)]
pub async fn reset_countdown(
    State(state): State<SharedState>,
    Json(payload): Json<ResetCountdownRequest>,
) -> Result<Json<CountdownSettingsDto>, AppError> {
    payload.validate()?;
    Ok(Json(admin_service::reset_countdown(&state, payload).await?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    match state.admin_channel().token().await {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin SSE stream not initialised yet".into(),
        )),
    }
}
