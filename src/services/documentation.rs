use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the countdown backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::public::get_countdown,
        crate::routes::public::retry_countdown,
        crate::routes::sse::public_stream,
        crate::routes::sse::admin_stream,
        crate::routes::admin::create_countdown,
        crate::routes::admin::update_countdown,
        crate::routes::admin::toggle_countdown,
        crate::routes::admin::reset_countdown,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::public::CountdownView,
            crate::dto::public::ErrorView,
            crate::dto::common::CountdownSettingsDto,
            crate::dto::admin::CreateCountdownRequest,
            crate::dto::admin::UpdateCountdownRequest,
            crate::dto::admin::ResetCountdownRequest,
            crate::dto::sse::AdminHandshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::CountdownTickEvent,
            crate::dto::sse::SettingsChangedEvent,
            crate::state::countdown::TimeRemaining,
            crate::state::countdown::Urgency,
            crate::state::engine::EnginePhase,
            crate::state::engine::ErrorKind,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "public", description = "Read-only countdown endpoints"),
        (name = "admin", description = "Countdown write operations guarded by the admin token"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_countdown_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/healthcheck",
            "/public/countdown",
            "/public/countdown/retry",
            "/sse/public",
            "/sse/admin",
            "/admin/countdown",
            "/admin/countdown/toggle",
            "/admin/countdown/reset",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }
}
