/// Admin service for countdown write operations.
pub mod admin_service;
/// Tick loop, change listener and reconnect supervisor.
pub mod countdown_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Public service for read-only countdown information.
pub mod public_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
