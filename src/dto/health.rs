use serde::Serialize;
use utoipa::ToSchema;

use crate::state::engine::EnginePhase;

/// Outcome of the bounded store probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    /// The store is configured but did not answer the probe.
    Degraded,
    /// No store credentials were provided.
    Unconfigured,
}

/// Body of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Engine lifecycle when the probe ran.
    pub phase: EnginePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthResponse {
    pub fn new(status: HealthStatus, phase: EnginePhase) -> Self {
        Self {
            status,
            phase,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
