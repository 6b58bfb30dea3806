use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::countdown::CountdownSettings;

/// Countdown configuration as exposed over HTTP and SSE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CountdownSettingsDto {
    pub id: Uuid,
    /// Absolute RFC 3339 instant at which the countdown reaches zero.
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub target_date: OffsetDateTime,
    pub is_active: bool,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub created_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub updated_at: Option<OffsetDateTime>,
    pub created_by: Option<String>,
}

impl From<CountdownSettings> for CountdownSettingsDto {
    fn from(settings: CountdownSettings) -> Self {
        Self {
            id: settings.id,
            target_date: settings.target_date,
            is_active: settings.is_active,
            title: settings.title,
            description: settings.description,
            created_at: settings.created_at,
            updated_at: settings.updated_at,
            created_by: settings.created_by,
        }
    }
}
