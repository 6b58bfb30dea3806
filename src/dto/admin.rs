//! DTO definitions used by the admin REST API and documentation layer.

use serde::Deserialize;
use time::OffsetDateTime;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::dao::models::{CountdownSettingsPatch, NewCountdownSettings};
use crate::dto::validation::{validate_description, validate_title};

/// Hours used by a reset request that does not say otherwise.
pub const DEFAULT_RESET_HOURS: u32 = 24;

fn default_true() -> bool {
    true
}

fn default_reset_hours() -> u32 {
    DEFAULT_RESET_HOURS
}

/// Payload creating a brand-new countdown, which becomes the current one.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCountdownRequest {
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub target_date: OffsetDateTime,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form attribution stored alongside the row.
    #[serde(default)]
    pub created_by: Option<String>,
}

impl Validate for CreateCountdownRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_title(&self.title) {
            errors.add("title", e);
        }
        if let Some(ref description) = self.description {
            if let Err(e) = validate_description(description) {
                errors.add("description", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<CreateCountdownRequest> for NewCountdownSettings {
    fn from(request: CreateCountdownRequest) -> Self {
        Self {
            target_date: request.target_date,
            is_active: request.is_active,
            title: request.title,
            description: request.description,
            created_by: request.created_by,
        }
    }
}

/// Partial update of the current countdown. Omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCountdownRequest {
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub target_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub title: Option<String>,
    /// If not specified, does not change it.
    /// If null is specified, removes the description.
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
}

impl Validate for UpdateCountdownRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.target_date.is_none()
            && self.is_active.is_none()
            && self.title.is_none()
            && self.description.is_none()
        {
            let mut err = ValidationError::new("empty_update");
            err.message = Some("Update must change at least one field".into());
            errors.add("__all__", err);
        }
        if let Some(ref title) = self.title {
            if let Err(e) = validate_title(title) {
                errors.add("title", e);
            }
        }
        if let Some(Some(ref description)) = self.description {
            if let Err(e) = validate_description(description) {
                errors.add("description", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<UpdateCountdownRequest> for CountdownSettingsPatch {
    fn from(request: UpdateCountdownRequest) -> Self {
        Self {
            target_date: request.target_date,
            is_active: request.is_active,
            title: request.title,
            description: request.description,
        }
    }
}

/// Request to move the target to `hours_from_now` hours after the store's clock.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ResetCountdownRequest {
    #[serde(default = "default_reset_hours")]
    #[validate(range(min = 1, max = 8760))]
    pub hours_from_now: u32,
}

impl Default for ResetCountdownRequest {
    fn default() -> Self {
        Self {
            hours_from_now: DEFAULT_RESET_HOURS,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn create_request_defaults_to_active() {
        let request: CreateCountdownRequest = serde_json::from_value(json!({
            "target_date": "2025-09-01T18:00:00+02:00",
            "title": "Résultats"
        }))
        .unwrap();
        assert!(request.is_active);
        assert!(request.validate().is_ok());

        let row = NewCountdownSettings::from(request);
        assert_eq!(row.target_date, datetime!(2025-09-01 16:00 UTC));
    }

    #[test]
    fn create_request_rejects_blank_title() {
        let request: CreateCountdownRequest = serde_json::from_value(json!({
            "target_date": "2025-09-01T18:00:00Z",
            "title": "  "
        }))
        .unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
    }

    #[test]
    fn update_request_distinguishes_null_from_absent_description() {
        let cleared: UpdateCountdownRequest =
            serde_json::from_value(json!({ "description": null })).unwrap();
        assert_eq!(cleared.description, Some(None));
        assert!(cleared.validate().is_ok());

        let untouched: UpdateCountdownRequest =
            serde_json::from_value(json!({ "is_active": false })).unwrap();
        let patch = CountdownSettingsPatch::from(untouched);
        assert_eq!(patch.description, None);
        assert_eq!(patch.is_active, Some(false));
    }

    #[test]
    fn empty_update_is_invalid() {
        let request: UpdateCountdownRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn oversized_description_is_invalid() {
        let request = UpdateCountdownRequest {
            description: Some(Some("a".repeat(2001))),
            ..Default::default()
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("description"));
    }

    #[test]
    fn reset_hours_are_bounded() {
        let request: ResetCountdownRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request.hours_from_now, DEFAULT_RESET_HOURS);
        assert!(request.validate().is_ok());

        assert!(ResetCountdownRequest { hours_from_now: 0 }.validate().is_err());
        assert!(ResetCountdownRequest { hours_from_now: 8761 }.validate().is_err());
        assert!(ResetCountdownRequest { hours_from_now: 8760 }.validate().is_ok());
    }
}
