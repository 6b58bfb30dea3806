use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use time::OffsetDateTime;
use uuid::Uuid;

/// Name of the relational table holding countdown configuration rows.
pub const COUNTDOWN_TABLE: &str = "countdown_settings";

/// A `countdown_settings` row as returned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountdownSettingsEntity {
    /// Store-assigned identifier.
    pub id: Uuid,
    /// Absolute instant at which the countdown reaches zero.
    #[serde(with = "time::serde::rfc3339")]
    pub target_date: OffsetDateTime,
    /// When false the countdown reads as finished regardless of the target.
    pub is_active: bool,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    /// Free-form attribution of whoever created the row.
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Insert payload for a brand-new countdown row.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCountdownSettings {
    #[serde(with = "time::serde::rfc3339")]
    pub target_date: OffsetDateTime,
    pub is_active: bool,
    pub title: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
}

/// Partial update of a countdown row. Absent fields are left untouched by the store.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountdownSettingsPatch {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub target_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub title: Option<String>,
    /// `Some(None)` clears the description, `None` leaves it unchanged.
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
}

impl CountdownSettingsPatch {
    /// True when the patch would not change anything.
    pub fn is_empty(&self) -> bool {
        self.target_date.is_none()
            && self.is_active.is_none()
            && self.title.is_none()
            && self.description.is_none()
    }

    /// Apply the patch on top of an existing row.
    pub fn apply_to(&self, row: &mut CountdownSettingsEntity) {
        if let Some(target_date) = self.target_date {
            row.target_date = target_date;
        }
        if let Some(is_active) = self.is_active {
            row.is_active = is_active;
        }
        if let Some(title) = &self.title {
            row.title = title.clone();
        }
        if let Some(description) = &self.description {
            row.description = description.clone();
        }
    }
}

/// Kind of mutation reported by the store's change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Notification that something changed in a watched table.
///
/// Consumers treat it as a cue to re-fetch; the payload is informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: &'static str,
    pub kind: ChangeKind,
    pub record_id: Option<Uuid>,
}

impl ChangeEvent {
    pub fn countdown(kind: ChangeKind, record_id: Option<Uuid>) -> Self {
        Self {
            table: COUNTDOWN_TABLE,
            kind,
            record_id,
        }
    }
}
