use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::CountdownSettingsEntity;

const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_MINUTE: u64 = 60;

/// Days remaining at or above which the countdown is displayed as normal.
pub const URGENCY_THRESHOLD_DAYS: u64 = 4;

/// Countdown configuration as held by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownSettings {
    pub id: Uuid,
    pub target_date: OffsetDateTime,
    pub is_active: bool,
    pub title: String,
    pub description: Option<String>,
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
    pub created_by: Option<String>,
}

impl From<CountdownSettingsEntity> for CountdownSettings {
    fn from(entity: CountdownSettingsEntity) -> Self {
        Self {
            id: entity.id,
            target_date: entity.target_date,
            is_active: entity.is_active,
            title: entity.title,
            description: entity.description,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            created_by: entity.created_by,
        }
    }
}

/// Time left before the target instant, decomposed for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct TimeRemaining {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl TimeRemaining {
    pub const ZERO: Self = Self {
        days: 0,
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    /// Floor-decompose a number of seconds into days/hours/minutes/seconds.
    pub fn from_seconds(total: u64) -> Self {
        Self {
            days: total / SECONDS_PER_DAY,
            hours: (total % SECONDS_PER_DAY) / SECONDS_PER_HOUR,
            minutes: (total % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE,
            seconds: total % SECONDS_PER_MINUTE,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        self.days * SECONDS_PER_DAY
            + self.hours * SECONDS_PER_HOUR
            + self.minutes * SECONDS_PER_MINUTE
            + self.seconds
    }
}

impl fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// Two-valued display policy derived from the days remaining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Urgent,
}

impl Urgency {
    pub fn from_remaining(remaining: &TimeRemaining) -> Self {
        if remaining.days >= URGENCY_THRESHOLD_DAYS {
            Urgency::Normal
        } else {
            Urgency::Urgent
        }
    }
}

/// Result of one tick: what to display and whether the countdown is over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Derived {
    pub remaining: TimeRemaining,
    pub finished: bool,
}

impl Derived {
    pub const FINISHED: Self = Self {
        remaining: TimeRemaining::ZERO,
        finished: true,
    };
}

/// Derive the countdown from resident settings and the current instant.
pub fn derive(settings: &CountdownSettings, now: OffsetDateTime) -> Derived {
    if !settings.is_active {
        return Derived::FINISHED;
    }

    let difference = settings.target_date - now;
    if !difference.is_positive() {
        return Derived::FINISHED;
    }

    // Positive, so whole_seconds truncation is a floor.
    let total = u64::try_from(difference.whole_seconds()).unwrap_or(0);
    Derived {
        remaining: TimeRemaining::from_seconds(total),
        finished: false,
    }
}
