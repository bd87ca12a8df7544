//! Renewal scheduling.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Lead time before expiry at which a session is extended.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(30);

/// Computes when to extend a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalSchedule {
    margin: Duration,
}

impl Default for RenewalSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_SAFETY_MARGIN)
    }
}

impl RenewalSchedule {
    #[must_use]
    pub const fn new(margin: Duration) -> Self {
        Self { margin }
    }

    #[must_use]
    pub const fn margin(&self) -> Duration {
        self.margin
    }

    /// Time at which a session expiring at `expires_at` should be renewed.
    #[must_use]
    pub fn fire_at(&self, expires_at: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.margin)
            .ok()
            .and_then(|margin| expires_at.checked_sub_signed(margin))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Time left until `fire_at`, clamped to zero when already due.
    #[must_use]
    pub fn delay_until(&self, fire_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        (fire_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}
