//! Recording freshness: time frames and what to do with stale recordings

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Mode;
use crate::{Result, VcrError};

/// Extent of time a recording stays fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeFrame {
    /// Fixed duration
    Duration {
        /// Days
        #[serde(default)]
        days: u32,
        /// Hours
        #[serde(default)]
        hours: u32,
        /// Minutes
        #[serde(default)]
        minutes: u32,
        /// Seconds
        #[serde(default)]
        seconds: u32,
    },
    /// Sentinel: `forever` (never lapses) or `never` (always lapsed)
    Common(CommonTimeFrame),
}

/// Sentinel time frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommonTimeFrame {
    /// Recordings never expire
    Forever,
    /// Recordings are always expired
    Never,
}

impl Default for TimeFrame {
    fn default() -> Self {
        Self::FOREVER
    }
}

impl TimeFrame {
    /// Recordings never expire
    pub const FOREVER: Self = Self::Common(CommonTimeFrame::Forever);

    /// Recordings are always expired
    pub const NEVER: Self = Self::Common(CommonTimeFrame::Never);

    /// Fixed duration
    #[must_use]
    pub const fn new(days: u32, hours: u32, minutes: u32, seconds: u32) -> Self {
        Self::Duration {
            days,
            hours,
            minutes,
            seconds,
        }
    }

    /// 30 days
    #[must_use]
    pub const fn months1() -> Self {
        Self::new(30, 0, 0, 0)
    }

    /// 61 days
    #[must_use]
    pub const fn months2() -> Self {
        Self::new(61, 0, 0, 0)
    }

    /// 91 days
    #[must_use]
    pub const fn months3() -> Self {
        Self::new(91, 0, 0, 0)
    }

    /// 182 days
    #[must_use]
    pub const fn months6() -> Self {
        Self::new(182, 0, 0, 0)
    }

    /// 365 days
    #[must_use]
    pub const fn months12() -> Self {
        Self::new(365, 0, 0, 0)
    }

    /// Whether a recording made at `recorded_at` (epoch seconds) is stale now
    #[must_use]
    pub fn has_lapsed(&self, recorded_at: i64) -> bool {
        self.has_lapsed_at(recorded_at, Utc::now())
    }

    /// Whether a recording made at `recorded_at` is stale at `now`
    ///
    /// Stale means `recorded_at + frame` is strictly before `now`.
    #[must_use]
    pub fn has_lapsed_at(&self, recorded_at: i64, now: DateTime<Utc>) -> bool {
        match self {
            Self::Common(CommonTimeFrame::Forever) => false,
            Self::Common(CommonTimeFrame::Never) => true,
            Self::Duration {
                days,
                hours,
                minutes,
                seconds,
            } => {
                let span = Duration::days(i64::from(*days))
                    + Duration::hours(i64::from(*hours))
                    + Duration::minutes(i64::from(*minutes))
                    + Duration::seconds(i64::from(*seconds));
                let Some(recorded) = DateTime::from_timestamp(recorded_at, 0) else {
                    // out of chrono's range: far past is stale, far future is not
                    return recorded_at < 0;
                };
                match recorded.checked_add_signed(span) {
                    Some(expires) => expires < now,
                    None => false,
                }
            }
        }
    }
}

/// What to do when a matched recording has lapsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationAction {
    /// Log a warning and serve the stale recording
    #[default]
    Warn,
    /// Fail the request with [`VcrError::ExpiredRecording`]
    ThrowException,
    /// Make the real request and overwrite the stale recording
    ///
    /// Not allowed together with [`Mode::Replay`].
    RecordAgain,
}

/// Reject action/mode combinations that can never be honored
///
/// # Errors
///
/// Returns [`VcrError::Configuration`] for `RecordAgain` in replay mode
pub fn check_compatible(action: ExpirationAction, mode: Mode) -> Result<()> {
    if action == ExpirationAction::RecordAgain && mode == Mode::Replay {
        return Err(VcrError::Configuration(
            "Cannot use the RecordAgain expiration action in combination with Replay mode"
                .to_string(),
        ));
    }
    Ok(())
}
