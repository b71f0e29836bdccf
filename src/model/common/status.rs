//! Derived election status.
//!
//! Everything here is a pure function of an election window and the current
//! time. Nothing is persisted: status is recomputed on every request, which
//! keeps it independent of the scheduler's `started` flag.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::election::ElectionWindow;

/// Presentable state of an election at a given instant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElectionStatus {
    /// No start time yet, or the start time is in the future.
    NotStarted,
    /// Started, and the end time (if any) has not been reached.
    Running,
    /// The end time has been reached.
    Ended,
    /// There is no election to report on.
    Unknown,
}

impl ElectionStatus {
    /// Evaluate the status of `window` at `now`.
    pub fn of(window: &ElectionWindow, now: DateTime<Utc>) -> Self {
        match (window.start_time, window.end_time) {
            (None, _) => Self::NotStarted,
            (Some(start), _) if now < start => Self::NotStarted,
            (Some(_), Some(end)) if now >= end => Self::Ended,
            (Some(_), _) => Self::Running,
        }
    }
}

/// Whole seconds remaining until some instant, never negative.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Countdown {
    seconds: i64,
}

impl Countdown {
    /// Time from `now` until `target`, floored to the second and clamped at zero.
    pub fn until(target: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let millis = (target - now).num_milliseconds();
        Self {
            seconds: millis.max(0) / 1000,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }
}

/// Formats as `HH:MM:SS`; hours grow beyond two digits when needed.
impl Display for Countdown {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let h = self.seconds / 3600;
        let m = (self.seconds % 3600) / 60;
        let s = self.seconds % 60;
        write!(f, "{h:02}:{m:02}:{s:02}")
    }
}

impl Serialize for Countdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Percentage of the window that has elapsed at `now`, floored and clamped to `[0, 100]`.
/// Returns `None` unless both ends of the window are known.
pub fn percent_elapsed(window: &ElectionWindow, now: DateTime<Utc>) -> Option<u8> {
    let (start, end) = window.bounds()?;
    if now >= end {
        return Some(100);
    }
    if now <= start {
        return Some(0);
    }
    let elapsed = (now - start).num_milliseconds();
    let total = (end - start).num_milliseconds();
    let percent = (100 * elapsed).div_euclid(total).clamp(0, 100);
    Some(percent as u8)
}

/// Everything a polling client needs to render the election clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: ElectionStatus,
    /// Present only before the election starts.
    pub start_countdown: Option<Countdown>,
    /// Present only while the election is running with a known end.
    pub time_remaining: Option<Countdown>,
    pub percent_elapsed: Option<u8>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl StatusReport {
    /// Evaluate the report for the given window, or `Unknown` if there is no election.
    pub fn evaluate(window: Option<&ElectionWindow>, now: DateTime<Utc>) -> Self {
        let window = match window {
            Some(window) => window,
            None => return Self::unknown(),
        };

        let status = ElectionStatus::of(window, now);
        let start_countdown = match status {
            ElectionStatus::NotStarted => {
                window.start_time.map(|start| Countdown::until(start, now))
            }
            _ => None,
        };
        let time_remaining = match status {
            ElectionStatus::Running => window.end_time.map(|end| Countdown::until(end, now)),
            _ => None,
        };

        Self {
            status,
            start_countdown,
            time_remaining,
            percent_elapsed: percent_elapsed(window, now),
            start_time: window.start_time,
            end_time: window.end_time,
        }
    }

    fn unknown() -> Self {
        Self {
            status: ElectionStatus::Unknown,
            start_countdown: None,
            time_remaining: None,
            percent_elapsed: None,
            start_time: None,
            end_time: None,
        }
    }
}
