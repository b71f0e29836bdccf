use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::mongodb::optional_datetime;

/// Our election IDs are integers, allocated in creation order.
pub type ElectionId = u32;

/// The `[start_time, end_time)` interval during which voting is permitted.
/// Either end may be unset while an election is being scheduled.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionWindow {
    /// Election start time.
    #[serde(default, with = "optional_datetime")]
    pub start_time: Option<DateTime<Utc>>,
    /// Election end time.
    #[serde(default, with = "optional_datetime")]
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
#[error("End time {end} must be after start time {start}")]
pub struct WindowError {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ElectionWindow {
    /// Create a window, rejecting one that ends before it starts.
    pub fn new(
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Self, WindowError> {
        if let (Some(start), Some(end)) = (start_time, end_time) {
            if end <= start {
                return Err(WindowError { start, end });
            }
        }
        Ok(Self {
            start_time,
            end_time,
        })
    }

    /// Both ends, if the window is fully specified.
    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.start_time?, self.end_time?))
    }
}
