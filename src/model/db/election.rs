use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        election::{ElectionId, ElectionWindow},
        status::ElectionStatus,
    },
    mongodb::Id,
};

/// Core election data: everything but the ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Voting window.
    #[serde(flatten)]
    pub window: ElectionWindow,
    /// Maintained by the scheduler, independently of the derived status.
    pub started: bool,
    /// Eligible candidates, without duplicates.
    pub candidates: Vec<Id>,
    /// Creation time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ElectionCore {
    /// Create a new, not yet started election. Duplicate candidates are dropped,
    /// keeping the first occurrence.
    pub fn new(window: ElectionWindow, candidates: impl IntoIterator<Item = Id>) -> Self {
        let mut unique = Vec::new();
        for candidate in candidates {
            if !unique.contains(&candidate) {
                unique.push(candidate);
            }
        }
        Self {
            window,
            started: false,
            candidates: unique,
            created_at: Utc::now(),
        }
    }

    /// Attach the allocated ID.
    pub fn with_id(self, id: ElectionId) -> Election {
        Election { id, election: self }
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: ElectionId,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Election {
    pub fn has_candidate(&self, candidate: Id) -> bool {
        self.election.candidates.contains(&candidate)
    }

    pub fn status(&self, now: DateTime<Utc>) -> ElectionStatus {
        ElectionStatus::of(&self.election.window, now)
    }
}

impl std::ops::Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl std::ops::DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
