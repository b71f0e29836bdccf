use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::election::ElectionId, mongodb::Id};

/// Core ballot data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCore {
    /// Foreign Key election ID.
    pub election_id: ElectionId,
    /// Foreign Key candidate ID.
    pub candidate_id: Id,
    /// Foreign Key voter ID.
    pub voter_id: Id,
    /// When the ballot was recorded.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

/// A ballot that has not been recorded yet.
pub type NewBallot = BallotCore;

/// A recorded ballot. Ballots are never modified after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub ballot: BallotCore,
}

impl Ballot {
    /// Give a new ballot its identity.
    pub fn new(ballot: NewBallot) -> Self {
        Self {
            id: Id::new(),
            ballot,
        }
    }
}

impl Deref for Ballot {
    type Target = BallotCore;

    fn deref(&self) -> &Self::Target {
        &self.ballot
    }
}
