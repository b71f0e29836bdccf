use rocket::FromForm;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, VoteError};
use crate::model::{
    api::id::ApiId,
    common::{election::ElectionId, status::ElectionStatus, tally::Tally},
    mongodb::Id,
};

/// A vote as submitted by a voter. Every field is optional at this level so
/// that a missing field is reported as such rather than as a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastRequest {
    pub election_id: Option<ElectionId>,
    pub candidate_id: Option<String>,
    pub voter_id: Option<String>,
}

/// A vote with every field present and well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteIntent {
    pub election_id: ElectionId,
    pub candidate_id: Id,
    pub voter_id: Id,
}

impl CastRequest {
    pub fn new(election_id: ElectionId, candidate_id: Id, voter_id: Id) -> Self {
        Self {
            election_id: Some(election_id),
            candidate_id: Some(candidate_id.to_string()),
            voter_id: Some(voter_id.to_string()),
        }
    }

    /// Check all fields are present, then that the identifiers parse.
    pub fn validate(&self) -> Result<VoteIntent> {
        let (Some(election_id), Some(candidate_id), Some(voter_id)) = (
            self.election_id,
            present(&self.candidate_id),
            present(&self.voter_id),
        ) else {
            return Err(VoteError::MissingFields.into());
        };
        Ok(VoteIntent {
            election_id,
            candidate_id: ApiId::parse("candidateId", candidate_id)?.into(),
            voter_id: ApiId::parse("voterId", voter_id)?.into(),
        })
    }
}

/// A non-empty string field.
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// The `?electionId=` query of the tally endpoints.
#[derive(Debug, FromForm)]
pub struct ElectionQuery {
    #[field(name = "electionId")]
    pub election_id: Option<String>,
}

impl ElectionQuery {
    pub fn election_id(&self) -> Result<ElectionId> {
        let raw = self
            .election_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::validation("electionId required"))?;
        raw.parse()
            .map_err(|_| Error::validation("Invalid electionId format"))
    }
}

/// Plain confirmation body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Ballot count for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateVotes {
    pub candidate_id: ApiId,
    pub count: u64,
}

impl CandidateVotes {
    pub fn from_tally(tally: &Tally) -> Vec<Self> {
        tally
            .counts()
            .iter()
            .map(|(id, count)| Self {
                candidate_id: (*id).into(),
                count: *count,
            })
            .collect()
    }
}

/// Tally of an election, with winners once it has ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub election_id: ElectionId,
    pub status: ElectionStatus,
    pub counts: Vec<CandidateVotes>,
    pub winners: Option<Vec<ApiId>>,
}

impl ElectionResults {
    pub fn new(election_id: ElectionId, status: ElectionStatus, tally: &Tally) -> Self {
        let winners = (status == ElectionStatus::Ended)
            .then(|| tally.winners().into_iter().map(Into::into).collect());
        Self {
            election_id,
            status,
            counts: CandidateVotes::from_tally(tally),
            winners,
        }
    }
}
