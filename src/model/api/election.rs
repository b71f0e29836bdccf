use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{candidate::CandidateDescription, id::ApiId},
    common::{
        election::{ElectionId, ElectionWindow},
        status::ElectionStatus,
    },
    db::{candidate::Candidate, election::Election},
    mongodb::Id,
};

/// An election as scheduled by an admin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSpec {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub candidate_ids: Option<Vec<String>>,
}

impl ElectionSpec {
    pub fn window(&self) -> Result<ElectionWindow> {
        ElectionWindow::new(self.start_time, self.end_time)
            .map_err(|err| Error::validation(err.to_string()))
    }

    /// Parse the candidate IDs, in submission order.
    pub fn candidate_ids(&self) -> Result<Vec<Id>> {
        self.candidate_ids
            .iter()
            .flatten()
            .map(|id| ApiId::parse("candidateId", id).map(Id::from))
            .collect()
    }
}

/// Start and end of an election without candidates. Both are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionTimes {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ElectionTimes {
    pub fn window(&self) -> Result<ElectionWindow> {
        let (Some(start), Some(end)) = (self.start_time, self.end_time) else {
            return Err(Error::validation("Start and end time required"));
        };
        ElectionWindow::new(Some(start), Some(end))
            .map_err(|err| Error::validation(err.to_string()))
    }
}

/// An election with its candidates' profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    pub id: ElectionId,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub started: bool,
    pub created_at: DateTime<Utc>,
    pub status: ElectionStatus,
    pub candidates: Vec<CandidateDescription>,
}

impl ElectionDescription {
    /// Describe `election` at `now`. `candidates` should be the election's
    /// candidates, in election order.
    pub fn new(election: Election, candidates: Vec<Candidate>, now: DateTime<Utc>) -> Self {
        Self {
            id: election.id,
            start_time: election.window.start_time,
            end_time: election.window.end_time,
            started: election.started,
            created_at: election.created_at,
            status: election.status(now),
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }
}

/// An election with candidate IDs only, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSummary {
    pub id: ElectionId,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub started: bool,
    pub created_at: DateTime<Utc>,
    pub status: ElectionStatus,
    pub candidate_ids: Vec<ApiId>,
}

impl ElectionSummary {
    pub fn new(election: Election, now: DateTime<Utc>) -> Self {
        let status = election.status(now);
        let Election { id, election } = election;
        Self {
            id,
            start_time: election.window.start_time,
            end_time: election.window.end_time,
            started: election.started,
            created_at: election.created_at,
            status,
            candidate_ids: election.candidates.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn spec_window_is_validated() {
        let now = Utc::now();
        let backwards = ElectionSpec {
            start_time: Some(now),
            end_time: Some(now - Duration::hours(1)),
            candidate_ids: None,
        };
        assert!(backwards.window().is_err());

        let open = ElectionSpec::default();
        assert_eq!(open.window().unwrap(), ElectionWindow::default());
        assert!(open.candidate_ids().unwrap().is_empty());
    }

    #[test]
    fn malformed_candidate_id() {
        let spec = ElectionSpec {
            candidate_ids: Some(vec![Id::new().to_string(), "nope".to_string()]),
            ..Default::default()
        };
        assert!(spec.candidate_ids().is_err());
    }

    #[test]
    fn times_are_required() {
        let now = Utc::now();
        let missing_end = ElectionTimes {
            start_time: Some(now),
            end_time: None,
        };
        assert!(missing_end.window().is_err());

        let complete = ElectionTimes {
            start_time: Some(now),
            end_time: Some(now + Duration::hours(1)),
        };
        assert!(complete.window().unwrap().bounds().is_some());
    }
}
