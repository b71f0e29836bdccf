use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::password::{self, MIN_PASSWORD_LENGTH},
    db::candidate::{Candidate, CandidatePatch, NewCandidate},
};

/// A new candidate profile, as submitted by an admin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub offering: String,
    pub image_url: Option<String>,
}

impl TryFrom<CandidateSpec> for NewCandidate {
    type Error = Error;

    fn try_from(spec: CandidateSpec) -> Result<Self> {
        if spec.name.is_empty() || spec.position.is_empty() || spec.email.is_empty() {
            return Err(Error::validation("Name, position and email are required"));
        }
        if !spec.email.contains('@') {
            return Err(Error::validation(format!("Invalid email: {}", spec.email)));
        }
        if spec.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        Ok(Self {
            email: spec.email,
            name: spec.name,
            position: spec.position,
            offering: spec.offering,
            vote_count: 0,
            image_url: spec.image_url.filter(|url| !url.is_empty()),
            password_hash: password::hash(&spec.password)?,
        })
    }
}

/// Profile changes submitted by an admin or the candidate themself.
/// The vote counter and email cannot be changed this way.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateUpdate {
    pub name: Option<String>,
    pub position: Option<String>,
    pub offering: Option<String>,
    pub image_url: Option<String>,
    pub password: Option<String>,
}

impl TryFrom<CandidateUpdate> for CandidatePatch {
    type Error = Error;

    fn try_from(update: CandidateUpdate) -> Result<Self> {
        let password_hash = match update.password {
            Some(password) if password.chars().count() < MIN_PASSWORD_LENGTH => {
                return Err(Error::validation(format!(
                    "Password must be at least {MIN_PASSWORD_LENGTH} characters"
                )));
            }
            Some(password) => Some(password::hash(&password)?),
            None => None,
        };
        Ok(Self {
            name: update.name.filter(|n| !n.is_empty()),
            position: update.position.filter(|p| !p.is_empty()),
            offering: update.offering,
            image_url: update.image_url,
            password_hash,
        })
    }
}

/// Login credentials for a candidate.
#[derive(Clone, Serialize, Deserialize)]
pub struct CandidateCredentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// A candidate's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    pub id: ApiId,
    pub email: String,
    pub name: String,
    pub position: String,
    pub offering: String,
    /// Cached counter; see the vote results for the authoritative tally.
    pub vote_count: u64,
    pub image_url: Option<String>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        let core = candidate.candidate;
        Self {
            id: candidate.id.into(),
            email: core.email,
            name: core.name,
            position: core.position,
            offering: core.offering,
            vote_count: core.vote_count,
            image_url: core.image_url,
        }
    }
}

/// Response of the candidate count endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCount {
    pub total_candidates: u64,
}
