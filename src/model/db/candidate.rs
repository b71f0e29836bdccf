use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::password, mongodb::Id};

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// Unique login email.
    pub email: String,
    pub name: String,
    /// Position contested, e.g. "Mayor".
    pub position: String,
    /// Campaign promises.
    #[serde(default)]
    pub offering: String,
    /// Cached tally. The ballot ledger is authoritative.
    #[serde(default)]
    pub vote_count: u64,
    /// Path or URL of the candidate's picture.
    #[serde(default)]
    pub image_url: Option<String>,
    pub password_hash: String,
}

impl CandidateCore {
    pub fn verify_password(&self, password: &str) -> bool {
        password::verify(&self.password_hash, password)
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Changes to a candidate's profile. Unset fields are left alone.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CandidatePatch {
    pub name: Option<String>,
    pub position: Option<String>,
    pub offering: Option<String>,
    pub image_url: Option<String>,
    pub password_hash: Option<String>,
}

impl CandidatePatch {
    /// Apply the patch in place.
    pub fn apply(self, candidate: &mut CandidateCore) {
        if let Some(name) = self.name {
            candidate.name = name;
        }
        if let Some(position) = self.position {
            candidate.position = position;
        }
        if let Some(offering) = self.offering {
            candidate.offering = offering;
        }
        if let Some(image_url) = self.image_url {
            candidate.image_url = Some(image_url);
        }
        if let Some(password_hash) = self.password_hash {
            candidate.password_hash = password_hash;
        }
    }
}
