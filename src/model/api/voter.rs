use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{api::id::ApiId, common::code::Code, db::voter::Voter};

/// A request for a one-time code to be sent to an email address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

impl OtpRequest {
    pub fn validate(&self) -> Result<()> {
        if self.email.is_empty() || !self.email.contains('@') {
            return Err(Error::validation("A valid email is required"));
        }
        Ok(())
    }
}

/// A voter's answer to the one-time code challenge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OtpVerify {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
}

impl OtpVerify {
    /// The submitted code. Anything that cannot be a code is treated the same
    /// as a wrong code.
    pub fn code(&self) -> Result<Code> {
        self.otp
            .parse()
            .map_err(|_| Error::unauthorized("Invalid or expired OTP"))
    }
}

/// A voter as shown to themself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterDescription {
    pub id: ApiId,
    pub email: String,
    pub name: String,
    /// Whether the voter has a ballot in the current election.
    pub has_voted: bool,
}

impl VoterDescription {
    pub fn new(voter: Voter, has_voted: bool) -> Self {
        Self {
            id: voter.id.into(),
            email: voter.voter.email,
            name: voter.voter.name,
            has_voted,
        }
    }
}

/// Response of the voter count endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterCount {
    pub total_voters: u64,
}
