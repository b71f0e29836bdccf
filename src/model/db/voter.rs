use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::code::Code,
    mongodb::{optional_datetime, Id},
};

/// Core voter user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// Unique email address the one-time codes are sent to.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Outstanding one-time code, cleared once used.
    #[serde(default)]
    pub otp: Option<Code>,
    /// Expiry of the outstanding code.
    #[serde(default, with = "optional_datetime")]
    pub otp_expires_at: Option<DateTime<Utc>>,
}

impl VoterCore {
    /// Does `code` match the outstanding code, and is it still valid at `now`?
    pub fn accepts(&self, code: &Code, now: DateTime<Utc>) -> bool {
        match (self.otp, self.otp_expires_at) {
            (Some(otp), Some(expires_at)) => otp == *code && now <= expires_at,
            _ => false,
        }
    }
}

/// A voter user from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
