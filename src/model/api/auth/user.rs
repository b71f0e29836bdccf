use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::Result;
use crate::model::{
    db::{admin::Admin, candidate::Candidate, voter::Voter},
    mongodb::Id,
    store::{AdminStore, CandidateStore, Db, VoterRegistry},
};

/// A user of our application, having defined rights.
#[rocket::async_trait]
pub trait User {
    /// The rights of this user type.
    const RIGHTS: Rights;

    /// Get the user's ID.
    fn id(&self) -> Id;

    /// Does a user of this type with the given ID still exist?
    async fn exists(db: &Db, id: Id) -> Result<bool>;
}

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
    Candidate = 2,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
                Self::Candidate => "candidate",
            }
        )
    }
}

#[rocket::async_trait]
impl User for Voter {
    const RIGHTS: Rights = Rights::Voter;

    fn id(&self) -> Id {
        self.id
    }

    async fn exists(db: &Db, id: Id) -> Result<bool> {
        Ok(db.voter(id).await?.is_some())
    }
}

#[rocket::async_trait]
impl User for Admin {
    const RIGHTS: Rights = Rights::Admin;

    fn id(&self) -> Id {
        self.id
    }

    async fn exists(db: &Db, id: Id) -> Result<bool> {
        Ok(db.admin(id).await?.is_some())
    }
}

#[rocket::async_trait]
impl User for Candidate {
    const RIGHTS: Rights = Rights::Candidate;

    fn id(&self) -> Id {
        self.id
    }

    async fn exists(db: &Db, id: Id) -> Result<bool> {
        Ok(db.candidate(id).await?.is_some())
    }
}
