//! Storage abstraction.
//!
//! Every persistent concern is expressed as a trait, so that request handlers,
//! the vote casting service and the scheduler are agnostic of the backend.
//! Two backends exist: MongoDB for deployments (see [`crate::model::mongodb`])
//! and [`MemoryStore`] for tests and single-process demos.
//!
//! Writes that must be unique (one ballot per voter per election, unique
//! emails and usernames) are enforced by the backend itself, never by a
//! separate read-then-write in the caller.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::error::Result;
use crate::model::{
    common::{code::Code, election::ElectionId},
    db::{
        admin::{Admin, NewAdmin},
        ballot::{Ballot, NewBallot},
        candidate::{Candidate, CandidatePatch, NewCandidate},
        election::{Election, NewElection},
        voter::Voter,
    },
    mongodb::Id,
};

mod memory;
pub use memory::MemoryStore;

/// Outcome of a write guarded by a unique index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Uniqueness<T> {
    /// The write went through.
    Written(T),
    /// A record with the same unique key already exists; nothing was written.
    Duplicate,
}

impl<T> Uniqueness<T> {
    pub fn written(self) -> Option<T> {
        match self {
            Self::Written(value) => Some(value),
            Self::Duplicate => None,
        }
    }
}

/// Election records and the current-election pointer.
#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    /// Allocate the next election ID, persist the election, and make it current.
    async fn insert_election(&self, election: NewElection) -> Result<Election>;

    async fn election(&self, id: ElectionId) -> Result<Option<Election>>;

    /// All elections, most recently created first.
    async fn elections(&self) -> Result<Vec<Election>>;

    /// The election the current-election pointer refers to.
    async fn current_election(&self) -> Result<Option<Election>>;

    /// Atomically set `started` to `started` if it currently holds the opposite value.
    /// Returns whether the flag changed.
    async fn set_started(&self, id: ElectionId, started: bool) -> Result<bool>;

    /// Stop the election early: clear `started` and move the end time to `at`.
    async fn end_election(&self, id: ElectionId, at: DateTime<Utc>) -> Result<Option<Election>>;
}

/// Candidate profiles and their cached vote counters.
#[rocket::async_trait]
pub trait CandidateStore: Send + Sync {
    /// Insert a candidate, unless the email is already taken.
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Uniqueness<Candidate>>;

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>>;

    async fn candidate_by_email(&self, email: &str) -> Result<Option<Candidate>>;

    async fn candidates(&self) -> Result<Vec<Candidate>>;

    /// The candidates with the given IDs, in the same order. Unknown IDs are skipped.
    async fn candidates_by_id(&self, ids: &[Id]) -> Result<Vec<Candidate>>;

    async fn update_candidate(&self, id: Id, patch: CandidatePatch) -> Result<Option<Candidate>>;

    /// Bump the cached counter by one.
    async fn increment_vote_count(&self, id: Id) -> Result<()>;

    /// Overwrite the cached counter.
    async fn set_vote_count(&self, id: Id, count: u64) -> Result<()>;

    async fn count_candidates(&self) -> Result<u64>;
}

/// Voter accounts and their one-time codes.
#[rocket::async_trait]
pub trait VoterRegistry: Send + Sync {
    /// Record a fresh code for `email`, creating the voter on first contact.
    async fn issue_code(
        &self,
        email: &str,
        name: &str,
        code: Code,
        expires_at: DateTime<Utc>,
    ) -> Result<Voter>;

    /// Atomically consume `code` if it is outstanding for `email` and unexpired at `now`.
    async fn consume_code(&self, email: &str, code: Code, now: DateTime<Utc>)
        -> Result<Option<Voter>>;

    async fn voter(&self, id: Id) -> Result<Option<Voter>>;

    async fn count_voters(&self) -> Result<u64>;
}

/// Admin accounts.
#[rocket::async_trait]
pub trait AdminStore: Send + Sync {
    /// Insert an admin, unless the username is already taken.
    async fn insert_admin(&self, admin: NewAdmin) -> Result<Uniqueness<Admin>>;

    async fn admin(&self, id: Id) -> Result<Option<Admin>>;

    async fn admin_by_username(&self, username: &str) -> Result<Option<Admin>>;

    /// All admins, oldest first.
    async fn admins(&self) -> Result<Vec<Admin>>;

    /// Change username and/or password hash. `None` if there is no such admin.
    async fn update_admin(
        &self,
        id: Id,
        username: Option<String>,
        password_hash: Option<String>,
    ) -> Result<Option<Uniqueness<Admin>>>;
}

/// The append-only record of cast votes.
#[rocket::async_trait]
pub trait BallotLedger: Send + Sync {
    /// Record a ballot, unless the voter already has one in that election.
    /// The check and the insert are a single atomic operation.
    async fn insert_ballot(&self, ballot: NewBallot) -> Result<Uniqueness<Ballot>>;

    async fn has_voted(&self, election: ElectionId, voter: Id) -> Result<bool>;

    /// Number of ballots per candidate in the election. Candidates without
    /// ballots are absent.
    async fn ballot_counts(&self, election: ElectionId) -> Result<HashMap<Id, u64>>;
}

/// A complete storage backend.
pub trait Store: ElectionStore + CandidateStore + VoterRegistry + AdminStore + BallotLedger {}

impl<T> Store for T where
    T: ElectionStore + CandidateStore + VoterRegistry + AdminStore + BallotLedger
{
}

/// Shared handle on the storage backend, kept in managed state and
/// available to any endpoint as a request guard.
#[derive(Clone)]
pub struct Db(Arc<dyn Store>);

impl Db {
    pub fn new(store: impl Store + 'static) -> Self {
        Self(Arc::new(store))
    }
}

impl From<Arc<dyn Store>> for Db {
    fn from(store: Arc<dyn Store>) -> Self {
        Self(store)
    }
}

impl Deref for Db {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Db {
    type Error = ();

    /// Get the storage handle from managed state.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.rocket().state::<Db>() {
            Some(db) => Outcome::Success(db.clone()),
            None => Outcome::Failure((Status::InternalServerError, ())),
        }
    }
}
