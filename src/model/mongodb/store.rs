use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use mongodb::{
    bson::{doc, Bson, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Database,
};
use rocket::futures::TryStreamExt;

use super::{
    bson_datetime, ensure_election_id_counter_exists, ensure_indexes_exist, is_duplicate_key_error,
    u32_id_filter, Coll, Counter, CurrentElection, Id, ELECTION_ID_COUNTER_ID,
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
    store::{AdminStore, BallotLedger, CandidateStore, ElectionStore, Uniqueness, VoterRegistry},
};

/// Storage backed by a MongoDB database.
#[derive(Clone)]
pub struct MongoStore {
    admins: Coll<Admin>,
    voters: Coll<Voter>,
    candidates: Coll<Candidate>,
    elections: Coll<Election>,
    ballots: Coll<Ballot>,
    counters: Coll<Counter>,
    current: Coll<CurrentElection>,
}

impl MongoStore {
    /// Wrap the database, creating indexes and counters as needed.
    pub async fn init(db: &Database) -> Result<Self> {
        ensure_indexes_exist(db).await?;
        let store = Self {
            admins: Coll::from_db(db),
            voters: Coll::from_db(db),
            candidates: Coll::from_db(db),
            elections: Coll::from_db(db),
            ballots: Coll::from_db(db),
            counters: Coll::from_db(db),
            current: Coll::from_db(db),
        };
        ensure_election_id_counter_exists(&store.counters).await?;
        Ok(store)
    }
}

fn return_after() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

/// Turn a unique-index violation into [`Uniqueness::Duplicate`].
fn unique<T>(result: std::result::Result<T, mongodb::error::Error>) -> Result<Uniqueness<T>> {
    match result {
        Ok(value) => Ok(Uniqueness::Written(value)),
        Err(err) if is_duplicate_key_error(&err) => Ok(Uniqueness::Duplicate),
        Err(err) => Err(err.into()),
    }
}

#[rocket::async_trait]
impl ElectionStore for MongoStore {
    async fn insert_election(&self, election: NewElection) -> Result<Election> {
        let id = Counter::next(&self.counters, ELECTION_ID_COUNTER_ID).await?;
        let election = election.with_id(id);
        self.elections.insert_one(&election, None).await?;
        CurrentElection::advance(&self.current, id).await?;
        debug!("Inserted election {id}");
        Ok(election)
    }

    async fn election(&self, id: ElectionId) -> Result<Option<Election>> {
        Ok(self.elections.find_one(u32_id_filter(id), None).await?)
    }

    async fn elections(&self) -> Result<Vec<Election>> {
        let options = FindOptions::builder().sort(doc! {"_id": -1}).build();
        let elections = self.elections.find(None, options).await?;
        Ok(elections.try_collect().await?)
    }

    async fn current_election(&self) -> Result<Option<Election>> {
        match CurrentElection::get(&self.current).await? {
            Some(id) => self.election(id).await,
            None => Ok(None),
        }
    }

    async fn set_started(&self, id: ElectionId, started: bool) -> Result<bool> {
        let filter = doc! {
            "_id": id,
            "started": !started,
        };
        let update = doc! {
            "$set": { "started": started }
        };
        let result = self.elections.update_one(filter, update, None).await?;
        Ok(result.modified_count == 1)
    }

    async fn end_election(&self, id: ElectionId, at: DateTime<Utc>) -> Result<Option<Election>> {
        let update = doc! {
            "$set": {
                "started": false,
                "end_time": bson_datetime(at),
            }
        };
        Ok(self
            .elections
            .find_one_and_update(u32_id_filter(id), update, return_after())
            .await?)
    }
}

#[rocket::async_trait]
impl CandidateStore for MongoStore {
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Uniqueness<Candidate>> {
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        let result = self.candidates.insert_one(&candidate, None).await;
        unique(result.map(|_| candidate))
    }

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.candidates.find_one(id.as_doc(), None).await?)
    }

    async fn candidate_by_email(&self, email: &str) -> Result<Option<Candidate>> {
        Ok(self.candidates.find_one(doc! {"email": email}, None).await?)
    }

    async fn candidates(&self) -> Result<Vec<Candidate>> {
        let candidates = self.candidates.find(None, None).await?;
        Ok(candidates.try_collect().await?)
    }

    async fn candidates_by_id(&self, ids: &[Id]) -> Result<Vec<Candidate>> {
        let filter = doc! {
            "_id": { "$in": ids.iter().map(|id| Bson::ObjectId(**id)).collect::<Vec<_>>() }
        };
        let found: Vec<Candidate> = self.candidates.find(filter, None).await?.try_collect().await?;
        // Restore the requested order.
        Ok(ids
            .iter()
            .filter_map(|id| found.iter().find(|c| c.id == *id))
            .cloned()
            .collect())
    }

    async fn update_candidate(&self, id: Id, patch: CandidatePatch) -> Result<Option<Candidate>> {
        let mut set = Document::new();
        if let Some(name) = patch.name {
            set.insert("name", name);
        }
        if let Some(position) = patch.position {
            set.insert("position", position);
        }
        if let Some(offering) = patch.offering {
            set.insert("offering", offering);
        }
        if let Some(image_url) = patch.image_url {
            set.insert("image_url", image_url);
        }
        if let Some(password_hash) = patch.password_hash {
            set.insert("password_hash", password_hash);
        }
        if set.is_empty() {
            return self.candidate(id).await;
        }
        Ok(self
            .candidates
            .find_one_and_update(id.as_doc(), doc! {"$set": set}, return_after())
            .await?)
    }

    async fn increment_vote_count(&self, id: Id) -> Result<()> {
        let update = doc! {
            "$inc": { "vote_count": 1_i64 }
        };
        self.candidates.update_one(id.as_doc(), update, None).await?;
        Ok(())
    }

    async fn set_vote_count(&self, id: Id, count: u64) -> Result<()> {
        let update = doc! {
            "$set": { "vote_count": count as i64 }
        };
        self.candidates.update_one(id.as_doc(), update, None).await?;
        Ok(())
    }

    async fn count_candidates(&self) -> Result<u64> {
        Ok(self.candidates.count_documents(None, None).await?)
    }
}

#[rocket::async_trait]
impl VoterRegistry for MongoStore {
    async fn issue_code(
        &self,
        email: &str,
        name: &str,
        code: Code,
        expires_at: DateTime<Utc>,
    ) -> Result<Voter> {
        let update = doc! {
            "$set": {
                "otp": code.to_string(),
                "otp_expires_at": bson_datetime(expires_at),
            },
            "$setOnInsert": { "name": name },
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        // Two concurrent upserts for a new email can race on the unique index;
        // the loser retries once and then finds the winner's document.
        let mut retried = false;
        loop {
            let result = self
                .voters
                .find_one_and_update(doc! {"email": email}, update.clone(), options.clone())
                .await;
            match result {
                Ok(Some(voter)) => return Ok(voter),
                Ok(None) => return Err(crate::error::Error::internal("Upsert returned no voter")),
                Err(err) if is_duplicate_key_error(&err) && !retried => {
                    warn!("Concurrent first contact for {email}, retrying");
                    retried = true;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn consume_code(
        &self,
        email: &str,
        code: Code,
        now: DateTime<Utc>,
    ) -> Result<Option<Voter>> {
        let filter = doc! {
            "email": email,
            "otp": code.to_string(),
            "otp_expires_at": { "$gte": bson_datetime(now) },
        };
        let update = doc! {
            "$set": {
                "otp": Bson::Null,
                "otp_expires_at": Bson::Null,
            }
        };
        Ok(self
            .voters
            .find_one_and_update(filter, update, return_after())
            .await?)
    }

    async fn voter(&self, id: Id) -> Result<Option<Voter>> {
        Ok(self.voters.find_one(id.as_doc(), None).await?)
    }

    async fn count_voters(&self) -> Result<u64> {
        Ok(self.voters.count_documents(None, None).await?)
    }
}

#[rocket::async_trait]
impl AdminStore for MongoStore {
    async fn insert_admin(&self, admin: NewAdmin) -> Result<Uniqueness<Admin>> {
        let admin = Admin { id: Id::new(), admin };
        let result = self.admins.insert_one(&admin, None).await;
        unique(result.map(|_| admin))
    }

    async fn admin(&self, id: Id) -> Result<Option<Admin>> {
        Ok(self.admins.find_one(id.as_doc(), None).await?)
    }

    async fn admin_by_username(&self, username: &str) -> Result<Option<Admin>> {
        Ok(self
            .admins
            .find_one(doc! {"username": username}, None)
            .await?)
    }

    async fn admins(&self) -> Result<Vec<Admin>> {
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let admins = self.admins.find(None, options).await?;
        Ok(admins.try_collect().await?)
    }

    async fn update_admin(
        &self,
        id: Id,
        username: Option<String>,
        password_hash: Option<String>,
    ) -> Result<Option<Uniqueness<Admin>>> {
        let mut set = Document::new();
        if let Some(username) = username {
            set.insert("username", username);
        }
        if let Some(password_hash) = password_hash {
            set.insert("password_hash", password_hash);
        }
        if set.is_empty() {
            return Ok(self.admin(id).await?.map(Uniqueness::Written));
        }
        let result = self
            .admins
            .find_one_and_update(id.as_doc(), doc! {"$set": set}, return_after())
            .await;
        match result {
            Ok(admin) => Ok(admin.map(Uniqueness::Written)),
            Err(err) if is_duplicate_key_error(&err) => {
                Ok(self.admin(id).await?.map(|_| Uniqueness::Duplicate))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[rocket::async_trait]
impl BallotLedger for MongoStore {
    async fn insert_ballot(&self, ballot: NewBallot) -> Result<Uniqueness<Ballot>> {
        let ballot = Ballot::new(ballot);
        let result = self.ballots.insert_one(&ballot, None).await;
        unique(result.map(|_| ballot))
    }

    async fn has_voted(&self, election: ElectionId, voter: Id) -> Result<bool> {
        let filter = doc! {
            "election_id": election,
            "voter_id": *voter,
        };
        Ok(self.ballots.count_documents(filter, None).await? > 0)
    }

    async fn ballot_counts(&self, election: ElectionId) -> Result<HashMap<Id, u64>> {
        let pipeline = vec![
            doc! { "$match": { "election_id": election } },
            doc! { "$group": { "_id": "$candidate_id", "count": { "$sum": 1 } } },
        ];
        let mut groups = self.ballots.aggregate(pipeline, None).await?;
        let mut counts = HashMap::new();
        while let Some(group) = groups.try_next().await? {
            let Ok(candidate) = group.get_object_id("_id") else {
                warn!("Skipping ballot group without a candidate: {group}");
                continue;
            };
            let count = match group.get("count") {
                Some(Bson::Int32(n)) => *n as u64,
                Some(Bson::Int64(n)) => *n as u64,
                _ => 0,
            };
            counts.insert(Id::from(candidate), count);
        }
        Ok(counts)
    }
}
