use log::debug;
use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{common::election::ElectionId, mongodb::Coll};

/// ID of the counter allocating election IDs.
pub const ELECTION_ID_COUNTER_ID: &str = "election_id";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u32> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| Error::internal(format!("Failed to find counter with ID {id}")))?;
        Ok(counter.next)
    }
}

/// Ensure the election ID counter exists, starting at 1 if it is new.
pub async fn ensure_election_id_counter_exists(counters: &Coll<Counter>) -> Result<()> {
    debug!("Ensuring election ID counter exists");
    let update = doc! {
        "$setOnInsert": { "next": 1 }
    };
    let options = UpdateOptions::builder().upsert(true).build();
    counters
        .update_one(doc! { "_id": ELECTION_ID_COUNTER_ID }, update, options)
        .await?;
    Ok(())
}

/// ID of the singleton current-election pointer document.
pub const CURRENT_ELECTION_ID: &str = "current";

/// Singleton document naming the current election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentElection {
    #[serde(rename = "_id")]
    pub id: String,
    pub election_id: ElectionId,
}

impl CurrentElection {
    /// Point at `election_id`, unless a newer election is already current.
    pub async fn advance(pointers: &Coll<CurrentElection>, election_id: ElectionId) -> Result<()> {
        let update = doc! {
            "$max": { "election_id": election_id }
        };
        let options = UpdateOptions::builder().upsert(true).build();
        pointers
            .update_one(doc! { "_id": CURRENT_ELECTION_ID }, update, options)
            .await?;
        Ok(())
    }

    pub async fn get(pointers: &Coll<CurrentElection>) -> Result<Option<ElectionId>> {
        let pointer = pointers
            .find_one(doc! { "_id": CURRENT_ELECTION_ID }, None)
            .await?;
        Ok(pointer.map(|p| p.election_id))
    }
}
