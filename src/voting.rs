//! Vote casting, tallying and counter reconciliation.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::error::{Result, VoteError};
use crate::model::{
    api::vote::VoteIntent,
    common::{status::ElectionStatus, tally::Tally},
    db::{
        ballot::{Ballot, NewBallot},
        election::Election,
    },
    store::{Store, Uniqueness},
};

/// Record a single vote.
///
/// Checks run in a fixed order and the first failure wins: an existing ballot
/// for this voter, then the election's existence, then candidate eligibility,
/// then whether voting is open at `now`. The ballot insert itself is atomic, so
/// a concurrent duplicate that slips past the first check is still reported as
/// [`VoteError::AlreadyVoted`].
///
/// The candidate's cached counter is bumped after the ballot is durable. A
/// failure there is logged and the vote stands.
pub async fn cast_vote(store: &dyn Store, vote: VoteIntent, now: DateTime<Utc>) -> Result<Ballot> {
    let VoteIntent {
        election_id,
        candidate_id,
        voter_id,
    } = vote;

    if store.has_voted(election_id, voter_id).await? {
        debug!("Voter {voter_id} already voted in election {election_id}");
        return Err(VoteError::AlreadyVoted.into());
    }

    let election = store
        .election(election_id)
        .await?
        .ok_or(VoteError::ElectionNotFound)?;

    if !election.has_candidate(candidate_id) {
        debug!("Candidate {candidate_id} is not standing in election {election_id}");
        return Err(VoteError::CandidateNotInElection.into());
    }

    if election.status(now) != ElectionStatus::Running {
        return Err(VoteError::ElectionNotRunning.into());
    }

    let ballot = NewBallot {
        election_id,
        candidate_id,
        voter_id,
        cast_at: now,
    };
    let ballot = match store.insert_ballot(ballot).await? {
        Uniqueness::Written(ballot) => ballot,
        Uniqueness::Duplicate => {
            warn!("Concurrent duplicate vote by {voter_id} in election {election_id}");
            return Err(VoteError::AlreadyVoted.into());
        }
    };

    if let Err(err) = store.increment_vote_count(candidate_id).await {
        warn!("Ballot {} recorded but counter for {candidate_id} not updated: {err}", ballot.id);
    }

    info!("Vote recorded in election {election_id}");
    Ok(ballot)
}

/// Count the ballots for each of the election's candidates.
pub async fn tally(store: &dyn Store, election: &Election) -> Result<Tally> {
    let counts = store.ballot_counts(election.id).await?;
    Ok(Tally::new(&election.candidates, &counts))
}

/// Overwrite each candidate's cached counter with their ballot count in `election`.
pub async fn reconcile(store: &dyn Store, election: &Election) -> Result<Tally> {
    let tally = tally(store, election).await?;
    for (candidate, count) in tally.counts() {
        store.set_vote_count(*candidate, *count).await?;
    }
    info!(
        "Reconciled {} candidate counters for election {}",
        tally.counts().len(),
        election.id
    );
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::error::Error;
    use crate::model::{
        common::election::ElectionWindow,
        db::{candidate::NewCandidate, election::NewElection},
        mongodb::Id,
        store::{BallotLedger, CandidateStore, Db, ElectionStore, MemoryStore},
    };

    async fn candidate(store: &dyn Store, name: &str) -> Id {
        store
            .insert_candidate(NewCandidate::example(name))
            .await
            .unwrap()
            .written()
            .unwrap()
            .id
    }

    fn vote(election: &Election, candidate: Id, voter: Id) -> VoteIntent {
        VoteIntent {
            election_id: election.id,
            candidate_id: candidate,
            voter_id: voter,
        }
    }

    fn vote_error(result: Result<Ballot>) -> VoteError {
        match result {
            Err(Error::Vote(err)) => err,
            other => panic!("expected a vote error, got {other:?}"),
        }
    }

    #[rocket::async_test]
    async fn one_hour_election() {
        let store = MemoryStore::new();
        let t = Utc::now();
        let (a, b) = (candidate(&store, "Alice").await, candidate(&store, "Bob").await);
        let window = ElectionWindow::new(Some(t), Some(t + Duration::seconds(3600))).unwrap();
        let election = store
            .insert_election(NewElection::new(window, [a, b]))
            .await
            .unwrap();
        let (v1, v2) = (Id::new(), Id::new());

        assert_eq!(election.status(t - Duration::seconds(10)), ElectionStatus::NotStarted);
        let during = t + Duration::seconds(10);
        assert_eq!(election.status(during), ElectionStatus::Running);

        cast_vote(&store, vote(&election, a, v1), during).await.unwrap();
        let again = cast_vote(&store, vote(&election, a, v1), during).await;
        assert_eq!(vote_error(again), VoteError::AlreadyVoted);
        cast_vote(&store, vote(&election, a, v2), during).await.unwrap();

        let counts = tally(&store, &election).await.unwrap();
        assert_eq!(counts.counts(), &[(a, 2), (b, 0)]);

        let after = t + Duration::seconds(3601);
        assert_eq!(election.status(after), ElectionStatus::Ended);
        assert_eq!(counts.winners(), vec![a]);
    }

    #[rocket::async_test]
    async fn concurrent_duplicates() {
        const ATTEMPTS: usize = 16;

        let db = Db::new(MemoryStore::new());
        let a = candidate(&*db, "Alice").await;
        let election = db
            .insert_election(NewElection::current_example(vec![a]))
            .await
            .unwrap();
        let voter = Id::new();

        let handles: Vec<_> = (0..ATTEMPTS)
            .map(|_| {
                let db = db.clone();
                let intent = vote(&election, a, voter);
                rocket::tokio::spawn(async move { cast_vote(&*db, intent, Utc::now()).await })
            })
            .collect();

        let mut successes = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(Error::Vote(VoteError::AlreadyVoted)) => duplicates += 1,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(duplicates, ATTEMPTS - 1);
        assert_eq!(db.ballot_counts(election.id).await.unwrap().get(&a), Some(&1));
    }

    #[rocket::async_test]
    async fn refusals_in_order() {
        let store = MemoryStore::new();
        let (a, outsider) = (candidate(&store, "Alice").await, candidate(&store, "Olga").await);
        let running = store
            .insert_election(NewElection::current_example(vec![a]))
            .await
            .unwrap();
        let future = store
            .insert_election(NewElection::future_example(vec![a]))
            .await
            .unwrap();
        let now = Utc::now();

        // The candidate exists, but is not standing.
        let result = cast_vote(&store, vote(&running, outsider, Id::new()), now).await;
        assert_eq!(vote_error(result), VoteError::CandidateNotInElection);

        let missing = VoteIntent {
            election_id: 999,
            candidate_id: a,
            voter_id: Id::new(),
        };
        assert_eq!(
            vote_error(cast_vote(&store, missing, now).await),
            VoteError::ElectionNotFound
        );

        let result = cast_vote(&store, vote(&future, a, Id::new()), now).await;
        assert_eq!(vote_error(result), VoteError::ElectionNotRunning);

        // Having voted is reported before anything else.
        let voter = Id::new();
        cast_vote(&store, vote(&running, a, voter), now).await.unwrap();
        let result = cast_vote(&store, vote(&running, outsider, voter), now).await;
        assert_eq!(vote_error(result), VoteError::AlreadyVoted);
    }

    #[rocket::async_test]
    async fn cached_counters_follow_ledger() {
        let store = MemoryStore::new();
        let (a, b) = (candidate(&store, "Alice").await, candidate(&store, "Bob").await);
        let election = store
            .insert_election(NewElection::current_example(vec![a, b]))
            .await
            .unwrap();
        for _ in 0..3 {
            cast_vote(&store, vote(&election, b, Id::new()), Utc::now()).await.unwrap();
        }
        let store_ref = &store;
        let cached = move |id: Id| async move {
            store_ref.candidate(id).await.unwrap().unwrap().vote_count
        };
        assert_eq!(cached(b).await, 3);

        // Drift the cache, then repair it from the ledger.
        store.set_vote_count(a, 42).await.unwrap();
        store.set_vote_count(b, 0).await.unwrap();
        let repaired = reconcile(&store, &election).await.unwrap();
        assert_eq!(repaired.counts(), &[(a, 0), (b, 3)]);
        assert_eq!(cached(a).await, 0);
        assert_eq!(cached(b).await, 3);
    }

    #[rocket::async_test]
    async fn zero_ballots() {
        let store = MemoryStore::new();
        let (a, b) = (candidate(&store, "Alice").await, candidate(&store, "Bob").await);
        let election = store
            .insert_election(NewElection::past_example(vec![a, b]))
            .await
            .unwrap();
        let counts = tally(&store, &election).await.unwrap();
        assert_eq!(counts.counts(), &[(a, 0), (b, 0)]);
        assert!(counts.winners().is_empty());
    }
}
