use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use rocket::tokio::sync::RwLock;

use super::{
    AdminStore, BallotLedger, CandidateStore, ElectionStore, Uniqueness, VoterRegistry,
};
use crate::error::Result;
use crate::model::{
    common::{code::Code, election::ElectionId},
    db::{
        admin::{Admin, NewAdmin},
        ballot::{Ballot, NewBallot},
        candidate::{Candidate, CandidatePatch, NewCandidate},
        election::{Election, NewElection},
        voter::{Voter, VoterCore},
    },
    mongodb::Id,
};

/// Everything the store holds, behind a single lock so that multi-record
/// operations are atomic.
#[derive(Debug)]
struct Tables {
    next_election_id: ElectionId,
    elections: BTreeMap<ElectionId, Election>,
    current_election: Option<ElectionId>,
    candidates: Vec<Candidate>,
    voters: Vec<Voter>,
    admins: Vec<Admin>,
    ballots: Vec<Ballot>,
    /// `(election, voter)` pairs that have a ballot.
    voted: HashSet<(ElectionId, Id)>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            next_election_id: 1,
            elections: BTreeMap::new(),
            current_election: None,
            candidates: Vec::new(),
            voters: Vec::new(),
            admins: Vec::new(),
            ballots: Vec::new(),
            voted: HashSet::new(),
        }
    }
}

/// A process-local store. Data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl ElectionStore for MemoryStore {
    async fn insert_election(&self, election: NewElection) -> Result<Election> {
        let mut tables = self.tables.write().await;
        let id = tables.next_election_id;
        tables.next_election_id += 1;
        let election = election.with_id(id);
        tables.elections.insert(id, election.clone());
        tables.current_election = tables.current_election.max(Some(id));
        Ok(election)
    }

    async fn election(&self, id: ElectionId) -> Result<Option<Election>> {
        Ok(self.tables.read().await.elections.get(&id).cloned())
    }

    async fn elections(&self) -> Result<Vec<Election>> {
        let tables = self.tables.read().await;
        Ok(tables.elections.values().rev().cloned().collect())
    }

    async fn current_election(&self) -> Result<Option<Election>> {
        let tables = self.tables.read().await;
        Ok(tables
            .current_election
            .and_then(|id| tables.elections.get(&id))
            .cloned())
    }

    async fn set_started(&self, id: ElectionId, started: bool) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.elections.get_mut(&id) {
            Some(election) if election.started != started => {
                election.started = started;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn end_election(&self, id: ElectionId, at: DateTime<Utc>) -> Result<Option<Election>> {
        let mut tables = self.tables.write().await;
        Ok(tables.elections.get_mut(&id).map(|election| {
            election.started = false;
            election.window.end_time = Some(at);
            election.clone()
        }))
    }
}

#[rocket::async_trait]
impl CandidateStore for MemoryStore {
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Uniqueness<Candidate>> {
        let mut tables = self.tables.write().await;
        if tables.candidates.iter().any(|c| c.email == candidate.email) {
            return Ok(Uniqueness::Duplicate);
        }
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        tables.candidates.push(candidate.clone());
        Ok(Uniqueness::Written(candidate))
    }

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>> {
        let tables = self.tables.read().await;
        Ok(tables.candidates.iter().find(|c| c.id == id).cloned())
    }

    async fn candidate_by_email(&self, email: &str) -> Result<Option<Candidate>> {
        let tables = self.tables.read().await;
        Ok(tables.candidates.iter().find(|c| c.email == email).cloned())
    }

    async fn candidates(&self) -> Result<Vec<Candidate>> {
        Ok(self.tables.read().await.candidates.clone())
    }

    async fn candidates_by_id(&self, ids: &[Id]) -> Result<Vec<Candidate>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.candidates.iter().find(|c| c.id == *id))
            .cloned()
            .collect())
    }

    async fn update_candidate(&self, id: Id, patch: CandidatePatch) -> Result<Option<Candidate>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .candidates
            .iter_mut()
            .find(|c| c.id == id)
            .map(|candidate| {
                patch.apply(&mut candidate.candidate);
                candidate.clone()
            }))
    }

    async fn increment_vote_count(&self, id: Id) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(candidate) = tables.candidates.iter_mut().find(|c| c.id == id) {
            candidate.vote_count += 1;
        }
        Ok(())
    }

    async fn set_vote_count(&self, id: Id, count: u64) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(candidate) = tables.candidates.iter_mut().find(|c| c.id == id) {
            candidate.vote_count = count;
        }
        Ok(())
    }

    async fn count_candidates(&self) -> Result<u64> {
        Ok(self.tables.read().await.candidates.len() as u64)
    }
}

#[rocket::async_trait]
impl VoterRegistry for MemoryStore {
    async fn issue_code(
        &self,
        email: &str,
        name: &str,
        code: Code,
        expires_at: DateTime<Utc>,
    ) -> Result<Voter> {
        let mut tables = self.tables.write().await;
        if let Some(voter) = tables.voters.iter_mut().find(|v| v.email == email) {
            voter.otp = Some(code);
            voter.otp_expires_at = Some(expires_at);
            return Ok(voter.clone());
        }
        let voter = Voter {
            id: Id::new(),
            voter: VoterCore {
                email: email.to_string(),
                name: name.to_string(),
                otp: Some(code),
                otp_expires_at: Some(expires_at),
            },
        };
        tables.voters.push(voter.clone());
        Ok(voter)
    }

    async fn consume_code(
        &self,
        email: &str,
        code: Code,
        now: DateTime<Utc>,
    ) -> Result<Option<Voter>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .voters
            .iter_mut()
            .find(|v| v.email == email && v.accepts(&code, now))
            .map(|voter| {
                voter.otp = None;
                voter.otp_expires_at = None;
                voter.clone()
            }))
    }

    async fn voter(&self, id: Id) -> Result<Option<Voter>> {
        let tables = self.tables.read().await;
        Ok(tables.voters.iter().find(|v| v.id == id).cloned())
    }

    async fn count_voters(&self) -> Result<u64> {
        Ok(self.tables.read().await.voters.len() as u64)
    }
}

#[rocket::async_trait]
impl AdminStore for MemoryStore {
    async fn insert_admin(&self, admin: NewAdmin) -> Result<Uniqueness<Admin>> {
        let mut tables = self.tables.write().await;
        if tables.admins.iter().any(|a| a.username == admin.username) {
            return Ok(Uniqueness::Duplicate);
        }
        let admin = Admin {
            id: Id::new(),
            admin,
        };
        tables.admins.push(admin.clone());
        Ok(Uniqueness::Written(admin))
    }

    async fn admin(&self, id: Id) -> Result<Option<Admin>> {
        let tables = self.tables.read().await;
        Ok(tables.admins.iter().find(|a| a.id == id).cloned())
    }

    async fn admin_by_username(&self, username: &str) -> Result<Option<Admin>> {
        let tables = self.tables.read().await;
        Ok(tables.admins.iter().find(|a| a.username == username).cloned())
    }

    async fn admins(&self) -> Result<Vec<Admin>> {
        Ok(self.tables.read().await.admins.clone())
    }

    async fn update_admin(
        &self,
        id: Id,
        username: Option<String>,
        password_hash: Option<String>,
    ) -> Result<Option<Uniqueness<Admin>>> {
        let mut tables = self.tables.write().await;
        if let Some(username) = &username {
            if tables
                .admins
                .iter()
                .any(|a| a.id != id && a.username == *username)
            {
                return Ok(tables
                    .admins
                    .iter()
                    .any(|a| a.id == id)
                    .then_some(Uniqueness::Duplicate));
            }
        }
        Ok(tables.admins.iter_mut().find(|a| a.id == id).map(|admin| {
            if let Some(username) = username {
                admin.username = username;
            }
            if let Some(password_hash) = password_hash {
                admin.password_hash = password_hash;
            }
            Uniqueness::Written(admin.clone())
        }))
    }
}

#[rocket::async_trait]
impl BallotLedger for MemoryStore {
    async fn insert_ballot(&self, ballot: NewBallot) -> Result<Uniqueness<Ballot>> {
        let mut tables = self.tables.write().await;
        if !tables.voted.insert((ballot.election_id, ballot.voter_id)) {
            return Ok(Uniqueness::Duplicate);
        }
        let ballot = Ballot::new(ballot);
        tables.ballots.push(ballot.clone());
        Ok(Uniqueness::Written(ballot))
    }

    async fn has_voted(&self, election: ElectionId, voter: Id) -> Result<bool> {
        Ok(self.tables.read().await.voted.contains(&(election, voter)))
    }

    async fn ballot_counts(&self, election: ElectionId) -> Result<HashMap<Id, u64>> {
        let tables = self.tables.read().await;
        let mut counts = HashMap::new();
        for ballot in tables.ballots.iter().filter(|b| b.election_id == election) {
            *counts.entry(ballot.candidate_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::common::election::ElectionWindow;

    fn ballot(election_id: ElectionId, candidate_id: Id, voter_id: Id) -> NewBallot {
        NewBallot {
            election_id,
            candidate_id,
            voter_id,
            cast_at: Utc::now(),
        }
    }

    fn new_election() -> NewElection {
        NewElection::new(ElectionWindow::default(), [])
    }

    #[rocket::async_test]
    async fn election_ids_follow_creation_order() {
        let store = MemoryStore::new();
        let first = store.insert_election(new_election()).await.unwrap();
        let second = store.insert_election(new_election()).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        let current = store.current_election().await.unwrap().unwrap();
        assert_eq!(current.id, second.id);

        let all: Vec<_> = store.elections().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(all, vec![2, 1]);
    }

    #[rocket::async_test]
    async fn set_started_only_reports_changes() {
        let store = MemoryStore::new();
        let election = store.insert_election(new_election()).await.unwrap();
        assert!(store.set_started(election.id, true).await.unwrap());
        assert!(!store.set_started(election.id, true).await.unwrap());
        assert!(store.set_started(election.id, false).await.unwrap());
        assert!(!store.set_started(99, true).await.unwrap());
    }

    #[rocket::async_test]
    async fn second_ballot_is_rejected() {
        let store = MemoryStore::new();
        let (candidate, voter) = (Id::new(), Id::new());
        let first = store.insert_ballot(ballot(1, candidate, voter)).await.unwrap();
        assert!(matches!(first, Uniqueness::Written(_)));
        let second = store.insert_ballot(ballot(1, Id::new(), voter)).await.unwrap();
        assert_eq!(second, Uniqueness::Duplicate);

        // Same voter, different election.
        let other = store.insert_ballot(ballot(2, candidate, voter)).await.unwrap();
        assert!(matches!(other, Uniqueness::Written(_)));

        assert!(store.has_voted(1, voter).await.unwrap());
        assert_eq!(store.ballot_counts(1).await.unwrap().get(&candidate), Some(&1));
    }

    #[rocket::async_test]
    async fn codes_are_single_use() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let code = Code::random();
        let issued = store
            .issue_code("voter1@example.com", "Voter One", code, now + Duration::minutes(5))
            .await
            .unwrap();

        let voter = store.consume_code("voter1@example.com", code, now).await.unwrap();
        assert_eq!(voter.map(|v| v.id), Some(issued.id));
        assert!(store.consume_code("voter1@example.com", code, now).await.unwrap().is_none());

        // Reissuing keeps the same account.
        let again = store
            .issue_code("voter1@example.com", "Ignored", Code::random(), now)
            .await
            .unwrap();
        assert_eq!(again.id, issued.id);
        assert_eq!(again.name, "Voter One");
        assert_eq!(store.count_voters().await.unwrap(), 1);
    }

    #[rocket::async_test]
    async fn duplicate_emails_and_usernames() {
        let store = MemoryStore::new();
        let candidate = NewCandidate::example("Candidate One");
        assert!(store.insert_candidate(candidate.clone()).await.unwrap().written().is_some());
        assert_eq!(store.insert_candidate(candidate).await.unwrap(), Uniqueness::Duplicate);

        let admin = |name: &str| NewAdmin {
            username: name.to_string(),
            password_hash: "unset".to_string(),
        };
        let first = store.insert_admin(admin("alice")).await.unwrap().written().unwrap();
        store.insert_admin(admin("bob")).await.unwrap();
        assert!(store.insert_admin(admin("alice")).await.unwrap().written().is_none());

        let renamed = store
            .update_admin(first.id, Some("bob".to_string()), None)
            .await
            .unwrap();
        assert!(matches!(renamed, Some(Uniqueness::Duplicate)));
        assert!(store.update_admin(Id::new(), None, None).await.unwrap().is_none());
    }
}
