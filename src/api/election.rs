use chrono::Utc;
use log::info;
use rocket::{serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            election::{ElectionDescription, ElectionSpec, ElectionSummary},
        },
        common::election::ElectionId,
        db::{
            admin::Admin,
            election::{Election, NewElection},
        },
        store::{Db, Store},
    },
};

pub fn routes() -> Vec<Route> {
    routes![create_election, current_election, get_elections, get_election]
}

/// Create a new election, which becomes the current one. Despite the path,
/// existing elections are never modified.
#[post("/election/create-or-update", data = "<spec>", format = "json")]
pub async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    db: Db,
) -> Result<Json<ElectionDescription>> {
    let window = spec.window()?;
    let election = NewElection::new(window, spec.candidate_ids()?);

    // Every candidate must exist before the election can reference them.
    let candidates = db.candidates_by_id(&election.candidates).await?;
    if let Some(missing) = election
        .candidates
        .iter()
        .find(|id| !candidates.iter().any(|candidate| candidate.id == **id))
    {
        return Err(Error::not_found(format!("Candidate {missing}")));
    }

    let election = db.insert_election(election).await?;
    info!(
        "Election {} created with {} candidates",
        election.id,
        candidates.len()
    );
    Ok(Json(ElectionDescription::new(election, candidates, Utc::now())))
}

#[get("/election/current")]
pub async fn current_election(db: Db) -> Result<Json<ElectionDescription>> {
    let election = db
        .current_election()
        .await?
        .ok_or_else(|| Error::not_found("Election"))?;
    describe(&*db, election).await
}

/// All elections, newest first.
#[get("/election/all")]
pub async fn get_elections(db: Db) -> Result<Json<Vec<ElectionSummary>>> {
    let now = Utc::now();
    let elections = db
        .elections()
        .await?
        .into_iter()
        .map(|election| ElectionSummary::new(election, now))
        .collect();
    Ok(Json(elections))
}

#[get("/election/<election_id>")]
pub async fn get_election(election_id: ElectionId, db: Db) -> Result<Json<ElectionDescription>> {
    let election = db
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    describe(&*db, election).await
}

async fn describe(store: &dyn Store, election: Election) -> Result<Json<ElectionDescription>> {
    let candidates = store.candidates_by_id(&election.candidates).await?;
    Ok(Json(ElectionDescription::new(election, candidates, Utc::now())))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json,
    };

    use crate::model::{
        api::candidate::CandidateSpec,
        common::status::ElectionStatus,
        db::candidate::NewCandidate,
        mongodb::Id,
    };

    use super::*;

    async fn insert_candidate(db: &Db, name: &str) -> Id {
        let candidate = NewCandidate::try_from(CandidateSpec::example(name)).unwrap();
        db.insert_candidate(candidate)
            .await
            .unwrap()
            .written()
            .unwrap()
            .id
    }

    async fn post_spec<'c>(client: &'c Client, spec: &ElectionSpec) -> LocalResponse<'c> {
        client
            .post(uri!("/api", create_election))
            .header(ContentType::JSON)
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await
    }

    fn spec_for(candidates: &[Id]) -> ElectionSpec {
        let now = Utc::now();
        ElectionSpec {
            start_time: Some(now - Duration::minutes(1)),
            end_time: Some(now + Duration::hours(1)),
            candidate_ids: Some(candidates.iter().map(ToString::to_string).collect()),
        }
    }

    #[backend_test(admin)]
    async fn create_populates_candidates(client: Client, db: Db) {
        let a = insert_candidate(&db, "Candidate One").await;
        let b = insert_candidate(&db, "Candidate Two").await;

        // Duplicates are dropped, order is kept.
        let response = post_spec(&client, &spec_for(&[b, a, b])).await;
        assert_eq!(Status::Ok, response.status());
        let election: ElectionDescription = response.into_json().await.unwrap();
        let ids: Vec<Id> = election.candidates.iter().map(|c| c.id.into()).collect();
        assert_eq!(ids, vec![b, a]);
        assert_eq!(election.status, ElectionStatus::Running);
        assert!(!election.started);

        let response = client.get(uri!("/api", current_election)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let current: ElectionDescription = response.into_json().await.unwrap();
        assert_eq!(current.id, election.id);
        assert_eq!(current.candidates.len(), 2);
    }

    #[backend_test(admin)]
    async fn create_rejects_bad_specs(client: Client, db: Db) {
        let a = insert_candidate(&db, "Candidate One").await;

        // Unknown candidate.
        let response = post_spec(&client, &spec_for(&[a, Id::new()])).await;
        assert_eq!(Status::NotFound, response.status());

        // Malformed candidate ID.
        let spec = ElectionSpec {
            candidate_ids: Some(vec!["12345".to_string()]),
            ..spec_for(&[])
        };
        let response = post_spec(&client, &spec).await;
        assert_eq!(Status::BadRequest, response.status());

        // End before start.
        let now = Utc::now();
        let spec = ElectionSpec {
            start_time: Some(now),
            end_time: Some(now - Duration::hours(1)),
            candidate_ids: None,
        };
        let response = post_spec(&client, &spec).await;
        assert_eq!(Status::BadRequest, response.status());

        assert!(db.elections().await.unwrap().is_empty());
    }

    #[backend_test]
    async fn create_requires_admin(client: Client) {
        let response = post_spec(&client, &spec_for(&[])).await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn lookups(client: Client, db: Db) {
        let response = client.get(uri!("/api", current_election)).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let response = client.get(uri!("/api", get_election(1u32))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        let first = db
            .insert_election(NewElection::past_example(vec![]))
            .await
            .unwrap();
        let second = db
            .insert_election(NewElection::future_example(vec![]))
            .await
            .unwrap();

        let response = client.get(uri!("/api", get_elections)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let all: Vec<ElectionSummary> = response.into_json().await.unwrap();
        let ids: Vec<_> = all.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(all[1].status, ElectionStatus::Ended);

        let response = client.get(uri!("/api", get_election(first.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let election: ElectionDescription = response.into_json().await.unwrap();
        assert_eq!(election.id, first.id);

        // The current election is the newest, not the one running or the latest start.
        let response = client.get(uri!("/api", current_election)).dispatch().await;
        let current: ElectionDescription = response.into_json().await.unwrap();
        assert_eq!(current.id, second.id);
    }
}
