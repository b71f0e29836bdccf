use chrono::Utc;
use log::info;
use rocket::{serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            vote::{CandidateVotes, CastRequest, ElectionQuery, ElectionResults, Message},
        },
        db::{admin::Admin, election::Election, voter::Voter},
        store::{Db, ElectionStore},
    },
    voting,
};

pub fn routes() -> Vec<Route> {
    routes![cast, counts, results, reconcile]
}

/// Cast the caller's vote.
///
/// The token is only examined once the body is known to be complete, so an
/// incomplete vote is reported as such even when unauthenticated.
#[post("/vote/cast", data = "<request>", format = "json")]
pub async fn cast(
    token: std::result::Result<AuthToken<Voter>, Error>,
    request: Json<CastRequest>,
    db: Db,
) -> Result<Json<Message>> {
    let vote = request.validate()?;
    let token = token?;
    if token.id != vote.voter_id {
        return Err(Error::unauthorized("Cannot vote on behalf of another voter"));
    }

    voting::cast_vote(&*db, vote, Utc::now()).await?;
    Ok(Json(Message::new("Vote cast successfully")))
}

/// Live ballot counts for every candidate in an election.
#[get("/vote/counts?<query..>")]
pub async fn counts(query: ElectionQuery, db: Db) -> Result<Json<Vec<CandidateVotes>>> {
    let election = election_for(&query, &db).await?;
    let tally = voting::tally(&*db, &election).await?;
    Ok(Json(CandidateVotes::from_tally(&tally)))
}

#[get("/vote/results?<query..>")]
pub async fn results(query: ElectionQuery, db: Db) -> Result<Json<ElectionResults>> {
    let election = election_for(&query, &db).await?;
    let tally = voting::tally(&*db, &election).await?;
    let status = election.status(Utc::now());
    Ok(Json(ElectionResults::new(election.id, status, &tally)))
}

/// Rewrite the cached candidate counters from the ballot ledger.
#[post("/vote/reconcile?<query..>")]
pub async fn reconcile(
    _token: AuthToken<Admin>,
    query: ElectionQuery,
    db: Db,
) -> Result<Json<Vec<CandidateVotes>>> {
    let election = election_for(&query, &db).await?;
    let tally = voting::reconcile(&*db, &election).await?;
    info!("Counters reconciled for election {}", election.id);
    Ok(Json(CandidateVotes::from_tally(&tally)))
}

async fn election_for(query: &ElectionQuery, db: &Db) -> Result<Election> {
    let id = query.election_id()?;
    db.election(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {id}")))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{serde_json, Value},
    };

    use crate::{
        config::Config,
        model::{
            api::auth::AUTH_TOKEN_COOKIE,
            common::election::ElectionId,
            db::{ballot::NewBallot, candidate::NewCandidate, election::NewElection},
            mongodb::Id,
            store::{BallotLedger, CandidateStore},
        },
    };

    use super::*;

    async fn insert_candidate(db: &Db, name: &str) -> Id {
        db.insert_candidate(NewCandidate::example(name))
            .await
            .unwrap()
            .written()
            .unwrap()
            .id
    }

    /// The ID of the voter the client is logged in as.
    fn voter_id(client: &Client) -> Id {
        let jar = client.cookies();
        let cookie = jar.get(AUTH_TOKEN_COOKIE).unwrap();
        let config = client.rocket().state::<Config>().unwrap();
        AuthToken::<Voter>::from_cookie(&cookie, config).unwrap().id
    }

    async fn post_vote<'c>(client: &'c Client, body: &CastRequest) -> LocalResponse<'c> {
        client
            .post(uri!("/api", cast))
            .header(ContentType::JSON)
            .body(serde_json::to_string(body).unwrap())
            .dispatch()
            .await
    }

    async fn error_of(response: LocalResponse<'_>) -> String {
        let body: Value = response.into_json().await.unwrap();
        body["error"].as_str().unwrap().to_string()
    }

    async fn get_json(client: &Client, path: &str, id: ElectionId) -> Value {
        let response = client
            .get(format!("/api/vote/{path}?electionId={id}"))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    #[backend_test(voter)]
    async fn cast_and_count(client: Client, db: Db) {
        let voter = voter_id(&client);
        let a = insert_candidate(&db, "Candidate One").await;
        let b = insert_candidate(&db, "Candidate Two").await;
        let election = db
            .insert_election(NewElection::current_example(vec![a, b]))
            .await
            .unwrap();

        let response = post_vote(&client, &CastRequest::new(election.id, a, voter)).await;
        assert_eq!(Status::Ok, response.status());
        let message: Message = response.into_json().await.unwrap();
        assert_eq!(message, Message::new("Vote cast successfully"));

        let response = post_vote(&client, &CastRequest::new(election.id, b, voter)).await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!(error_of(response).await, "You have already voted in this election");

        let counts = get_json(&client, "counts", election.id).await;
        assert_eq!(counts[0]["candidateId"], a.to_string());
        assert_eq!(counts[0]["count"], 1);
        assert_eq!(counts[1]["count"], 0);

        let results = get_json(&client, "results", election.id).await;
        assert_eq!(results["status"], "running");
        assert!(results["winners"].is_null());

        let cached = db.candidate(a).await.unwrap().unwrap();
        assert_eq!(cached.vote_count, 1);
    }

    #[backend_test(voter)]
    async fn cast_refusals(client: Client, db: Db) {
        let voter = voter_id(&client);
        let a = insert_candidate(&db, "Candidate One").await;
        let outsider = insert_candidate(&db, "Candidate Two").await;
        let future = db
            .insert_election(NewElection::future_example(vec![a]))
            .await
            .unwrap();
        let running = db
            .insert_election(NewElection::current_example(vec![a]))
            .await
            .unwrap();

        let response = post_vote(&client, &CastRequest::default()).await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(error_of(response).await, "Missing required fields");

        let malformed = CastRequest {
            voter_id: Some("someone".to_string()),
            ..CastRequest::new(running.id, a, voter)
        };
        let response = post_vote(&client, &malformed).await;
        assert_eq!(Status::BadRequest, response.status());

        let response = post_vote(&client, &CastRequest::new(running.id, a, Id::new())).await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = post_vote(&client, &CastRequest::new(999, a, voter)).await;
        assert_eq!(Status::NotFound, response.status());
        assert_eq!(error_of(response).await, "Election not found");

        let response = post_vote(&client, &CastRequest::new(running.id, outsider, voter)).await;
        assert_eq!(Status::NotFound, response.status());
        assert_eq!(error_of(response).await, "Candidate not in current election");

        let response = post_vote(&client, &CastRequest::new(future.id, a, voter)).await;
        assert_eq!(Status::Forbidden, response.status());

        // Nothing was recorded along the way.
        assert!(!db.has_voted(running.id, voter).await.unwrap());
        assert!(!db.has_voted(future.id, voter).await.unwrap());
    }

    #[backend_test]
    async fn cast_requires_voter(client: Client, db: Db) {
        let a = insert_candidate(&db, "Candidate One").await;
        let election = db
            .insert_election(NewElection::current_example(vec![a]))
            .await
            .unwrap();

        // Missing fields are reported before authentication.
        let response = post_vote(&client, &CastRequest::default()).await;
        assert_eq!(Status::BadRequest, response.status());

        let response = post_vote(&client, &CastRequest::new(election.id, a, Id::new())).await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(admin)]
    async fn admins_cannot_vote(client: Client, db: Db) {
        let a = insert_candidate(&db, "Candidate One").await;
        let election = db
            .insert_election(NewElection::current_example(vec![a]))
            .await
            .unwrap();
        let response = post_vote(&client, &CastRequest::new(election.id, a, Id::new())).await;
        assert_eq!(Status::Forbidden, response.status());
    }

    #[backend_test]
    async fn tally_queries_are_validated(client: Client) {
        let response = client.get("/api/vote/counts").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(error_of(response).await, "electionId required");

        let response = client.get("/api/vote/counts?electionId=abc").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());

        let response = client.get("/api/vote/results?electionId=42").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn winners_once_ended(client: Client, db: Db) {
        let a = insert_candidate(&db, "Candidate One").await;
        let b = insert_candidate(&db, "Candidate Two").await;
        let c = insert_candidate(&db, "Candidate Three").await;
        let election = db
            .insert_election(NewElection::past_example(vec![a, b, c]))
            .await
            .unwrap();
        for candidate in [a, b, a, b, c] {
            db.insert_ballot(NewBallot {
                election_id: election.id,
                candidate_id: candidate,
                voter_id: Id::new(),
                cast_at: Utc::now(),
            })
            .await
            .unwrap();
        }

        let results = get_json(&client, "results", election.id).await;
        assert_eq!(results["status"], "ended");
        assert_eq!(
            results["winners"],
            serde_json::json!([a.to_string(), b.to_string()])
        );
        assert_eq!(results["counts"][2]["count"], 1);
    }

    #[backend_test(admin)]
    async fn reconcile_rewrites_counters(client: Client, db: Db) {
        let a = insert_candidate(&db, "Candidate One").await;
        let election = db
            .insert_election(NewElection::current_example(vec![a]))
            .await
            .unwrap();
        db.insert_ballot(NewBallot {
            election_id: election.id,
            candidate_id: a,
            voter_id: Id::new(),
            cast_at: Utc::now(),
        })
        .await
        .unwrap();
        db.set_vote_count(a, 17).await.unwrap();

        let response = client
            .post(format!("/api/vote/reconcile?electionId={}", election.id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let counts: Vec<CandidateVotes> = response.into_json().await.unwrap();
        assert_eq!(counts[0].count, 1);
        assert_eq!(db.candidate(a).await.unwrap().unwrap().vote_count, 1);
    }
}
