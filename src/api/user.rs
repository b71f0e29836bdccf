use chrono::Utc;
use log::{debug, info};
use rocket::{http::CookieJar, serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            vote::Message,
            voter::{OtpRequest, OtpVerify, VoterCount, VoterDescription},
        },
        common::code::Code,
        db::voter::Voter,
        mongodb::Id,
        store::{Db, Store},
    },
    otp::Dispatcher,
};

pub fn routes() -> Vec<Route> {
    routes![send_otp, verify_otp, me, voter_count]
}

/// Issue a fresh one-time code, registering the voter on first contact.
/// Any earlier outstanding code for the same email stops working.
#[post("/user/send-otp", data = "<request>", format = "json")]
pub async fn send_otp(
    request: Json<OtpRequest>,
    db: Db,
    dispatcher: Dispatcher,
    config: &State<Config>,
) -> Result<Json<Message>> {
    request.validate()?;
    let code = Code::random();
    let expires_at = Utc::now() + config.otp_ttl();
    let voter = db
        .issue_code(&request.email, &request.name, code, expires_at)
        .await?;
    debug!("Issued one-time code to voter {}", voter.id);

    let Voter { voter, .. } = voter;
    dispatcher.dispatch(voter.email, voter.name, code);
    Ok(Json(Message::new("OTP sent to email")))
}

#[post("/user/verify-otp", data = "<request>", format = "json")]
pub async fn verify_otp(
    cookies: &CookieJar<'_>,
    request: Json<OtpVerify>,
    db: Db,
    config: &State<Config>,
) -> Result<Json<VoterDescription>> {
    let code = request.code()?;
    let voter = db
        .consume_code(&request.email, code, Utc::now())
        .await?
        .ok_or_else(|| Error::unauthorized("Invalid or expired OTP"))?;
    info!("Voter {} signed in", voter.id);

    cookies.add(AuthToken::new(&voter).into_cookie(config)?);
    let has_voted = voted_in_current(&*db, voter.id).await?;
    Ok(Json(VoterDescription::new(voter, has_voted)))
}

#[get("/user/me")]
pub async fn me(token: AuthToken<Voter>, db: Db) -> Result<Json<VoterDescription>> {
    let voter = db
        .voter(token.id)
        .await?
        .ok_or_else(|| Error::unauthorized("Unknown voter"))?;
    let has_voted = voted_in_current(&*db, voter.id).await?;
    Ok(Json(VoterDescription::new(voter, has_voted)))
}

#[get("/user/total/count")]
pub async fn voter_count(db: Db) -> Result<Json<VoterCount>> {
    let total_voters = db.count_voters().await?;
    Ok(Json(VoterCount { total_voters }))
}

/// Whether the voter has a ballot in the current election, if there is one.
async fn voted_in_current(store: &dyn Store, voter: Id) -> Result<bool> {
    match store.current_election().await? {
        Some(election) => store.has_voted(election.id, voter).await,
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json,
    };

    use crate::{
        model::{
            api::auth::AUTH_TOKEN_COOKIE,
            db::{ballot::NewBallot, election::NewElection},
            store::MemoryStore,
        },
        otp::tests::Outbox,
    };

    use super::*;

    async fn request_code<'c>(client: &'c Client, request: &OtpRequest) -> LocalResponse<'c> {
        client
            .post(uri!("/api", send_otp))
            .header(ContentType::JSON)
            .body(serde_json::to_string(request).unwrap())
            .dispatch()
            .await
    }

    async fn verify<'c>(client: &'c Client, email: &str, otp: &str) -> LocalResponse<'c> {
        let body = OtpVerify {
            email: email.to_string(),
            otp: otp.to_string(),
        };
        client
            .post(uri!("/api", verify_otp))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&body).unwrap())
            .dispatch()
            .await
    }

    /// Wait for the background dispatch to deliver the `n`th code.
    async fn nth_code(outbox: &Outbox, n: usize) -> Code {
        for _ in 0..100 {
            if let Some((_, code)) = outbox.sent.lock().await.get(n) {
                return *code;
            }
            rocket::tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("code {n} was never sent");
    }

    fn wrong(code: Code) -> String {
        let wrong = if code.to_string() == "000000" { "111111" } else { "000000" };
        wrong.to_string()
    }

    #[rocket::async_test]
    async fn sign_in_with_emailed_code() {
        let db = Db::new(MemoryStore::new());
        let outbox = Arc::new(Outbox::default());
        let rocket = crate::rocket_for_store(
            db.clone(),
            Dispatcher::new(outbox.clone()),
            crate::test_figment(),
        );
        let client = Client::tracked(rocket).await.unwrap();
        let request = OtpRequest::example();

        let response = request_code(&client, &request).await;
        assert_eq!(Status::Ok, response.status());
        let code = nth_code(&outbox, 0).await;
        assert_eq!(outbox.sent.lock().await[0].0, request.email);

        let response = verify(&client, &request.email, &wrong(code)).await;
        assert_eq!(Status::Unauthorized, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());

        let response = verify(&client, &request.email, &code.to_string()).await;
        assert_eq!(Status::Ok, response.status());
        let voter: VoterDescription = response.into_json().await.unwrap();
        assert_eq!(voter.email, request.email);
        assert_eq!(voter.name, request.name);
        assert!(!voter.has_voted);
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        // Codes are single use.
        let response = verify(&client, &request.email, &code.to_string()).await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client.get(uri!("/api", me)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let current: VoterDescription = response.into_json().await.unwrap();
        assert_eq!(current.id, voter.id);

        // Asking again reuses the voter and replaces the code.
        request_code(&client, &request).await;
        let second = nth_code(&outbox, 1).await;
        let response = client.get(uri!("/api", voter_count)).dispatch().await;
        let count: VoterCount = response.into_json().await.unwrap();
        assert_eq!(count.total_voters, 1);
        let response = verify(&client, &request.email, &second.to_string()).await;
        assert_eq!(Status::Ok, response.status());
    }

    #[backend_test]
    async fn bad_requests(client: Client) {
        let response = request_code(&client, &OtpRequest::default()).await;
        assert_eq!(Status::BadRequest, response.status());

        let response = verify(&client, "voter1@example.com", "12").await;
        assert_eq!(Status::Unauthorized, response.status());

        // Nobody asked for a code for this address.
        let response = verify(&client, "nobody@example.com", "123456").await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client.get(uri!("/api", me)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(voter)]
    async fn has_voted_follows_the_current_election(client: Client, db: Db) {
        let response = client.get(uri!("/api", me)).dispatch().await;
        let voter: VoterDescription = response.into_json().await.unwrap();
        assert!(!voter.has_voted);

        let candidate = Id::new();
        let election = db
            .insert_election(NewElection::current_example(vec![candidate]))
            .await
            .unwrap();
        db.insert_ballot(NewBallot {
            election_id: election.id,
            candidate_id: candidate,
            voter_id: voter.id.into(),
            cast_at: Utc::now(),
        })
        .await
        .unwrap();
        let response = client.get(uri!("/api", me)).dispatch().await;
        let voter: VoterDescription = response.into_json().await.unwrap();
        assert!(voter.has_voted);

        // A newer election starts everyone afresh.
        db.insert_election(NewElection::future_example(vec![candidate]))
            .await
            .unwrap();
        let response = client.get(uri!("/api", me)).dispatch().await;
        let voter: VoterDescription = response.into_json().await.unwrap();
        assert!(!voter.has_voted);
    }
}
