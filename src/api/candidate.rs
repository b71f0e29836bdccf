use log::info;
use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            candidate::{
                CandidateCount, CandidateCredentials, CandidateDescription, CandidateSpec,
                CandidateUpdate,
            },
            id::ApiId,
        },
        db::{
            admin::Admin,
            candidate::{Candidate, CandidatePatch, NewCandidate},
        },
        store::{Db, Uniqueness},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        create_candidate,
        get_candidates,
        candidate_count,
        get_candidate,
        update_candidate,
        login,
    ]
}

#[post("/candidate", data = "<spec>", format = "json")]
pub async fn create_candidate(
    _token: AuthToken<Admin>,
    spec: Json<CandidateSpec>,
    db: Db,
) -> Result<(Status, Json<CandidateDescription>)> {
    let candidate: NewCandidate = spec.0.try_into()?;
    let email = candidate.email.clone();
    match db.insert_candidate(candidate).await? {
        Uniqueness::Written(candidate) => {
            info!("Candidate {} added", candidate.id);
            Ok((Status::Created, Json(candidate.into())))
        }
        Uniqueness::Duplicate => Err(Error::conflict(format!("Email already exists: {email}"))),
    }
}

#[get("/candidate")]
pub async fn get_candidates(db: Db) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates = db.candidates().await?.into_iter().map(Into::into).collect();
    Ok(Json(candidates))
}

#[get("/candidate/total/count")]
pub async fn candidate_count(db: Db) -> Result<Json<CandidateCount>> {
    let total_candidates = db.count_candidates().await?;
    Ok(Json(CandidateCount { total_candidates }))
}

#[get("/candidate/<id>")]
pub async fn get_candidate(id: &str, db: Db) -> Result<Json<CandidateDescription>> {
    let id = ApiId::parse("id", id)?;
    let candidate = db
        .candidate(id.into())
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {id}")))?;
    Ok(Json(candidate.into()))
}

/// Edit a candidate profile. Admins may edit any profile; candidates only their own.
#[put("/candidate/<id>", data = "<update>", format = "json")]
pub async fn update_candidate(
    admin: std::result::Result<AuthToken<Admin>, Error>,
    candidate: std::result::Result<AuthToken<Candidate>, Error>,
    id: &str,
    update: Json<CandidateUpdate>,
    db: Db,
) -> Result<Json<CandidateDescription>> {
    let id = ApiId::parse("id", id)?;
    match (admin, candidate) {
        (Ok(_), _) => {}
        (Err(_), Ok(token)) if token.id == *id => {}
        (Err(_), Ok(_)) => return Err(Error::forbidden("Cannot edit another candidate")),
        (Err(err), Err(_)) => return Err(err),
    }

    let patch: CandidatePatch = update.0.try_into()?;
    let candidate = db
        .update_candidate(id.into(), patch)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {id}")))?;
    Ok(Json(candidate.into()))
}

#[post("/candidate/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<CandidateCredentials>,
    db: Db,
    config: &State<Config>,
) -> Result<Json<CandidateDescription>> {
    let candidate = db
        .candidate_by_email(&credentials.email)
        .await?
        .filter(|candidate| candidate.verify_password(&credentials.password))
        .ok_or_else(|| Error::unauthorized("Invalid credentials"))?;

    cookies.add(AuthToken::new(&candidate).into_cookie(config)?);
    Ok(Json(candidate.into()))
}
