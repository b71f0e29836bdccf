use chrono::Utc;
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
            admin::{AdminCredentials, AdminDescription, AdminEdit},
            auth::AuthToken,
            election::{ElectionDescription, ElectionTimes},
            id::ApiId,
            vote::Message,
        },
        common::status::{ElectionStatus, StatusReport},
        db::{
            admin::{Admin, NewAdmin},
            election::NewElection,
        },
        store::{Db, Uniqueness},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        login,
        start_election,
        end_election,
        election_status,
        get_admins,
        create_admin,
        edit_admin,
    ]
}

#[post("/admin/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    db: Db,
    config: &State<Config>,
) -> Result<Json<AdminDescription>> {
    let admin = db
        .admin_by_username(&credentials.username)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| Error::unauthorized("Invalid credentials"))?;

    let token = AuthToken::new(&admin);
    cookies.add(token.into_cookie(config)?);

    Ok(Json(admin.into()))
}

/// Schedule a new election with no candidates. It becomes the current election.
#[post("/admin/start", data = "<times>", format = "json")]
pub async fn start_election(
    _token: AuthToken<Admin>,
    times: Json<ElectionTimes>,
    db: Db,
) -> Result<Json<ElectionDescription>> {
    let window = times.window()?;
    let election = db.insert_election(NewElection::new(window, [])).await?;
    info!("Election {} scheduled", election.id);
    Ok(Json(ElectionDescription::new(election, Vec::new(), Utc::now())))
}

/// End the current election now, regardless of its scheduled end.
#[post("/admin/end")]
pub async fn end_election(_token: AuthToken<Admin>, db: Db) -> Result<Json<Message>> {
    let now = Utc::now();
    let election = db
        .current_election()
        .await?
        .ok_or_else(|| Error::not_found("Election"))?;

    // Ending an election that never opened would leave it ending before it starts.
    if election.status(now) != ElectionStatus::Running {
        return Err(Error::conflict(format!(
            "Election {} is not running",
            election.id
        )));
    }

    db.end_election(election.id, now)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election.id)))?;
    info!("Election {} ended early", election.id);

    Ok(Json(Message::new("Election ended")))
}

#[get("/admin/status")]
pub async fn election_status(db: Db) -> Result<Json<StatusReport>> {
    let election = db.current_election().await?;
    let window = election.as_ref().map(|election| &election.window);
    Ok(Json(StatusReport::evaluate(window, Utc::now())))
}

#[get("/admin/all")]
pub async fn get_admins(_token: AuthToken<Admin>, db: Db) -> Result<Json<Vec<AdminDescription>>> {
    let admins = db.admins().await?.into_iter().map(Into::into).collect();
    Ok(Json(admins))
}

#[post("/admin/add", data = "<new_admin>", format = "json")]
pub async fn create_admin(
    _token: AuthToken<Admin>,
    new_admin: Json<AdminCredentials>,
    db: Db,
) -> Result<(Status, Json<AdminDescription>)> {
    let admin: NewAdmin = new_admin.0.try_into()?;
    let username = admin.username.clone();
    match db.insert_admin(admin).await? {
        Uniqueness::Written(admin) => {
            info!("Admin `{username}` created");
            Ok((Status::Created, Json(admin.into())))
        }
        Uniqueness::Duplicate => Err(Error::conflict(format!(
            "Username already exists: {username}"
        ))),
    }
}

#[put("/admin/edit/<id>", data = "<edit>", format = "json")]
pub async fn edit_admin(
    _token: AuthToken<Admin>,
    id: &str,
    edit: Json<AdminEdit>,
    db: Db,
) -> Result<Json<AdminDescription>> {
    let id = ApiId::parse("id", id)?;
    let (username, password_hash) = edit.0.into_changes()?;
    match db.update_admin(id.into(), username, password_hash).await? {
        Some(Uniqueness::Written(admin)) => Ok(Json(admin.into())),
        Some(Uniqueness::Duplicate) => Err(Error::conflict("Username already exists")),
        None => Err(Error::not_found(format!("Admin {id}"))),
    }
}
