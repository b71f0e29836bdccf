use rocket::{
    http::{Cookie, CookieJar, Status},
    Route,
};

use crate::model::api::auth::AUTH_TOKEN_COOKIE;

pub fn routes() -> Vec<Route> {
    routes![logout]
}

/// Forget the caller's auth token, whoever they are.
#[post("/auth/logout")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}
