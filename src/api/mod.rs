use rocket::{Catcher, Request, Route};

use crate::error::Error;

pub mod admin;
pub mod auth;
pub mod candidate;
pub mod election;
pub mod user;
pub mod vote;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes.extend(candidate::routes());
    routes.extend(election::routes());
    routes.extend(user::routes());
    routes.extend(vote::routes());
    routes
}

/// Catchers giving framework-level failures the same JSON body as our own errors.
pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        unprocessable,
        internal_error,
    ]
}

#[catch(400)]
fn bad_request() -> Error {
    Error::validation("Malformed request")
}

#[catch(401)]
fn unauthorized() -> Error {
    Error::unauthorized("Authentication required")
}

#[catch(403)]
fn forbidden() -> Error {
    Error::forbidden("Insufficient rights")
}

#[catch(404)]
fn not_found(req: &Request) -> Error {
    Error::not_found(format!("Route {}", req.uri()))
}

/// Bodies that parse but don't fit the expected shape are a client error like any other.
#[catch(422)]
fn unprocessable() -> Error {
    Error::validation("Malformed request body")
}

#[catch(500)]
fn internal_error() -> Error {
    Error::internal("Unhandled server error")
}
