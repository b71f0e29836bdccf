use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::{debug, error};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{mongodb::Id, store::Db};

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with specific rights.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Create a new [`AuthToken`] for the given user, with the correct rights for that user type.
    pub fn new(user: &U) -> Self {
        Self {
            id: user.id(),
            rights: U::RIGHTS,
            phantom: PhantomData,
        }
    }

    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>, Error> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build(AUTH_TOKEN_COOKIE, token)
            .path("/")
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that it has the correct rights for this user
    /// type, and that the user still exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = req.rocket().state::<Config>() else {
            error!("Config is not managed");
            return Outcome::Failure((Status::InternalServerError, Error::internal("No config")));
        };

        let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) else {
            return Outcome::Failure((
                Status::Unauthorized,
                Error::unauthorized("Authentication required"),
            ));
        };

        // Decode the token.
        let token = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(err) => {
                debug!("Rejected auth cookie: {err}");
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("Invalid or expired token"),
                ));
            }
        };

        // Check it represents the correct rights.
        if !token.permits(U::RIGHTS) {
            return Outcome::Failure((
                Status::Forbidden,
                Error::forbidden(format!("Requires {} rights", U::RIGHTS)),
            ));
        }

        // Check the user actually exists.
        let Outcome::Success(db) = req.guard::<Db>().await else {
            return Outcome::Failure((Status::InternalServerError, Error::internal("No storage")));
        };
        match U::exists(&db, token.id).await {
            Ok(true) => Outcome::Success(token),
            Ok(false) => Outcome::Failure((
                Status::Unauthorized,
                Error::unauthorized(format!("Unknown {}", U::RIGHTS)),
            )),
            Err(err) => Outcome::Failure((Status::InternalServerError, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::db::{
        admin::{Admin, AdminCore},
        voter::{Voter, VoterCore},
    };

    use super::*;

    #[test]
    fn cookie_round_trip() {
        let config = Config::example();
        let voter = Voter {
            id: Id::new(),
            voter: VoterCore {
                email: "voter1@example.com".to_string(),
                name: "Voter One".to_string(),
                otp: None,
                otp_expires_at: None,
            },
        };
        let cookie = AuthToken::new(&voter).into_cookie(&config).unwrap();
        let token = AuthToken::<Voter>::from_cookie(&cookie, &config).unwrap();
        assert_eq!(token.id, voter.id);
        assert!(token.permits(Rights::Voter));
        assert!(!token.permits(Rights::Admin));
    }

    #[test]
    fn tampered_cookie_is_rejected() {
        let config = Config::example();
        let admin = Admin {
            id: Id::new(),
            admin: AdminCore {
                username: "admin".to_string(),
                password_hash: "unset".to_string(),
            },
        };
        let cookie = AuthToken::new(&admin).into_cookie(&config).unwrap();
        let tampered = Cookie::new(AUTH_TOKEN_COOKIE, format!("{}x", cookie.value()));
        assert!(AuthToken::<Admin>::from_cookie(&tampered, &config).is_err());
    }
}
