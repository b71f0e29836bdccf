use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use log::{debug, error};
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::logging::RequestId;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad classes of failure, each mapping onto one HTTP status.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input.
    Validation,
    /// The request clashes with existing state, e.g. a second vote.
    Conflict,
    /// A referenced entity does not exist.
    NotFound,
    /// Bad or missing credentials.
    Unauthorized,
    /// Valid credentials, but the action is not permitted right now.
    Forbidden,
    /// Storage or transport failure.
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> Status {
        match self {
            Self::Validation => Status::BadRequest,
            Self::Conflict => Status::Conflict,
            Self::NotFound => Status::NotFound,
            Self::Unauthorized => Status::Unauthorized,
            Self::Forbidden => Status::Forbidden,
            Self::Internal => Status::InternalServerError,
        }
    }
}

/// Reasons a single vote can be refused, in the order they are checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("You have already voted in this election")]
    AlreadyVoted,
    #[error("Election not found")]
    ElectionNotFound,
    #[error("Candidate not in current election")]
    CandidateNotInElection,
    #[error("Election is not running currently")]
    ElectionNotRunning,
}

impl VoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingFields => ErrorKind::Validation,
            Self::AlreadyVoted => ErrorKind::Conflict,
            Self::ElectionNotFound | Self::CandidateNotInElection => ErrorKind::NotFound,
            Self::ElectionNotRunning => ErrorKind::Forbidden,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error("{1}")]
    Kind(ErrorKind, String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Kind(ErrorKind::Validation, msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Kind(ErrorKind::Conflict, msg.into())
    }

    /// Construct a not-found error for the given entity description.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Kind(ErrorKind::NotFound, format!("{} not found", what.into()))
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Kind(ErrorKind::Unauthorized, msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Kind(ErrorKind::Forbidden, msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Kind(ErrorKind::Internal, msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(_) | Self::Argon2(_) => ErrorKind::Internal,
            Self::Jwt(_) => ErrorKind::Unauthorized,
            Self::Vote(err) => err.kind(),
            Self::Kind(kind, _) => *kind,
        }
    }
}

/// JSON error body returned to clients.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let kind = self.kind();
        let message = if kind == ErrorKind::Internal {
            // Never leak storage details to the client.
            error!("req{} internal error: {self}", RequestId::of(req));
            "Internal server error".to_string()
        } else {
            debug!("req{} refused: {self}", RequestId::of(req));
            self.to_string()
        };
        Custom(kind.status(), Json(ErrorBody { error: message })).respond_to(req)
    }
}
