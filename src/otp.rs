//! Delivery of one-time codes to voters.

use std::ops::Deref;
use std::sync::Arc;

use log::{error, info};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::error::Result;
use crate::model::common::code::Code;

/// Something able to deliver a one-time code to a voter's email address.
#[rocket::async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, email: &str, name: &str, code: Code) -> Result<()>;
}

/// Writes codes to the server log instead of sending them anywhere.
/// Only suitable for development and testing.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogSender;

#[rocket::async_trait]
impl OtpSender for LogSender {
    async fn send(&self, email: &str, name: &str, code: Code) -> Result<()> {
        info!("One-time code for {name} <{email}>: {code}");
        Ok(())
    }
}

/// Shared handle to the configured [`OtpSender`]; lives in managed state.
#[derive(Clone)]
pub struct Dispatcher(Arc<dyn OtpSender>);

impl Dispatcher {
    pub fn new(sender: impl OtpSender + 'static) -> Self {
        Self(Arc::new(sender))
    }

    /// Send `code` in the background. Failures are logged, never reported
    /// to the requester.
    pub fn dispatch(&self, email: String, name: String, code: Code) {
        let sender = self.0.clone();
        rocket::tokio::spawn(async move {
            if let Err(err) = sender.send(&email, &name, code).await {
                error!("Failed to send one-time code to {email}: {err}");
            }
        });
    }
}

impl Deref for Dispatcher {
    type Target = dyn OtpSender;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Dispatcher {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.rocket().state::<Dispatcher>() {
            Some(dispatcher) => Outcome::Success(dispatcher.clone()),
            None => Outcome::Failure((Status::InternalServerError, ())),
        }
    }
}
