#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{figment::Figment, Build, Rocket};

use crate::config::{ConfigFairing, StorageFairing};
use crate::logging::LoggerFairing;
use crate::model::store::Db;
use crate::otp::{Dispatcher, LogSender};
use crate::scheduler::SchedulerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod otp;
pub mod scheduled_task;
pub mod scheduler;
pub mod voting;

/// Assemble the full server, configured from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    mount(rocket::build(), StorageFairing::from_config(), Dispatcher::new(LogSender))
        .attach(SchedulerFairing::default())
}

/// Assemble a server over an existing store, without the election scheduler.
pub fn rocket_for_store(db: Db, dispatcher: Dispatcher, figment: Figment) -> Rocket<Build> {
    mount(rocket::custom(figment), StorageFairing::with_store(db), dispatcher)
}

fn mount(rocket: Rocket<Build>, storage: StorageFairing, dispatcher: Dispatcher) -> Rocket<Build> {
    rocket
        .attach(ConfigFairing)
        .attach(storage)
        .attach(LoggerFairing)
        .manage(dispatcher)
        .mount("/api", api::routes())
        .register("/", api::catchers())
}

/// Configuration for tests, independent of `Rocket.toml` profiles.
#[cfg(test)]
pub(crate) fn test_figment() -> Figment {
    rocket::Config::figment()
        .merge(("otp_ttl", 300))
        .merge(("auth_ttl", 3600))
        .merge(("scheduler_interval", 60))
        .merge(("jwt_secret", "test-jwt-secret"))
        .merge(("default_admin_password", "admin-password"))
        .merge(("storage", "memory"))
}
