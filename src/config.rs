use chrono::Duration;
use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    figment::Figment,
    Build, Rocket,
};
use serde::Deserialize;

use crate::error::Result;
use crate::model::{
    common::password,
    db::admin::{NewAdmin, DEFAULT_ADMIN_USERNAME},
    mongodb::MongoStore,
    store::{AdminStore, Db, MemoryStore, Store},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    otp_ttl: u32,
    auth_ttl: u32,
    scheduler_interval: u32,
    // secrets
    jwt_secret: String,
    default_admin_password: String,
}

impl Config {
    /// Valid lifetime of OTP in seconds.
    pub fn otp_ttl(&self) -> Duration {
        Duration::seconds(self.otp_ttl.into())
    }

    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Period of the election scheduler. Never zero.
    pub fn scheduler_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scheduler_interval.max(1).into())
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Password given to the default admin when no admin exists.
    pub fn default_admin_password(&self) -> &str {
        &self.default_admin_password
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which storage backend to use.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Mongodb,
    Memory,
}

/// Configuration for the storage backend.
#[derive(Deserialize)]
struct StorageConfig {
    storage: StorageKind,
    // secrets
    db_uri: Option<String>,
    #[serde(default = "default_db_name")]
    db_name: String,
}

fn default_db_name() -> String {
    "ballotbox".to_string()
}

/// A fairing that sets up the storage backend, performs any setup necessary,
/// and places a [`Db`] handle into managed state.
///
/// Must be attached after [`ConfigFairing`].
pub struct StorageFairing {
    preset: Option<Db>,
}

impl StorageFairing {
    /// Choose and connect to the backend named in the config.
    pub fn from_config() -> Self {
        Self { preset: None }
    }

    /// Use an existing storage handle.
    pub fn with_store(db: Db) -> Self {
        Self { preset: Some(db) }
    }

    async fn connect(figment: &Figment) -> Option<Db> {
        let config = match figment.extract::<StorageConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load storage config");
                rocket::config::pretty_print_error(e);
                return None;
            }
        };
        match config.storage {
            StorageKind::Memory => {
                warn!("Using in-memory storage; all data is lost on shutdown");
                Some(Db::new(MemoryStore::new()))
            }
            StorageKind::Mongodb => {
                let Some(db_uri) = config.db_uri else {
                    error!("`db_uri` must be set when `storage = \"mongodb\"`");
                    return None;
                };
                info!("Loaded database config, connecting...");
                let client = match MongoClient::with_uri_str(db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return None;
                    }
                };
                let db = client.database(&config.db_name);
                match MongoStore::init(&db).await {
                    Ok(store) => {
                        info!("...database connection online!");
                        Some(Db::new(store))
                    }
                    Err(e) => {
                        error!("Failed to initialise database: {e}");
                        None
                    }
                }
            }
        }
    }
}

#[rocket::async_trait]
impl Fairing for StorageFairing {
    fn info(&self) -> Info {
        Info {
            name: "Storage",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let db = match &self.preset {
            Some(db) => db.clone(),
            None => match Self::connect(&rocket.figment().clone()).await {
                Some(db) => db,
                None => return Err(rocket),
            },
        };

        // Ensure there is at least one admin user.
        let Some(password) = rocket
            .state::<Config>()
            .map(|config| config.default_admin_password().to_string())
        else {
            error!("Storage fairing attached before the config fairing");
            return Err(rocket);
        };
        if let Err(e) = ensure_admin_exists(&*db, &password).await {
            error!("Failed to create default admin: {e}");
            return Err(rocket);
        }

        Ok(rocket.manage(db))
    }
}

/// Create the default admin if there are no admins at all.
pub async fn ensure_admin_exists(store: &dyn Store, password: &str) -> Result<()> {
    if !store.admins().await?.is_empty() {
        return Ok(());
    }
    let admin = NewAdmin {
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        password_hash: password::hash(password)?,
    };
    if store.insert_admin(admin).await?.written().is_some() {
        warn!("Created default admin `{DEFAULT_ADMIN_USERNAME}`; change its password");
    }
    Ok(())
}
