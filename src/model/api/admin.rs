use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::password::{self, MIN_PASSWORD_LENGTH},
    db::admin::{Admin, NewAdmin},
};

/// Raw admin credentials, received from a user. These are never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl TryFrom<AdminCredentials> for NewAdmin {
    type Error = Error;

    /// Convert [`AdminCredentials`] to a new [`Admin`] by hashing the password.
    /// This enforces that the username is non-empty, and the password meets minimum length.
    fn try_from(cred: AdminCredentials) -> Result<Self> {
        if cred.username.is_empty() || cred.password.is_empty() {
            return Err(Error::validation("Username and password are required"));
        }
        check_password(&cred.password)?;
        Ok(Self {
            username: cred.username,
            password_hash: password::hash(&cred.password)?,
        })
    }
}

/// Requested changes to an admin account. Empty fields are left unchanged.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct AdminEdit {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AdminEdit {
    /// Validate the edit, returning the new username and password hash.
    pub fn into_changes(self) -> Result<(Option<String>, Option<String>)> {
        let username = self.username.filter(|u| !u.is_empty());
        let password_hash = match self.password.filter(|p| !p.is_empty()) {
            Some(password) => {
                check_password(&password)?;
                Some(password::hash(&password)?)
            }
            None => None,
        };
        Ok((username, password_hash))
    }
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// An admin as shown to other admins: never includes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminDescription {
    pub id: ApiId,
    pub username: String,
}

impl From<Admin> for AdminDescription {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id.into(),
            username: admin.admin.username,
        }
    }
}
