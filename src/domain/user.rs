//! User domain model

use crate::jwt::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// User resource as returned to callers. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

/// Payload for creating a user. The identifier is assigned by the domain layer.
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub roles: Vec<Role>,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(must_match(other = "password"))]
    pub password_confirm: String,
}

/// Partial update payload; only present fields are applied.
#[derive(Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "password_confirmed"))]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub roles: Option<Vec<Role>>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// A new password must arrive together with an identical confirmation.
fn password_confirmed(input: &UpdateUser) -> Result<(), ValidationError> {
    if input.password != input.password_confirm {
        return Err(ValidationError::new("password_mismatch"));
    }
    Ok(())
}

// Passwords stay out of logs.
impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for UpdateUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Opaque credential issued on successful authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
}
