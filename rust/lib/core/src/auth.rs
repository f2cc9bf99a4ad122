//! Identity carried by bearer tokens.
//!
//! The auth module signs these claims; the server middleware verifies them
//! and stores them in request extensions. Handlers in every module read
//! them back through the [`Claims`] extractor.

use std::fmt;
use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Account role. Serialized exactly as `RM`, `QS`, `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "RM")]
    Rm,
    #[serde(rename = "QS")]
    Qs,
    #[serde(rename = "Admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Rm => "RM",
            Role::Qs => "QS",
            Role::Admin => "Admin",
        }
    }

    /// Name of the hub group every connection with this role joins.
    pub fn group(&self) -> &'static str {
        match self {
            Role::Rm => "RMs",
            Role::Qs => "QSs",
            Role::Admin => "Admins",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rm" => Ok(Role::Rm),
            "qs" => Ok(Role::Qs),
            "admin" => Ok(Role::Admin),
            other => Err(ServiceError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// JWT claims payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user id.
    pub sub: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    /// Display name ("First Last").
    #[serde(default)]
    pub name: String,
    pub iss: String,
    pub aud: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

impl Claims {
    /// Caller id and display name, or 401 when either is missing.
    pub fn identity(&self) -> Result<(&str, &str), ServiceError> {
        if self.sub.trim().is_empty() || self.name.trim().is_empty() {
            return Err(unauthenticated());
        }
        Ok((self.sub.as_str(), self.name.as_str()))
    }

    /// Hub groups a connection holding these claims joins on connect.
    pub fn default_groups(&self) -> Vec<String> {
        vec![format!("user-{}", self.sub), self.role.group().to_string()]
    }
}

fn unauthenticated() -> ServiceError {
    ServiceError::Unauthorized("User not authenticated".into())
}

impl<S: Send + Sync> FromRequestParts<S> for Claims {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or_else(unauthenticated)
    }
}

/// Short public view of a user, embedded in other resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Read access to user accounts for modules that only hold user ids.
pub trait UserDirectory: Send + Sync {
    /// Look up the given ids. Unknown ids are skipped.
    fn lookup(&self, ids: &[String]) -> Result<Vec<UserRef>, ServiceError>;
}
