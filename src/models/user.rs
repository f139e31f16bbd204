use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// A team member or administrator.
///
/// Users carry no credential material; password or SSO verification is
/// an external collaborator's concern. Deactivated users keep their rows
/// (history stays attributable) but can no longer authenticate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: UserRole,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The closed role set. Every operation declares its own allowed list
/// explicitly; there is no derived hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Member,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Member => "MEMBER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(Self::Admin),
            "MEMBER" => Some(Self::Member),
            _ => None,
        }
    }
}

/// Input for creating a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserInput {
    pub email: String,
    pub name: Option<String>,
    pub role: UserRole,
}

impl CreateUserInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(AppError::validation("A valid email address is required"));
        }
        Ok(())
    }
}

/// An opaque bearer session resolving to a user.
///
/// Minted outside the HTTP surface (sign-in flow, test setup); the
/// service only ever resolves tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}
