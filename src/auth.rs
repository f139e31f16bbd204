//! Caller identity resolution and access-control checks.
//!
//! The request pipeline is: the [`Identity`] extractor authenticates
//! (bearer token → session → user), the handler's first line authorizes
//! (an explicit role list or a resource predicate), and only then does
//! the handler body run. Every operation spells out its own allowed
//! roles; nothing is derived from an ordering.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::api::AppState;
use crate::db::Database;
use crate::error::AppError;
use crate::models::{User, UserRole};

/// The resolved caller: just the fields access decisions need.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub role: UserRole,
    pub active: bool,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Exact containment check against the operation's allowed set.
    pub fn require_role(&self, allowed: &[UserRole]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            let roles: Vec<&str> = allowed.iter().map(|r| r.as_str()).collect();
            Err(AppError::authorization(format!(
                "Required roles: {}",
                roles.join(", ")
            )))
        }
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            active: user.active,
        }
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(AppError::authentication)?;

        let user = state
            .db
            .resolve_session(token, Utc::now())?
            .ok_or_else(AppError::authentication)?;

        // A deactivated account resolves to no valid identity.
        if !user.active {
            tracing::warn!("Rejected session for deactivated user {}", user.id);
            return Err(AppError::authentication());
        }

        Ok(Identity::from(&user))
    }
}

fn bearer_token(parts: &Parts) -> Option<Uuid> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let token = header.strip_prefix("Bearer ")?;
    Uuid::parse_str(token.trim()).ok()
}

/// Coarse read gate for an objective: admins, the creator, and assigned
/// members may view. A missing objective allows, so the handler raises
/// the typed not-found itself — existence never leaks through the 403
/// path.
pub fn can_view_objective(
    db: &Database,
    identity: &Identity,
    objective_id: Uuid,
) -> Result<bool, AppError> {
    if identity.is_admin() {
        return Ok(true);
    }

    let Some(objective) = db.get_objective(objective_id)? else {
        return Ok(true);
    };

    if objective.created_by == identity.id {
        return Ok(true);
    }

    Ok(db.is_assigned(objective_id, identity.id)?)
}

/// Mutation gate: admins and the creator only. Missing objectives allow
/// for the same reason as [`can_view_objective`].
pub fn can_modify_objective(
    db: &Database,
    identity: &Identity,
    objective_id: Uuid,
) -> Result<bool, AppError> {
    if identity.is_admin() {
        return Ok(true);
    }

    let Some(objective) = db.get_objective(objective_id)? else {
        return Ok(true);
    };

    Ok(objective.created_by == identity.id)
}
