use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// A reported obstacle tied to an objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blocker {
    pub id: Uuid,
    pub objective_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub severity: BlockerSeverity,
    pub status: BlockerStatus,
    pub reported_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockerSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BlockerSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockerStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl BlockerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(Self::Open),
            "IN_PROGRESS" => Some(Self::InProgress),
            "RESOLVED" => Some(Self::Resolved),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Input for reporting a blocker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBlockerInput {
    pub objective_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Defaults to `Medium` if not specified.
    pub severity: Option<BlockerSeverity>,
}

impl CreateBlockerInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::validation("Blocker title is required"));
        }
        Ok(())
    }
}

/// Input for triaging a blocker. Setting status to `Resolved` stamps
/// `resolved_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBlockerInput {
    pub status: Option<BlockerStatus>,
    pub assigned_to: Option<Uuid>,
}

/// Query parameters for the blocker listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockerQuery {
    pub status: Option<BlockerStatus>,
    pub objective_id: Option<Uuid>,
}
