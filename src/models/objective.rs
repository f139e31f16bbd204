use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::User;
use crate::error::AppError;

/// A tracked team goal.
///
/// `health_score` is a derived projection of pulse sentiment: it starts
/// at 100 ("nothing to worry about") and is recomputed whenever an
/// assigned member submits or updates a pulse response. Both
/// `health_score` and `progress` are always within [0, 100].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: ObjectiveStatus,
    pub health_score: i64,
    pub progress: i64,
    pub target_date: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Lifecycle status of an objective.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectiveStatus {
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl ObjectiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Blocked => "BLOCKED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NOT_STARTED" => Some(Self::NotStarted),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "BLOCKED" => Some(Self::Blocked),
            _ => None,
        }
    }
}

/// The relation granting a user access to an objective's sub-resources.
/// Unique per (objective, user) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub objective_id: Uuid,
    pub user_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

/// An assignment with the assigned user embedded, for detail responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentWithUser {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub user: User,
}

/// An objective with its assignment set, used for detail and list
/// responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveWithAssignments {
    #[serde(flatten)]
    pub objective: Objective,
    pub assignments: Vec<AssignmentWithUser>,
}

/// Input for creating a new objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateObjectiveInput {
    pub title: String,
    pub description: Option<String>,
    /// Defaults to `Medium` if not specified.
    pub priority: Option<Priority>,
    pub target_date: Option<DateTime<Utc>>,
    /// Initial assignee set, created atomically with the objective.
    #[serde(default)]
    pub assigned_users: Vec<Uuid>,
}

impl CreateObjectiveInput {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_title(self.title.trim())?;
        validate_description(self.description.as_deref())?;
        Ok(())
    }
}

/// Input for updating an objective. All fields optional for partial
/// updates; `assigned_users`, when present, replaces the assignment set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateObjectiveInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<ObjectiveStatus>,
    pub progress: Option<i64>,
    pub target_date: Option<DateTime<Utc>>,
    pub assigned_users: Option<Vec<Uuid>>,
}

impl UpdateObjectiveInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            validate_title(title.trim())?;
        }
        validate_description(self.description.as_deref())?;
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), AppError> {
    if title.is_empty() {
        return Err(AppError::validation(
            "Objective title is required and cannot be empty",
        ));
    }
    if title.len() > 200 {
        return Err(AppError::validation(
            "Objective title must be less than 200 characters",
        ));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), AppError> {
    if description.is_some_and(|d| d.len() > 1000) {
        return Err(AppError::validation(
            "Objective description must be less than 1000 characters",
        ));
    }
    Ok(())
}

/// Query parameters for the admin objective listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectiveQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<ObjectiveStatus>,
    pub priority: Option<Priority>,
    pub search: Option<String>,
}

impl ObjectiveQuery {
    /// Normalize pagination, rejecting out-of-range values.
    pub fn pagination(&self) -> Result<(u32, u32), AppError> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(20);

        if page < 1 {
            return Err(AppError::validation("Page number must be greater than 0"));
        }
        if !(1..=100).contains(&page_size) {
            return Err(AppError::validation_with_details(
                "Page size must be between 1 and 100",
                json!({ "page_size": page_size }),
            ));
        }
        if self.search.as_deref().is_some_and(|s| s.len() > 100) {
            return Err(AppError::validation(
                "Search query must be less than 100 characters",
            ));
        }

        Ok((page, page_size))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
    pub total_pages: i64,
}

/// One page of the admin objective listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectivePage {
    pub objectives: Vec<ObjectiveWithAssignments>,
    pub pagination: Pagination,
}
