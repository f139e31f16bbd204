use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// A sentiment-check prompt sent to an objective's assigned members.
///
/// Requests with no `expires_at` stay open indefinitely; expired
/// requests disappear from members' pending lists and from the active
/// count on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseRequest {
    pub id: Uuid,
    pub objective_id: Uuid,
    pub question: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A member's 1–5 sentiment reply to a pulse request.
///
/// At most one per (request, user) pair; submitting again updates the
/// existing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseResponse {
    pub id: Uuid,
    pub pulse_request_id: Uuid,
    pub user_id: Uuid,
    pub rating: i64,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a pulse request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePulseRequestInput {
    pub objective_id: Uuid,
    /// Defaults to a generic sentiment question if not provided.
    pub question: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input for submitting (or re-submitting) a pulse response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPulseResponseInput {
    pub pulse_request_id: Uuid,
    pub rating: i64,
    pub feedback: Option<String>,
}

impl SubmitPulseResponseInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::validation("Rating must be between 1 and 5"));
        }
        Ok(())
    }
}
