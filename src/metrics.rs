//! Pure aggregate math over objectives and sentiment ratings.

use serde::{Deserialize, Serialize};

use crate::models::{Objective, ObjectiveStatus};

/// Dashboard-wide rollup for one identity's visible objective set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub average_health_score: i64,
    pub total_objectives: i64,
    pub completed_objectives: i64,
    pub blocked_objectives: i64,
    pub active_pulse_requests: i64,
}

pub fn total_objectives(objectives: &[Objective]) -> i64 {
    objectives.len() as i64
}

pub fn completed_objectives(objectives: &[Objective]) -> i64 {
    objectives
        .iter()
        .filter(|o| o.status == ObjectiveStatus::Completed)
        .count() as i64
}

pub fn blocked_objectives(objectives: &[Objective]) -> i64 {
    objectives
        .iter()
        .filter(|o| o.status == ObjectiveStatus::Blocked)
        .count() as i64
}

/// Mean health score rounded to the nearest integer. Exactly 100 for an
/// empty set — "nothing to worry about", and no divide-by-zero.
pub fn average_health_score(objectives: &[Objective]) -> i64 {
    if objectives.is_empty() {
        return 100;
    }
    let total: i64 = objectives.iter().map(|o| o.health_score).sum();
    (total as f64 / objectives.len() as f64).round() as i64
}

/// Map the mean of 1–5 sentiment ratings onto the 0–100 health scale:
/// a mean of 1 → 0, 3 → 50, 5 → 100. Returns `None` for an empty set;
/// the caller must leave the current score untouched in that case.
pub fn health_score_from_ratings(ratings: &[i64]) -> Option<i64> {
    if ratings.is_empty() {
        return None;
    }
    let total: i64 = ratings.iter().sum();
    let mean = total as f64 / ratings.len() as f64;
    Some((((mean - 1.0) / 4.0) * 100.0).round() as i64)
}
