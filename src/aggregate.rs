//! Cached aggregate reads and the health-score recalculation triggered
//! by pulse writes.
//!
//! The [`Aggregator`] owns the read path: every aggregate query checks
//! the shared TTL cache under an identity- or id-scoped key before
//! touching the database. Mutation paths call
//! [`Aggregator::invalidate_objective`] so a post-mutation read never
//! serves the pre-mutation entry.

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::Identity;
use crate::cache::TtlCache;
use crate::db::Database;
use crate::error::AppError;
use crate::metrics::{self, DashboardMetrics};

/// How long memoized aggregates stay fresh.
pub const AGGREGATE_TTL: Duration = Duration::from_secs(5 * 60);

/// A cache-aware read result: the payload plus whether it was served
/// from the cache (surfaced in response messages).
pub struct Cached {
    pub value: Value,
    pub hit: bool,
}

/// Read-side aggregation over the persistence layer, memoized in an
/// injected [`TtlCache`]. One instance is constructed at startup and
/// shared; tests build their own with isolated caches.
#[derive(Clone)]
pub struct Aggregator {
    db: Database,
    cache: TtlCache,
}

impl Aggregator {
    pub fn new(db: Database, cache: TtlCache) -> Self {
        Self { db, cache }
    }

    /// Dashboard rollup for the identity's visible objective set: all
    /// objectives for admins, assigned objectives for members.
    pub fn dashboard_metrics(&self, identity: &Identity) -> Result<Cached, AppError> {
        let key = format!("dashboard-metrics:{}", identity.id);
        if let Some(value) = self.cache.get(&key) {
            return Ok(Cached { value, hit: true });
        }

        let objectives = if identity.is_admin() {
            self.db.get_all_objectives()?
        } else {
            self.db.get_assigned_objectives(identity.id)?
        };

        let scope = (!identity.is_admin()).then_some(identity.id);
        let active_pulse_requests = self.db.count_active_pulse_requests(scope, Utc::now())?;

        let rollup = DashboardMetrics {
            average_health_score: metrics::average_health_score(&objectives),
            total_objectives: metrics::total_objectives(&objectives),
            completed_objectives: metrics::completed_objectives(&objectives),
            blocked_objectives: metrics::blocked_objectives(&objectives),
            active_pulse_requests,
        };

        let value = serde_json::to_value(&rollup).map_err(anyhow::Error::from)?;
        self.cache.set(&key, value.clone(), AGGREGATE_TTL);
        Ok(Cached { value, hit: false })
    }

    /// The identity's assigned objectives, newest first.
    pub fn my_objectives(&self, identity: &Identity) -> Result<Cached, AppError> {
        let key = format!("my-objectives:{}", identity.id);
        if let Some(value) = self.cache.get(&key) {
            return Ok(Cached { value, hit: true });
        }

        let objectives = self.db.get_objectives_for_user(identity.id)?;
        let value = serde_json::to_value(&objectives).map_err(anyhow::Error::from)?;
        self.cache.set(&key, value.clone(), AGGREGATE_TTL);
        Ok(Cached { value, hit: false })
    }

    /// Single-objective detail read. `None` when the objective does not
    /// exist; the handler raises the typed not-found.
    pub fn objective_detail(&self, id: Uuid) -> Result<Option<Cached>, AppError> {
        let key = format!("objective:{}", id);
        if let Some(value) = self.cache.get(&key) {
            return Ok(Some(Cached { value, hit: true }));
        }

        let Some(objective) = self.db.get_objective_with_assignments(id)? else {
            return Ok(None);
        };

        let value = serde_json::to_value(&objective).map_err(anyhow::Error::from)?;
        self.cache.set(&key, value.clone(), AGGREGATE_TTL);
        Ok(Some(Cached { value, hit: false }))
    }

    /// Drop the objective's memoized detail, then clear everything else.
    /// The identity-scoped dashboard and listing keys all depend on
    /// objective state, and the working set is small enough that a full
    /// clear beats tracking which identities are affected.
    pub fn invalidate_objective(&self, id: Uuid) {
        self.cache.delete(&format!("objective:{}", id));
        self.cache.clear();
    }

    /// Recompute an objective's health score from every rating gathered
    /// through its pulse requests. Zero responses leaves the current
    /// score untouched.
    pub fn recalculate_health_score(&self, objective_id: Uuid) -> Result<(), AppError> {
        let ratings = self.db.get_objective_ratings(objective_id)?;
        let Some(score) = metrics::health_score_from_ratings(&ratings) else {
            return Ok(());
        };

        self.db.set_health_score(objective_id, score)?;
        self.invalidate_objective(objective_id);
        Ok(())
    }

    /// Post-write hook for pulse responses. The response row is the
    /// source of truth and the score a derived projection, so a failed
    /// recalculation is logged and never propagated to the writer.
    pub fn on_pulse_response_written(&self, objective_id: Uuid) {
        if let Err(err) = self.recalculate_health_score(objective_id) {
            tracing::error!(
                "Health score recalculation failed for objective {}: {}",
                objective_id,
                err
            );
        }
    }
}
