use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::AppState;
use crate::auth::{can_modify_objective, can_view_objective, Identity};
use crate::error::{map_unique_violation, ApiOk, AppError};
use crate::models::*;

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Users
// ============================================================

pub async fn list_users(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<ApiOk<Vec<User>>, AppError> {
    identity.require_role(&[UserRole::Admin])?;

    let users = state.db.get_all_users()?;
    Ok(ApiOk::new(users, "Users retrieved successfully"))
}

pub async fn create_user(
    State(state): State<AppState>,
    identity: Identity,
    Json(input): Json<CreateUserInput>,
) -> Result<ApiOk<User>, AppError> {
    identity.require_role(&[UserRole::Admin])?;
    input.validate()?;

    let user = state
        .db
        .create_user(input)
        .map_err(|e| map_unique_violation(e, "A user with this email already exists"))?;

    Ok(ApiOk::created(user, "User created successfully"))
}

// ============================================================
// Objectives
// ============================================================

pub async fn list_objectives(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<ObjectiveQuery>,
) -> Result<ApiOk<ObjectivePage>, AppError> {
    identity.require_role(&[UserRole::Admin])?;
    let (page, page_size) = query.pagination()?;

    let (objectives, total) = state.db.list_objectives(&query, page, page_size)?;
    let total_pages = (total + page_size as i64 - 1) / (page_size as i64);

    Ok(ApiOk::new(
        ObjectivePage {
            objectives,
            pagination: Pagination {
                page,
                page_size,
                total,
                total_pages,
            },
        },
        "Objectives retrieved successfully",
    ))
}

pub async fn create_objective(
    State(state): State<AppState>,
    identity: Identity,
    Json(input): Json<CreateObjectiveInput>,
) -> Result<ApiOk<ObjectiveWithAssignments>, AppError> {
    identity.require_role(&[UserRole::Admin])?;
    input.validate()?;

    let objective = state.db.create_objective(input, identity.id)?;
    state.agg.invalidate_objective(objective.objective.id);

    Ok(ApiOk::created(objective, "Objective created successfully"))
}

pub async fn my_objectives(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<ApiOk<Value>, AppError> {
    let result = state.agg.my_objectives(&identity)?;
    let message = if result.hit {
        "Objectives retrieved successfully (cached)"
    } else {
        "Objectives retrieved successfully"
    };
    Ok(ApiOk::new(result.value, message))
}

pub async fn get_objective(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<ApiOk<Value>, AppError> {
    if !can_view_objective(&state.db, &identity, id)? {
        return Err(AppError::authorization(
            "You do not have access to this objective",
        ));
    }

    let result = state
        .agg
        .objective_detail(id)?
        .ok_or_else(|| AppError::not_found("Objective"))?;

    let message = if result.hit {
        "Objective retrieved successfully (cached)"
    } else {
        "Objective retrieved successfully"
    };
    Ok(ApiOk::new(result.value, message))
}

pub async fn update_objective(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateObjectiveInput>,
) -> Result<ApiOk<Objective>, AppError> {
    if !can_modify_objective(&state.db, &identity, id)? {
        return Err(AppError::authorization(
            "Only admins or creators can update objectives",
        ));
    }
    input.validate()?;

    let objective = state
        .db
        .update_objective(id, input)?
        .ok_or_else(|| AppError::not_found("Objective"))?;

    state.agg.invalidate_objective(id);

    Ok(ApiOk::new(objective, "Objective updated successfully"))
}

pub async fn delete_objective(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<ApiOk<Value>, AppError> {
    identity.require_role(&[UserRole::Admin])?;

    if !state.db.delete_objective(id)? {
        return Err(AppError::not_found("Objective"));
    }

    state.agg.invalidate_objective(id);

    Ok(ApiOk::new(Value::Null, "Objective deleted successfully"))
}

// ============================================================
// Dashboard
// ============================================================

pub async fn dashboard_metrics(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<ApiOk<Value>, AppError> {
    let result = state.agg.dashboard_metrics(&identity)?;
    let message = if result.hit {
        "Dashboard metrics retrieved successfully (cached)"
    } else {
        "Dashboard metrics retrieved successfully"
    };
    Ok(ApiOk::new(result.value, message))
}

// ============================================================
// Pulse
// ============================================================

pub async fn create_pulse_request(
    State(state): State<AppState>,
    identity: Identity,
    Json(input): Json<CreatePulseRequestInput>,
) -> Result<ApiOk<PulseRequest>, AppError> {
    identity.require_role(&[UserRole::Admin])?;

    state
        .db
        .get_objective(input.objective_id)?
        .ok_or_else(|| AppError::not_found("Objective"))?;

    let request = state.db.create_pulse_request(input, identity.id)?;

    Ok(ApiOk::created(request, "Pulse request sent successfully"))
}

pub async fn list_pulse_requests(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<ApiOk<Vec<PulseRequest>>, AppError> {
    identity.require_role(&[UserRole::Admin])?;

    let requests = state.db.get_all_pulse_requests()?;
    Ok(ApiOk::new(requests, "Pulse requests retrieved successfully"))
}

pub async fn pending_pulse_requests(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<ApiOk<Vec<PulseRequest>>, AppError> {
    let requests = state.db.get_pending_pulse_requests(identity.id, Utc::now())?;
    Ok(ApiOk::new(
        requests,
        "Pending pulse requests retrieved successfully",
    ))
}

pub async fn submit_pulse_response(
    State(state): State<AppState>,
    identity: Identity,
    Json(input): Json<SubmitPulseResponseInput>,
) -> Result<ApiOk<PulseResponse>, AppError> {
    input.validate()?;

    let request = state
        .db
        .get_pulse_request(input.pulse_request_id)?
        .ok_or_else(|| AppError::not_found("Pulse request"))?;

    if !state.db.is_assigned(request.objective_id, identity.id)? {
        return Err(AppError::authorization(
            "You are not assigned to this objective",
        ));
    }

    let (response, created) = state.db.upsert_pulse_response(&input, identity.id)?;

    // The response is committed at this point; a recalculation failure
    // must not fail the submission.
    state.agg.on_pulse_response_written(request.objective_id);

    if created {
        Ok(ApiOk::created(
            response,
            "Pulse response submitted successfully",
        ))
    } else {
        Ok(ApiOk::new(response, "Pulse response updated successfully"))
    }
}

// ============================================================
// Blockers
// ============================================================

pub async fn create_blocker(
    State(state): State<AppState>,
    identity: Identity,
    Json(input): Json<CreateBlockerInput>,
) -> Result<ApiOk<Blocker>, AppError> {
    input.validate()?;

    let objective = state
        .db
        .get_objective(input.objective_id)?
        .ok_or_else(|| AppError::not_found("Objective"))?;

    if !state.db.is_assigned(objective.id, identity.id)? {
        return Err(AppError::authorization(
            "You are not assigned to this objective",
        ));
    }

    let blocker = state.db.create_blocker(input, identity.id)?;

    Ok(ApiOk::created(blocker, "Blocker reported successfully"))
}

pub async fn list_blockers(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<BlockerQuery>,
) -> Result<ApiOk<Vec<Blocker>>, AppError> {
    // Non-admins only see blockers on objectives they are assigned to.
    let scope = (!identity.is_admin()).then_some(identity.id);

    let blockers = state.db.list_blockers(&query, scope)?;
    Ok(ApiOk::new(blockers, "Blockers retrieved successfully"))
}

pub async fn update_blocker(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateBlockerInput>,
) -> Result<ApiOk<Blocker>, AppError> {
    identity.require_role(&[UserRole::Admin])?;

    let blocker = state
        .db
        .update_blocker(id, input)?
        .ok_or_else(|| AppError::not_found("Blocker"))?;

    Ok(ApiOk::new(blocker, "Blocker updated successfully"))
}

pub async fn delete_blocker(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<ApiOk<Value>, AppError> {
    identity.require_role(&[UserRole::Admin])?;

    if !state.db.delete_blocker(id)? {
        return Err(AppError::not_found("Blocker"));
    }

    Ok(ApiOk::new(Value::Null, "Blocker deleted successfully"))
}
