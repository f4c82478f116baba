//! Staff API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::models::{AvailabilityUpdate, BranchScope, Staff, StaffCreate, StaffUpdate};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::validation::{
    MAX_ID_LEN, MAX_NAME_LEN, validate_capacity, validate_optional_text, validate_required_text,
    validate_scope_id,
};
use crate::utils::{ApiResponse, AppResult};

#[derive(Debug, Deserialize)]
pub struct BranchQuery {
    pub hotel_id: String,
    pub branch_id: String,
}

/// List the branch roster
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<BranchQuery>,
) -> AppResult<ApiResponse<Vec<Staff>>> {
    validate_scope_id(&query.hotel_id, "hotel_id")?;
    validate_scope_id(&query.branch_id, "branch_id")?;
    let scope = BranchScope::new(query.hotel_id, query.branch_id);
    user.ensure_scope(&scope)?;

    let staff = state.directory.list(&scope)?;
    Ok(ApiResponse::success(staff))
}

/// Get staff by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Staff>> {
    let staff = state.directory.get(&id)?;
    user.ensure_scope(&staff.scope())?;
    Ok(ApiResponse::success(staff))
}

/// Create a staff member
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<StaffCreate>,
) -> AppResult<ApiResponse<Staff>> {
    validate_optional_text(&payload.id, "id", MAX_ID_LEN)?;
    validate_scope_id(&payload.hotel_id, "hotel_id")?;
    validate_scope_id(&payload.branch_id, "branch_id")?;
    validate_required_text(&payload.name, "name", MAX_NAME_LEN)?;
    if let Some(capacity) = payload.max_orders_capacity {
        validate_capacity(capacity)?;
    }
    user.ensure_manager(&BranchScope::new(&payload.hotel_id, &payload.branch_id))?;

    let staff = state.directory.create(payload)?;
    Ok(ApiResponse::success(staff))
}

/// Update name, role, capacity, availability or active flag
pub async fn update(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<StaffUpdate>,
) -> AppResult<ApiResponse<Staff>> {
    if let Some(name) = &payload.name {
        validate_required_text(name, "name", MAX_NAME_LEN)?;
    }
    if let Some(capacity) = payload.max_orders_capacity {
        validate_capacity(capacity)?;
    }
    let current = state.directory.get(&id)?;
    user.ensure_manager(&current.scope())?;

    let staff = state.directory.update(&id, payload)?;
    Ok(ApiResponse::success(staff))
}

/// Toggle availability (the staff member themselves, or a manager)
pub async fn set_availability(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<AvailabilityUpdate>,
) -> AppResult<ApiResponse<Staff>> {
    let current = state.directory.get(&id)?;
    if user.id != id {
        user.ensure_manager(&current.scope())?;
    }

    let staff = state.directory.set_availability(&id, payload.is_available)?;
    Ok(ApiResponse::success(staff))
}

/// Remove a staff member; refused while they hold active orders
pub async fn delete(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Staff>> {
    let current = state.directory.get(&id)?;
    user.ensure_manager(&current.scope())?;

    let staff = state.directory.remove(&id)?;
    crate::audit_log!(user.id, "remove_staff", format!("staff:{}", id));
    Ok(ApiResponse::success(staff))
}
