//! Orders API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::models::{AssignmentRequest, BranchScope, Order, OrderCreate, OrderStatusUpdate};

use crate::assignment::AssignError;
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::validation::{
    MAX_ID_LEN, MAX_NAME_LEN, MAX_NOTE_LEN, validate_optional_text, validate_required_text,
    validate_scope_id,
};
use crate::utils::{ApiResponse, AppResult};

/// Load an order and check it belongs to the caller's branch
fn load_scoped(state: &ServerState, user: &CurrentUser, id: &str) -> AppResult<Order> {
    let order = state.engine.get_order(id)?;
    user.ensure_scope(&order.scope())?;
    Ok(order)
}

/// Create an order and run round-robin assignment.
///
/// 分店无可用员工时订单保持 pending，返回成功并附带提示。
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<OrderCreate>,
) -> AppResult<ApiResponse<Order>> {
    validate_optional_text(&payload.id, "id", MAX_ID_LEN)?;
    validate_scope_id(&payload.hotel_id, "hotel_id")?;
    validate_scope_id(&payload.branch_id, "branch_id")?;
    validate_optional_text(&payload.table_id, "table_id", MAX_NAME_LEN)?;

    let scope = BranchScope::new(payload.hotel_id, payload.branch_id);
    user.ensure_scope(&scope)?;

    let id = payload.id.unwrap_or_else(shared::util::new_id);
    let order = state.engine.create_order(&id, &scope, payload.table_id)?;

    match state.engine.assign(&order.id) {
        Ok(assigned) => Ok(ApiResponse::success(assigned)),
        Err(AssignError::NoEligibleStaff(_)) => {
            tracing::warn!(order_id = %order.id, scope = %scope, "Order left pending, no eligible staff");
            Ok(ApiResponse::success_with_message(
                "Order created, waiting for an available waiter",
                order,
            ))
        }
        Err(e) => Err(e.into()),
    }
}

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Order>> {
    let order = load_scoped(&state, &user, &id)?;
    Ok(ApiResponse::success(order))
}

/// Retry round-robin assignment for a pending order
pub async fn auto_assign(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Order>> {
    load_scoped(&state, &user, &id)?;
    let order = state.engine.assign(&id)?;
    Ok(ApiResponse::success(order))
}

/// Move the order one step along its lifecycle (or cancel it)
pub async fn update_status(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<OrderStatusUpdate>,
) -> AppResult<ApiResponse<Order>> {
    validate_optional_text(&payload.reason, "reason", MAX_NOTE_LEN)?;
    load_scoped(&state, &user, &id)?;

    let order = state.engine.update_status(
        &id,
        payload.status,
        &user.actor(),
        payload.reason.as_deref(),
    )?;
    Ok(ApiResponse::success(order))
}

/// The assignee acknowledges the order
pub async fn mark_viewed(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Order>> {
    load_scoped(&state, &user, &id)?;
    let order = state.engine.mark_viewed(&id, &user.id)?;
    Ok(ApiResponse::success(order))
}

/// Force-assign to a specific staff member (pointer untouched)
pub async fn manual_assign(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path((id, staff_id)): Path<(String, String)>,
    Json(payload): Json<AssignmentRequest>,
) -> AppResult<ApiResponse<Order>> {
    validate_optional_text(&payload.reason, "reason", MAX_NOTE_LEN)?;
    let current = state.engine.get_order(&id)?;
    user.ensure_manager(&current.scope())?;

    let order = state.engine.manual_assign(
        &id,
        &staff_id,
        &user.actor(),
        payload.reason.as_deref(),
    )?;
    crate::audit_log!(
        user.id,
        "manual_assign",
        format!("order:{}", id),
        format!("staff:{}", staff_id)
    );
    Ok(ApiResponse::success(order))
}

/// Move an order to another staff member
pub async fn reassign(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path((id, staff_id)): Path<(String, String)>,
    Json(payload): Json<AssignmentRequest>,
) -> AppResult<ApiResponse<Order>> {
    validate_optional_text(&payload.reason, "reason", MAX_NOTE_LEN)?;
    let current = state.engine.get_order(&id)?;
    user.ensure_manager(&current.scope())?;

    let order = state
        .engine
        .reassign(&id, &staff_id, &user.actor(), payload.reason.as_deref())?;
    crate::audit_log!(
        user.id,
        "reassign",
        format!("order:{}", id),
        format!(
            "from:{} to:{}",
            current.assigned_staff_id.as_deref().unwrap_or("-"),
            staff_id
        )
    );
    Ok(ApiResponse::success(order))
}

/// Return an order to the unassigned pool
pub async fn unassign(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<AssignmentRequest>,
) -> AppResult<ApiResponse<Order>> {
    validate_optional_text(&payload.reason, "reason", MAX_NOTE_LEN)?;
    let current = state.engine.get_order(&id)?;
    user.ensure_manager(&current.scope())?;

    let order = state
        .engine
        .unassign(&id, &user.actor(), payload.reason.as_deref())?;
    crate::audit_log!(user.id, "unassign", format!("order:{}", id));
    Ok(ApiResponse::success(order))
}
