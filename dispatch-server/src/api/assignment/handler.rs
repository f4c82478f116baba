//! Assignment API Handlers

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use shared::models::{BranchScope, PointerRecord};

use crate::assignment::{ResetTarget, ScheduleStatus};
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::validation::validate_scope_id;
use crate::utils::{ApiResponse, AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct PointerQuery {
    pub hotel_id: Option<String>,
    pub branch_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub target: ResetTarget,
    /// 清除的指针数量
    pub cleared: usize,
}

/// List round-robin pointers
///
/// - admin: 可按 hotel_id / branch_id 过滤，缺省返回全部
/// - 其他角色: 只能查看令牌所属分店
pub async fn list_pointers(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<PointerQuery>,
) -> AppResult<ApiResponse<Vec<PointerRecord>>> {
    if let Some(h) = &query.hotel_id {
        validate_scope_id(h, "hotel_id")?;
    }
    if let Some(b) = &query.branch_id {
        validate_scope_id(b, "branch_id")?;
    }
    let allocator = state.engine.allocator();

    let scope = match (query.hotel_id, query.branch_id) {
        (Some(h), Some(b)) => Some(BranchScope::new(h, b)),
        (None, Some(_)) => {
            return Err(AppError::validation("branch_id requires hotel_id"));
        }
        (Some(h), None) if user.is_admin() => {
            return Ok(ApiResponse::success(allocator.list_pointers(Some(&h))?));
        }
        (None, None) if user.is_admin() => {
            return Ok(ApiResponse::success(allocator.list_pointers(None)?));
        }
        _ => user.scope(),
    };

    let scope = scope.ok_or_else(|| AppError::forbidden("Token carries no branch scope"))?;
    user.ensure_scope(&scope)?;

    let pointers = allocator.pointer(&scope)?.into_iter().collect();
    Ok(ApiResponse::success(pointers))
}

/// Reset-scheduler status (window, next run, last run)
pub async fn schedule(
    State(state): State<ServerState>,
    _user: CurrentUser,
) -> AppResult<ApiResponse<ScheduleStatus>> {
    let status = state.scheduler.status()?;
    Ok(ApiResponse::success(status))
}

fn reset(state: &ServerState, user: &CurrentUser, target: ResetTarget) -> AppResult<ResetResponse> {
    let cleared = state.engine.allocator().reset(&target)?;
    crate::audit_log!(
        user.id,
        "reset_pointers",
        &target,
        format!("cleared:{}", cleared)
    );
    Ok(ResetResponse { target, cleared })
}

/// Reset one branch's pointer
pub async fn reset_branch(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path((hotel_id, branch_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<ResetResponse>> {
    validate_scope_id(&hotel_id, "hotel_id")?;
    validate_scope_id(&branch_id, "branch_id")?;
    user.ensure_manager(&BranchScope::new(&hotel_id, &branch_id))?;
    let result = reset(&state, &user, ResetTarget::Branch { hotel_id, branch_id })?;
    Ok(ApiResponse::success(result))
}

/// Reset every pointer of a hotel
pub async fn reset_hotel(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(hotel_id): Path<String>,
) -> AppResult<ApiResponse<ResetResponse>> {
    validate_scope_id(&hotel_id, "hotel_id")?;
    let result = reset(&state, &user, ResetTarget::Hotel { hotel_id })?;
    Ok(ApiResponse::success(result))
}

/// Reset every pointer on the platform
pub async fn reset_all(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<ResetResponse>> {
    let result = reset(&state, &user, ResetTarget::All)?;
    Ok(ApiResponse::success(result))
}
