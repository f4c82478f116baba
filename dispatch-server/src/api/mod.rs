//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`staff`] - 员工名册管理
//! - [`orders`] - 订单创建、分配、状态流转
//! - [`assignment`] - 轮询指针查看与重置、重置调度状态
//! - [`notifications`] - WebSocket 通知推送

pub mod assignment;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod staff;

use std::time::Duration;

use axum::Router;
use http::StatusCode;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        // Health API - public route
        .merge(health::router())
        .merge(staff::router())
        .merge(orders::router())
        .merge(assignment::router())
        .merge(notifications::router())
}

/// Build a fully configured application with all middleware and state
///
/// Used by the HTTP server and by in-process tests.
pub fn build_app(state: ServerState) -> Router {
    let timeout = Duration::from_millis(state.config.request_timeout_ms);

    build_router()
        // JWT authentication - injects CurrentUser before routes run
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
