//! Notifications WebSocket - 实时分配通知推送
//!
//! GET /ws/notifications?token=<JWT>
//!
//! 浏览器 WebSocket 不支持自定义 headers，令牌通过 query parameter 传递，
//! 因此路由挂在 `/api` 之外，由 handler 自行验证。

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/ws/notifications", get(handler::handle_notifications_ws))
}
