//! Orders API Module
//!
//! | 路径 | 方法 | 说明 | 角色 |
//! |------|------|------|------|
//! | /api/orders | POST | 创建订单并自动分配 | 本分店任意角色 |
//! | /api/orders/{id} | GET | 订单详情 (含分配历史) | 本分店任意角色 |
//! | /api/orders/{id}/assign | PUT | 重新尝试自动分配 | 本分店任意角色 |
//! | /api/orders/{id}/status | PUT | 状态流转 | 本分店任意角色 |
//! | /api/orders/{id}/viewed | PUT | 被分配员工确认 | 被分配员工 |
//! | /api/orders/{id}/assign/{staff_id} | PUT | 手动指派 | manager / admin |
//! | /api/orders/{id}/reassign/{staff_id} | PUT | 改派 | manager / admin |
//! | /api/orders/{id}/unassign | PUT | 取消指派 | manager / admin |

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth::require_manager;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    let read_routes = Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/assign", put(handler::auto_assign))
        .route("/{id}/status", put(handler::update_status))
        .route("/{id}/viewed", put(handler::mark_viewed));

    let manage_routes = Router::new()
        .route("/{id}/assign/{staff_id}", put(handler::manual_assign))
        .route("/{id}/reassign/{staff_id}", put(handler::reassign))
        .route("/{id}/unassign", put(handler::unassign))
        .layer(middleware::from_fn(require_manager));

    read_routes.merge(manage_routes)
}
