//! Assignment API Module - 轮询指针与重置调度
//!
//! | 路径 | 方法 | 角色 |
//! |------|------|------|
//! | /api/assignment/pointers | GET | 任意 (非 admin 仅本分店) |
//! | /api/assignment/schedule | GET | 任意 |
//! | /api/assignment/pointers/{hotel_id}/{branch_id} | DELETE | 本分店 manager / admin |
//! | /api/assignment/pointers | DELETE | admin |
//! | /api/assignment/pointers/{hotel_id} | DELETE | admin |

mod handler;

use axum::{
    Router, middleware,
    routing::{delete, get},
};

use crate::auth::{require_admin, require_manager};
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/assignment", routes())
}

fn routes() -> Router<ServerState> {
    let read_routes = Router::new()
        .route("/pointers", get(handler::list_pointers))
        .route("/schedule", get(handler::schedule));

    let branch_routes = Router::new()
        .route(
            "/pointers/{hotel_id}/{branch_id}",
            delete(handler::reset_branch),
        )
        .layer(middleware::from_fn(require_manager));

    let admin_routes = Router::new()
        .route("/pointers", delete(handler::reset_all))
        .route("/pointers/{hotel_id}", delete(handler::reset_hotel))
        .layer(middleware::from_fn(require_admin));

    read_routes.merge(branch_routes).merge(admin_routes)
}
