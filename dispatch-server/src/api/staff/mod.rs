//! Staff API Module
//!
//! | 路径 | 方法 | 角色 |
//! |------|------|------|
//! | /api/staff?hotel_id&branch_id | GET | 本分店任意角色 |
//! | /api/staff/{id} | GET | 本分店任意角色 |
//! | /api/staff | POST | manager / admin |
//! | /api/staff/{id} | PUT, DELETE | manager / admin |
//! | /api/staff/{id}/availability | PUT | 本人或 manager / admin |

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth::require_manager;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/staff", routes())
}

fn routes() -> Router<ServerState> {
    let read_routes = Router::new()
        .route("/", get(handler::list))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/availability", put(handler::set_availability));

    let manage_routes = Router::new()
        .route("/", post(handler::create))
        .route("/{id}", put(handler::update).delete(handler::delete))
        .layer(middleware::from_fn(require_manager));

    read_routes.merge(manage_routes)
}
