//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /health | GET | 简单健康检查 | 无 |
//! | /health/detailed | GET | 存储、调度器、消息总线状态 | 无 |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::assignment::{SchedulerPhase, StorageStats};
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// ok | degraded
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    status: &'static str,
    version: &'static str,
    /// 运行时间 (秒)
    uptime_seconds: i64,
    /// 业务时区当前时间
    local_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage: Option<StorageStats>,
    scheduler: SchedulerPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_reset_at: Option<i64>,
    subscribers: usize,
    /// 消息总线累计发布数
    published: u64,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn detailed_health(State(state): State<ServerState>) -> Json<DetailedHealthResponse> {
    let storage = match state.storage.get_stats() {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::error!(error = %e, "Health check: storage unavailable");
            None
        }
    };
    let next_reset_at = state
        .scheduler
        .status()
        .ok()
        .and_then(|s| s.next_run_at);

    Json(DetailedHealthResponse {
        status: if storage.is_some() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: (shared::util::now_millis() - state.started_at) / 1000,
        local_time: crate::utils::time::local_now_rfc3339(state.config.timezone),
        storage,
        scheduler: state.scheduler.phase(),
        next_reset_at,
        subscribers: state.message_bus.subscriber_count(),
        published: state.message_bus.published_total(),
    })
}
