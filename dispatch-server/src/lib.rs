//! Dispatch Server - 酒店餐厅订单分配服务
//!
//! # 架构概述
//!
//! 新订单按分店轮询分配给服务员，同时遵守每人的接单上限；经理可以手动
//! 指派、改派、取消指派；每日在随机时间点重置轮询指针；分配变化通过
//! 消息总线通知相关员工、经理和分店大屏。
//!
//! - **分配** (`assignment`): 轮询分配器、容量跟踪、手动指派、指针重置调度
//! - **通知** (`notify`): 事件路由表 + 有界队列投递
//! - **消息总线** (`message`): 进程内广播，按频道订阅
//! - **认证** (`auth`): JWT + 分店范围检查
//! - **HTTP API** (`api`): RESTful 接口 + SSE 推送
//!
//! # 模块结构
//!
//! ```text
//! dispatch-server/src/
//! ├── core/          # 配置、状态、后台任务、服务器
//! ├── assignment/    # 分配引擎 (redb 存储)
//! ├── notify/        # 通知扇出
//! ├── message/       # 消息总线
//! ├── auth/          # JWT 认证、权限
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 日志、校验、时间
//! ```

pub mod api;
pub mod assignment;
pub mod auth;
pub mod core;
pub mod message;
pub mod notify;
pub mod utils;

// Re-export 公共类型
pub use assignment::{AssignError, AssignmentEngine, DispatchStorage, PointerResetScheduler};
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use message::{BusMessage, MessageBus};
pub use utils::{AppError, AppResult};

// Re-export unified error types from shared
pub use utils::{ApiResponse, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger_with_file};

/// 进程启动准备：加载 `.env`、读取配置、初始化日志
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    init_logger_with_file(
        &config.log_level,
        config.is_production(),
        config.log_dir.as_deref(),
    )?;
    Ok(config)
}
