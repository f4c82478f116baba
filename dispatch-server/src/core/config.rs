use std::path::PathBuf;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::assignment::ResetWindow;
use crate::auth::JwtConfig;
use crate::core::ServerError;
use crate::utils::time::{parse_hhmm, parse_timezone};

/// 默认重置窗口 02:00–05:00
fn default_reset_window() -> (NaiveTime, NaiveTime) {
    (
        NaiveTime::from_hms_opt(2, 0, 0).unwrap_or(NaiveTime::MIN),
        NaiveTime::from_hms_opt(5, 0, 0).unwrap_or(NaiveTime::MIN),
    )
}

/// 服务器配置 - 调度服务的所有配置项
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/dispatch | 工作目录 (redb 文件、日志) |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | TIMEZONE | Asia/Kolkata | 业务时区 (重置窗口) |
/// | DEFAULT_MAX_ORDERS_CAPACITY | 20 | 新员工默认容量 |
/// | RESET_WINDOW_START | 02:00 | 指针重置窗口开始 |
/// | RESET_WINDOW_END | 05:00 | 指针重置窗口结束 |
/// | NOTIFY_QUEUE_CAPACITY | 1024 | 通知队列容量 |
/// | MESSAGE_CHANNEL_CAPACITY | 1024 | 消息总线广播容量 |
/// | REQUEST_TIMEOUT_MS | 30000 | 请求超时(毫秒) |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (未设置) | 日志文件目录 |
///
/// JWT 相关变量见 [`JwtConfig::from_env`]。
///
/// ```ignore
/// WORK_DIR=/data/dispatch HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库和日志
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 业务时区
    pub timezone: Tz,
    /// 新员工默认最大并发订单数
    pub default_max_orders_capacity: u32,
    /// 指针重置窗口 (本地时间)
    pub reset_window_start: NaiveTime,
    pub reset_window_end: NaiveTime,
    /// 通知扇出队列容量
    pub notify_queue_capacity: usize,
    /// 消息总线广播容量
    pub message_channel_capacity: usize,
    /// 请求超时时间 (毫秒)
    pub request_timeout_ms: u64,
    /// JWT 认证配置
    pub jwt: JwtConfig,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 未设置的环境变量使用默认值；JWT 密钥不合法时返回错误。
    pub fn from_env() -> Result<Self, ServerError> {
        let jwt = JwtConfig::from_env().map_err(|e| ServerError::Config(e.to_string()))?;
        let (default_start, default_end) = default_reset_window();

        let mut reset_window_start = std::env::var("RESET_WINDOW_START")
            .map(|v| parse_hhmm(&v, default_start))
            .unwrap_or(default_start);
        let mut reset_window_end = std::env::var("RESET_WINDOW_END")
            .map(|v| parse_hhmm(&v, default_end))
            .unwrap_or(default_end);
        if reset_window_start >= reset_window_end {
            tracing::warn!(
                "Reset window {}-{} is empty or crosses midnight, falling back to 02:00-05:00",
                reset_window_start.format("%H:%M"),
                reset_window_end.format("%H:%M")
            );
            reset_window_start = default_start;
            reset_window_end = default_end;
        }

        Ok(Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/dispatch".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            timezone: std::env::var("TIMEZONE")
                .map(|v| parse_timezone(&v, chrono_tz::Asia::Kolkata))
                .unwrap_or(chrono_tz::Asia::Kolkata),
            default_max_orders_capacity: std::env::var("DEFAULT_MAX_ORDERS_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| crate::utils::validation::validate_capacity(*v).is_ok())
                .unwrap_or(20),
            reset_window_start,
            reset_window_end,
            notify_queue_capacity: std::env::var("NOTIFY_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            message_channel_capacity: std::env::var("MESSAGE_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30000),
            jwt,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
        })
    }

    /// 使用自定义工作目录和端口覆盖
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Result<Self, ServerError> {
        let mut config = Self::from_env()?;
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        Ok(config)
    }

    /// redb 数据库文件
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("dispatch.redb")
    }

    pub fn reset_window(&self) -> ResetWindow {
        ResetWindow::new(self.reset_window_start, self.reset_window_end, self.timezone)
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
