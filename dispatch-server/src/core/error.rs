//! 服务器启动 / 运行错误
//!
//! 请求级错误使用 [`AppError`](crate::utils::AppError)；这里只覆盖进程生命周期内
//! 无法转成 HTTP 响应的错误 (配置、数据库打开、端口绑定)。

use thiserror::Error;

use crate::assignment::StorageError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// 启动流程的 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
