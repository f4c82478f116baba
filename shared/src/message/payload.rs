use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Actor, OrderStatus};

// ==================== Dispatch Events ====================

/// 分发事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchEventKind {
    /// 订单被分配给员工
    Assigned,
    /// 订单从员工处移走 (改派/取消分配)
    Removed,
    /// 被指派员工已查看
    Viewed,
    /// 订单状态推进
    StatusChanged,
    /// 订单完成
    Completed,
    /// 订单取消
    Cancelled,
}

impl fmt::Display for DispatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Assigned => "assigned",
            Self::Removed => "removed",
            Self::Viewed => "viewed",
            Self::StatusChanged => "status_changed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// ==================== Payloads ====================

/// 通知载荷 (服务端 -> 员工/管理者/分店客户端)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub event: DispatchEventKind,
    pub order_id: String,
    pub hotel_id: String,
    pub branch_id: String,
    pub table_id: Option<String>,
    /// 当前被指派员工
    pub staff_id: Option<String>,
    /// 改派前的员工 (`removed` 事件的接收者)
    pub previous_staff_id: Option<String>,
    pub status: OrderStatus,
    pub actor: Actor,
    pub reason: Option<String>,
    pub at: i64,
}
