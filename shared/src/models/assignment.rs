//! Assignment Model
//!
//! 分配相关的持久化记录：分店作用域、轮询指针、分配历史、重置计划。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hotel / branch id: non-empty, ASCII letters, digits, `_` and `-` only.
///
/// `:` 是作用域键和频道键的分隔符，不允许出现在 id 中。
pub fn is_valid_scope_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// 分店作用域 (hotel, branch)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchScope {
    pub hotel_id: String,
    pub branch_id: String,
}

impl BranchScope {
    pub fn new(hotel_id: impl Into<String>, branch_id: impl Into<String>) -> Self {
        Self {
            hotel_id: hotel_id.into(),
            branch_id: branch_id.into(),
        }
    }

    /// Both ids are usable as key segments
    pub fn is_valid(&self) -> bool {
        is_valid_scope_id(&self.hotel_id) && is_valid_scope_id(&self.branch_id)
    }

    /// Storage key: `{hotel_id}:{branch_id}`
    pub fn key(&self) -> String {
        format!("{}:{}", self.hotel_id, self.branch_id)
    }

    /// Prefix matching every branch of a hotel
    pub fn hotel_prefix(hotel_id: &str) -> String {
        format!("{}:", hotel_id)
    }
}

impl fmt::Display for BranchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hotel_id, self.branch_id)
    }
}

/// 轮询指针
///
/// 记录分店最后一次自动分配的员工及其当时在名册中的位置。
/// 员工离开名册后，从 `last_index % len` 继续扫描。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerRecord {
    pub hotel_id: String,
    pub branch_id: String,
    pub last_staff_id: String,
    pub last_index: usize,
    pub updated_at: i64,
}

impl PointerRecord {
    pub fn scope(&self) -> BranchScope {
        BranchScope::new(&self.hotel_id, &self.branch_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentAction {
    Assigned,
    Reassigned,
    Unassigned,
}

/// 操作者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    /// 自动轮询
    System,
    /// 管理者手动操作
    User { user_id: String, role: String },
}

impl Actor {
    pub fn user(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self::User {
            user_id: user_id.into(),
            role: role.into(),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User { user_id, role } => write!(f, "{}({})", user_id, role),
        }
    }
}

/// 分配历史条目，追加到订单的 `assignment_history`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub action: AssignmentAction,
    /// New assignee (None for `unassigned`)
    pub staff_id: Option<String>,
    pub previous_staff_id: Option<String>,
    pub actor: Actor,
    pub reason: Option<String>,
    pub at: i64,
}

/// 指针重置计划 (持久化，重启后恢复)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSchedule {
    /// 下一次运行时间 (Unix millis)
    pub next_run_at: Option<i64>,
    pub last_run_at: Option<i64>,
    /// 上次清除的指针数量
    pub last_cleared: Option<usize>,
}

/// Manual assignment request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub reason: Option<String>,
}
