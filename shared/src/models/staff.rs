//! Staff Model

use serde::{Deserialize, Serialize};
use std::fmt;

use super::BranchScope;

/// 员工角色
///
/// | 角色 | 自动轮询 | 手动指派目标 | 接收 manager 通知 |
/// |------|---------|-------------|------------------|
/// | waiter | ✔ | ✔ | |
/// | kitchen | | ✔ | |
/// | manager | | ✔ | ✔ |
/// | branch_admin | | ✔ | ✔ |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Waiter,
    Kitchen,
    Manager,
    BranchAdmin,
}

impl StaffRole {
    /// 是否参与自动轮询分配
    pub fn takes_round_robin(&self) -> bool {
        matches!(self, Self::Waiter)
    }

    /// 是否接收分店管理者频道的通知
    pub fn is_branch_manager(&self) -> bool {
        matches!(self, Self::Manager | Self::BranchAdmin)
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiter => write!(f, "waiter"),
            Self::Kitchen => write!(f, "kitchen"),
            Self::Manager => write!(f, "manager"),
            Self::BranchAdmin => write!(f, "branch_admin"),
        }
    }
}

/// 员工 (分店名册条目)
///
/// `active_order_count` 只能由分配引擎修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub id: String,
    pub hotel_id: String,
    pub branch_id: String,
    pub name: String,
    pub role: StaffRole,
    pub active_order_count: u32,
    pub max_orders_capacity: u32,
    pub is_available: bool,
    /// 软删除标记
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Staff {
    pub fn scope(&self) -> BranchScope {
        BranchScope::new(&self.hotel_id, &self.branch_id)
    }

    pub fn belongs_to(&self, scope: &BranchScope) -> bool {
        self.hotel_id == scope.hotel_id && self.branch_id == scope.branch_id
    }

    pub fn has_spare_capacity(&self) -> bool {
        self.active_order_count < self.max_orders_capacity
    }

    /// Active, available and below capacity
    pub fn can_accept_order(&self) -> bool {
        self.is_active && self.is_available && self.has_spare_capacity()
    }
}

/// Create staff payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffCreate {
    /// Platform-issued id; generated when absent
    pub id: Option<String>,
    pub hotel_id: String,
    pub branch_id: String,
    pub name: String,
    pub role: StaffRole,
    pub max_orders_capacity: Option<u32>,
    pub is_available: Option<bool>,
}

/// Update staff payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffUpdate {
    pub name: Option<String>,
    pub role: Option<StaffRole>,
    pub max_orders_capacity: Option<u32>,
    pub is_available: Option<bool>,
    pub is_active: Option<bool>,
}

/// Toggle availability payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AvailabilityUpdate {
    pub is_available: bool,
}
