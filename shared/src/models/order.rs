//! Order Model

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AssignmentRecord, BranchScope};

/// 订单状态
///
/// `pending → preparing → ready → served → completed`，
/// 任意非终态可转为 `cancelled`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Served,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    fn next(&self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Preparing),
            Self::Preparing => Some(Self::Ready),
            Self::Ready => Some(Self::Served),
            Self::Served => Some(Self::Completed),
            Self::Completed | Self::Cancelled => None,
        }
    }

    /// One step forward, or cancel from any non-terminal state
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == Self::Cancelled || self.next() == Some(target)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Served => "served",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// 订单 (分配视角)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub hotel_id: String,
    pub branch_id: String,
    pub table_id: Option<String>,
    pub status: OrderStatus,
    pub assigned_staff_id: Option<String>,
    pub assigned_at: Option<i64>,
    /// 被指派员工查看订单的时间
    pub acknowledged_at: Option<i64>,
    #[serde(default)]
    pub assignment_history: Vec<AssignmentRecord>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        scope: &BranchScope,
        table_id: Option<String>,
        now: i64,
    ) -> Self {
        Self {
            id: id.into(),
            hotel_id: scope.hotel_id.clone(),
            branch_id: scope.branch_id.clone(),
            table_id,
            status: OrderStatus::Pending,
            assigned_staff_id: None,
            assigned_at: None,
            acknowledged_at: None,
            assignment_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn scope(&self) -> BranchScope {
        BranchScope::new(&self.hotel_id, &self.branch_id)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned_staff_id.is_some()
    }
}

/// Create order payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreate {
    /// Platform-issued id; generated when absent
    pub id: Option<String>,
    pub hotel_id: String,
    pub branch_id: String,
    pub table_id: Option<String>,
}

/// Status transition payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Preparing));
        assert!(OrderStatus::Served.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Ready));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Preparing));
    }

    #[test]
    fn test_cancel_from_non_terminal_only() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Served.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_history_defaults_when_missing() {
        let json = r#"{"id":"o1","hotel_id":"h","branch_id":"b","table_id":null,
            "status":"pending","assigned_staff_id":null,"assigned_at":null,
            "acknowledged_at":null,"created_at":1,"updated_at":1}"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert!(order.assignment_history.is_empty());
        assert!(!order.is_assigned());
    }
}
