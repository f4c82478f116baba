//! Assignment errors
//!
//! 分配决策错误返回给调用方；通知投递失败与重置任务失败只记录日志，不在此处出现。

use shared::error::{AppError, ErrorCode};
use shared::models::{BranchScope, OrderStatus};
use thiserror::Error;

use super::storage::StorageError;

#[derive(Debug, Error)]
pub enum AssignError {
    #[error("No eligible staff in branch {0}")]
    NoEligibleStaff(String),

    #[error("Staff {0} is at capacity")]
    CapacityExceeded(String),

    #[error("Staff {staff_id} does not belong to branch {scope}")]
    StaffNotInBranch { staff_id: String, scope: String },

    #[error("Staff {0} is at capacity")]
    StaffAtCapacity(String),

    #[error("Staff {0} is not available")]
    StaffUnavailable(String),

    #[error("Order {0} is completed or cancelled")]
    OrderInTerminalState(String),

    #[error("Order {order_id} is already assigned to {staff_id}")]
    OrderAlreadyAssigned { order_id: String, staff_id: String },

    #[error("Order {order_id} is already assigned to {staff_id}")]
    OrderAlreadyAssignedToTarget { order_id: String, staff_id: String },

    #[error("Order {0} is not assigned")]
    OrderNotAssigned(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order already exists: {0}")]
    OrderAlreadyExists(String),

    #[error("Order {order_id} is not assigned to {staff_id}")]
    NotAssignee { order_id: String, staff_id: String },

    #[error("Staff not found: {0}")]
    StaffNotFound(String),

    #[error("Staff already exists: {0}")]
    StaffAlreadyExists(String),

    #[error("Staff {staff_id} still has {count} active order(s)")]
    StaffHasActiveOrders { staff_id: String, count: u32 },

    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Invalid hotel/branch id: {0}")]
    InvalidScope(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<redb::TransactionError> for AssignError {
    fn from(err: redb::TransactionError) -> Self {
        Self::Storage(err.into())
    }
}

impl From<redb::CommitError> for AssignError {
    fn from(err: redb::CommitError) -> Self {
        Self::Storage(err.into())
    }
}

pub type AssignResult<T> = Result<T, AssignError>;

/// Reject ids that would break `{hotel_id}:{branch_id}` keys
pub(crate) fn ensure_scope_id(value: &str) -> AssignResult<()> {
    if shared::models::is_valid_scope_id(value) {
        Ok(())
    } else {
        Err(AssignError::InvalidScope(value.to_string()))
    }
}

pub(crate) fn ensure_scope(scope: &BranchScope) -> AssignResult<()> {
    ensure_scope_id(&scope.hotel_id)?;
    ensure_scope_id(&scope.branch_id)
}

/// 将存储错误转换为错误码
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    if matches!(e, StorageError::Serialization(_)) {
        return ErrorCode::InternalError;
    }

    // redb 错误通过字符串匹配分类
    let err_str = e.to_string().to_lowercase();

    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::StorageFull;
    }

    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }

    ErrorCode::DatabaseError
}

impl AssignError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoEligibleStaff(_) => ErrorCode::NoEligibleStaff,
            Self::CapacityExceeded(_) => ErrorCode::CapacityExceeded,
            Self::StaffNotInBranch { .. } => ErrorCode::StaffNotInBranch,
            Self::StaffAtCapacity(_) => ErrorCode::StaffAtCapacity,
            Self::StaffUnavailable(_) => ErrorCode::StaffUnavailable,
            Self::OrderInTerminalState(_) => ErrorCode::OrderInTerminalState,
            Self::OrderAlreadyAssigned { .. } => ErrorCode::OrderAlreadyAssigned,
            Self::OrderAlreadyAssignedToTarget { .. } => ErrorCode::OrderAlreadyAssignedToTarget,
            Self::OrderNotAssigned(_) => ErrorCode::OrderNotAssigned,
            Self::OrderNotFound(_) => ErrorCode::OrderNotFound,
            Self::OrderAlreadyExists(_) => ErrorCode::AlreadyExists,
            Self::NotAssignee { .. } => ErrorCode::PermissionDenied,
            Self::StaffNotFound(_) => ErrorCode::StaffNotFound,
            Self::StaffAlreadyExists(_) => ErrorCode::AlreadyExists,
            Self::StaffHasActiveOrders { .. } => ErrorCode::StaffHasActiveOrders,
            Self::InvalidStatusTransition { .. } => ErrorCode::InvalidStatusTransition,
            Self::InvalidScope(_) => ErrorCode::ValidationFailed,
            Self::Storage(e) => classify_storage_error(e),
        }
    }
}

impl From<AssignError> for AppError {
    fn from(err: AssignError) -> Self {
        let code = err.code();
        match &err {
            AssignError::Storage(e) => {
                tracing::error!(error = %e, error_code = %code, "Storage error occurred");
                AppError::new(code)
            }
            AssignError::NoEligibleStaff(scope) => {
                AppError::with_message(code, err.to_string()).with_detail("scope", scope.as_str())
            }
            AssignError::StaffNotInBranch { staff_id, scope } => {
                AppError::with_message(code, err.to_string())
                    .with_detail("staff_id", staff_id.as_str())
                    .with_detail("scope", scope.as_str())
            }
            AssignError::StaffHasActiveOrders { count, .. } => {
                AppError::with_message(code, err.to_string()).with_detail("active_orders", *count)
            }
            _ => AppError::with_message(code, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AssignError::NoEligibleStaff("h1:b1".into()).code(),
            ErrorCode::NoEligibleStaff
        );
        assert_eq!(
            AssignError::StaffAtCapacity("s1".into()).code(),
            ErrorCode::StaffAtCapacity
        );
        assert_eq!(
            AssignError::Storage(StorageError::Serialization(
                serde_json::from_str::<u32>("x").unwrap_err()
            ))
            .code(),
            ErrorCode::InternalError
        );
    }

    #[test]
    fn test_into_app_error_keeps_details() {
        let err: AppError = AssignError::StaffNotInBranch {
            staff_id: "s9".into(),
            scope: "h1:b1".into(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::StaffNotInBranch);
        let details = err.details.unwrap();
        assert_eq!(details.get("staff_id").unwrap(), "s9");
        assert_eq!(details.get("scope").unwrap(), "h1:b1");
    }
}
