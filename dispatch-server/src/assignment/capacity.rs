//! Capacity Tracker - 员工在手订单计数
//!
//! 计数器持久化在 `staff` 表中，是资格判断的唯一来源，从不通过扫描订单重算。
//!
//! | 操作 | 结果 |
//! |------|------|
//! | `increment` | +1；已满返回 `CapacityExceeded`，不可用返回 `StaffUnavailable` |
//! | `decrement` | -1，下限为 0；对 0 递减记录告警并返回 0 |
//!
//! `*_in` 变体在调用方的写事务中执行，以便与指针、订单写入一同提交。

use redb::WriteTransaction;
use shared::models::Staff;

use super::error::{AssignError, AssignResult};
use super::storage::DispatchStorage;

#[derive(Debug, Clone)]
pub struct CapacityTracker {
    storage: DispatchStorage,
}

impl CapacityTracker {
    pub fn new(storage: DispatchStorage) -> Self {
        Self { storage }
    }

    /// Active, available and below capacity
    pub fn can_accept_order(&self, staff_id: &str) -> AssignResult<bool> {
        let staff = self
            .storage
            .get_staff(staff_id)?
            .ok_or_else(|| AssignError::StaffNotFound(staff_id.to_string()))?;
        Ok(staff.can_accept_order())
    }

    /// Current counter value
    pub fn active_count(&self, staff_id: &str) -> AssignResult<u32> {
        let staff = self
            .storage
            .get_staff(staff_id)?
            .ok_or_else(|| AssignError::StaffNotFound(staff_id.to_string()))?;
        Ok(staff.active_order_count)
    }

    pub fn increment(&self, staff_id: &str) -> AssignResult<u32> {
        let txn = self.storage.begin_write()?;
        let staff = self.increment_in(&txn, staff_id, shared::util::now_millis())?;
        txn.commit()?;
        Ok(staff.active_order_count)
    }

    pub fn decrement(&self, staff_id: &str) -> AssignResult<u32> {
        let txn = self.storage.begin_write()?;
        let count = self.decrement_in(&txn, staff_id, shared::util::now_millis())?;
        txn.commit()?;
        Ok(count)
    }

    /// +1 inside `txn`; returns the updated staff record
    pub fn increment_in(
        &self,
        txn: &WriteTransaction,
        staff_id: &str,
        now: i64,
    ) -> AssignResult<Staff> {
        let mut staff = self
            .storage
            .get_staff_txn(txn, staff_id)?
            .ok_or_else(|| AssignError::StaffNotFound(staff_id.to_string()))?;

        if !staff.is_active || !staff.is_available {
            return Err(AssignError::StaffUnavailable(staff_id.to_string()));
        }
        if !staff.has_spare_capacity() {
            return Err(AssignError::CapacityExceeded(staff_id.to_string()));
        }

        staff.active_order_count += 1;
        staff.updated_at = now;
        self.storage.put_staff(txn, &staff)?;

        tracing::debug!(
            staff_id = %staff_id,
            active = staff.active_order_count,
            max = staff.max_orders_capacity,
            "Capacity incremented"
        );
        Ok(staff)
    }

    /// -1 inside `txn`, floored at zero; returns the new count
    pub fn decrement_in(
        &self,
        txn: &WriteTransaction,
        staff_id: &str,
        now: i64,
    ) -> AssignResult<u32> {
        let Some(mut staff) = self.storage.get_staff_txn(txn, staff_id)? else {
            tracing::warn!(staff_id = %staff_id, "Decrement for unknown staff ignored");
            return Ok(0);
        };

        if staff.active_order_count == 0 {
            tracing::warn!(staff_id = %staff_id, "Capacity counter already zero, decrement ignored");
            return Ok(0);
        }

        staff.active_order_count -= 1;
        staff.updated_at = now;
        self.storage.put_staff(txn, &staff)?;

        tracing::debug!(
            staff_id = %staff_id,
            active = staff.active_order_count,
            "Capacity decremented"
        );
        Ok(staff.active_order_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::StaffRole;

    fn create_test_tracker(staff: &[(&str, u32, u32)]) -> (DispatchStorage, CapacityTracker) {
        let storage = DispatchStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        for (id, count, max) in staff {
            let s = Staff {
                id: id.to_string(),
                hotel_id: "h1".into(),
                branch_id: "b1".into(),
                name: id.to_string(),
                role: StaffRole::Waiter,
                active_order_count: *count,
                max_orders_capacity: *max,
                is_available: true,
                is_active: true,
                created_at: 0,
                updated_at: 0,
            };
            storage.put_staff(&txn, &s).unwrap();
        }
        txn.commit().unwrap();
        let tracker = CapacityTracker::new(storage.clone());
        (storage, tracker)
    }

    #[test]
    fn test_increment_until_full() {
        let (_storage, tracker) = create_test_tracker(&[("a", 0, 2)]);

        assert_eq!(tracker.increment("a").unwrap(), 1);
        assert_eq!(tracker.increment("a").unwrap(), 2);
        assert!(!tracker.can_accept_order("a").unwrap());

        let err = tracker.increment("a").unwrap_err();
        assert!(matches!(err, AssignError::CapacityExceeded(_)));
        assert_eq!(tracker.active_count("a").unwrap(), 2);
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let (_storage, tracker) = create_test_tracker(&[("a", 1, 5)]);

        assert_eq!(tracker.decrement("a").unwrap(), 0);
        assert_eq!(tracker.decrement("a").unwrap(), 0);
        assert_eq!(tracker.active_count("a").unwrap(), 0);
    }

    #[test]
    fn test_unavailable_staff_rejected() {
        let (storage, tracker) = create_test_tracker(&[("a", 0, 5)]);

        let txn = storage.begin_write().unwrap();
        let mut staff = storage.get_staff_txn(&txn, "a").unwrap().unwrap();
        staff.is_available = false;
        storage.put_staff(&txn, &staff).unwrap();
        txn.commit().unwrap();

        assert!(!tracker.can_accept_order("a").unwrap());
        let err = tracker.increment("a").unwrap_err();
        assert!(matches!(err, AssignError::StaffUnavailable(_)));
        assert_eq!(tracker.active_count("a").unwrap(), 0);
    }

    #[test]
    fn test_unknown_staff() {
        let (_storage, tracker) = create_test_tracker(&[]);

        assert!(matches!(
            tracker.can_accept_order("ghost"),
            Err(AssignError::StaffNotFound(_))
        ));
        assert_eq!(tracker.decrement("ghost").unwrap(), 0);
    }

    #[test]
    fn test_failed_increment_rolls_back_with_transaction() {
        let (storage, tracker) = create_test_tracker(&[("a", 0, 5), ("b", 1, 1)]);

        let txn = storage.begin_write().unwrap();
        tracker.increment_in(&txn, "a", 1).unwrap();
        assert!(tracker.increment_in(&txn, "b", 1).is_err());
        drop(txn);

        assert_eq!(tracker.active_count("a").unwrap(), 0);
        assert_eq!(tracker.active_count("b").unwrap(), 1);
    }
}
