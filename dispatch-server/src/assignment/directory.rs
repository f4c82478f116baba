//! Staff directory - 分店名册维护
//!
//! 名册每次分配决策都从存储重新读取。这里只修改身份和资格字段，
//! `active_order_count` 由 [`CapacityTracker`](super::capacity::CapacityTracker) 独占。

use shared::models::{BranchScope, Staff, StaffCreate, StaffUpdate};

use super::error::{AssignError, AssignResult, ensure_scope_id};
use super::storage::DispatchStorage;

#[derive(Debug, Clone)]
pub struct StaffDirectory {
    storage: DispatchStorage,
    default_capacity: u32,
}

impl StaffDirectory {
    pub fn new(storage: DispatchStorage, default_capacity: u32) -> Self {
        Self {
            storage,
            default_capacity,
        }
    }

    pub fn get(&self, staff_id: &str) -> AssignResult<Staff> {
        self.storage
            .get_staff(staff_id)?
            .ok_or_else(|| AssignError::StaffNotFound(staff_id.to_string()))
    }

    /// Branch roster ordered by `(created_at, id)`
    pub fn list(&self, scope: &BranchScope) -> AssignResult<Vec<Staff>> {
        let mut staff = self.storage.list_branch_staff(scope)?;
        staff.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(staff)
    }

    pub fn create(&self, req: StaffCreate) -> AssignResult<Staff> {
        ensure_scope_id(&req.hotel_id)?;
        ensure_scope_id(&req.branch_id)?;
        let now = shared::util::now_millis();
        let id = req.id.unwrap_or_else(shared::util::new_id);

        let txn = self.storage.begin_write()?;
        if self.storage.get_staff_txn(&txn, &id)?.is_some() {
            return Err(AssignError::StaffAlreadyExists(id));
        }
        let staff = Staff {
            id,
            hotel_id: req.hotel_id,
            branch_id: req.branch_id,
            name: req.name,
            role: req.role,
            active_order_count: 0,
            max_orders_capacity: req.max_orders_capacity.unwrap_or(self.default_capacity),
            is_available: req.is_available.unwrap_or(true),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.storage.put_staff(&txn, &staff)?;
        txn.commit()?;

        tracing::info!(staff_id = %staff.id, scope = %staff.scope(), role = %staff.role, "Staff created");
        Ok(staff)
    }

    pub fn update(&self, staff_id: &str, req: StaffUpdate) -> AssignResult<Staff> {
        let txn = self.storage.begin_write()?;
        let mut staff = self
            .storage
            .get_staff_txn(&txn, staff_id)?
            .ok_or_else(|| AssignError::StaffNotFound(staff_id.to_string()))?;

        if let Some(name) = req.name {
            staff.name = name;
        }
        if let Some(role) = req.role {
            staff.role = role;
        }
        if let Some(max) = req.max_orders_capacity {
            // Lowering below the current count only blocks new assignments
            staff.max_orders_capacity = max;
        }
        if let Some(available) = req.is_available {
            staff.is_available = available;
        }
        if let Some(active) = req.is_active {
            staff.is_active = active;
        }
        staff.updated_at = shared::util::now_millis();
        self.storage.put_staff(&txn, &staff)?;
        txn.commit()?;

        tracing::info!(staff_id = %staff_id, "Staff updated");
        Ok(staff)
    }

    pub fn set_availability(&self, staff_id: &str, is_available: bool) -> AssignResult<Staff> {
        self.update(
            staff_id,
            StaffUpdate {
                is_available: Some(is_available),
                ..Default::default()
            },
        )
    }

    /// Refused while the staff member still holds active orders
    pub fn remove(&self, staff_id: &str) -> AssignResult<Staff> {
        let txn = self.storage.begin_write()?;
        let staff = self
            .storage
            .get_staff_txn(&txn, staff_id)?
            .ok_or_else(|| AssignError::StaffNotFound(staff_id.to_string()))?;

        if staff.active_order_count > 0 {
            return Err(AssignError::StaffHasActiveOrders {
                staff_id: staff_id.to_string(),
                count: staff.active_order_count,
            });
        }
        self.storage.remove_staff(&txn, staff_id)?;
        txn.commit()?;

        tracing::info!(staff_id = %staff_id, scope = %staff.scope(), "Staff removed");
        Ok(staff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::StaffRole;

    fn create_test_directory() -> StaffDirectory {
        StaffDirectory::new(DispatchStorage::open_in_memory().unwrap(), 20)
    }

    fn waiter(id: &str) -> StaffCreate {
        StaffCreate {
            id: Some(id.to_string()),
            hotel_id: "h1".into(),
            branch_id: "b1".into(),
            name: format!("Waiter {}", id),
            role: StaffRole::Waiter,
            max_orders_capacity: None,
            is_available: None,
        }
    }

    #[test]
    fn test_create_applies_defaults() {
        let directory = create_test_directory();
        let staff = directory.create(waiter("a")).unwrap();

        assert_eq!(staff.max_orders_capacity, 20);
        assert_eq!(staff.active_order_count, 0);
        assert!(staff.is_available && staff.is_active);

        let err = directory.create(waiter("a")).unwrap_err();
        assert!(matches!(err, AssignError::StaffAlreadyExists(_)));
    }

    #[test]
    fn test_generated_id() {
        let directory = create_test_directory();
        let mut req = waiter("x");
        req.id = None;
        let staff = directory.create(req).unwrap();
        assert!(!staff.id.is_empty());
        assert_eq!(directory.get(&staff.id).unwrap(), staff);
    }

    #[test]
    fn test_update_and_availability() {
        let directory = create_test_directory();
        directory.create(waiter("a")).unwrap();

        let updated = directory
            .update(
                "a",
                StaffUpdate {
                    name: Some("Asha".into()),
                    max_orders_capacity: Some(3),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Asha");
        assert_eq!(updated.max_orders_capacity, 3);

        let off = directory.set_availability("a", false).unwrap();
        assert!(!off.is_available);
        assert!(!off.can_accept_order());
    }

    #[test]
    fn test_remove_refused_with_active_orders() {
        let directory = create_test_directory();
        let storage = directory.storage.clone();
        directory.create(waiter("a")).unwrap();

        let txn = storage.begin_write().unwrap();
        let mut staff = storage.get_staff_txn(&txn, "a").unwrap().unwrap();
        staff.active_order_count = 2;
        storage.put_staff(&txn, &staff).unwrap();
        txn.commit().unwrap();

        let err = directory.remove("a").unwrap_err();
        assert!(matches!(err, AssignError::StaffHasActiveOrders { count: 2, .. }));
        assert!(directory.get("a").is_ok());
    }

    #[test]
    fn test_list_is_branch_scoped() {
        let directory = create_test_directory();
        directory.create(waiter("a")).unwrap();
        directory.create(waiter("b")).unwrap();
        let mut other = waiter("c");
        other.branch_id = "b2".into();
        directory.create(other).unwrap();

        let roster = directory.list(&BranchScope::new("h1", "b1")).unwrap();
        assert_eq!(roster.len(), 2);
        directory.remove("a").unwrap();
        assert_eq!(directory.list(&BranchScope::new("h1", "b1")).unwrap().len(), 1);
    }
}
