//! Manual Override - 管理者手动指派 / 改派 / 取消指派
//!
//! 与自动路径相同的容量计数和通知，但 **不移动轮询指针**。
//!
//! | 操作 | 容量变化 | 通知 |
//! |------|---------|------|
//! | `manual_assign` | 目标 +1 | `assigned` |
//! | `reassign` | 原员工 -1，目标 +1 (同一事务) | `removed` + `assigned` |
//! | `unassign` | 原员工 -1 | `removed` |

use redb::WriteTransaction;
use shared::message::DispatchEventKind;
use shared::models::{Actor, AssignmentAction, AssignmentRecord, Order, Staff};

use super::engine::AssignmentEngine;
use super::error::{AssignError, AssignResult};

impl AssignmentEngine {
    /// Force-assign an unassigned order to `staff_id`
    pub fn manual_assign(
        &self,
        order_id: &str,
        staff_id: &str,
        actor: &Actor,
        reason: Option<&str>,
    ) -> AssignResult<Order> {
        let now = shared::util::now_millis();
        let txn = self.storage.begin_write()?;

        let mut order = self.load_open_order(&txn, order_id)?;
        if let Some(current) = &order.assigned_staff_id {
            if current == staff_id {
                return Err(AssignError::OrderAlreadyAssignedToTarget {
                    order_id: order_id.to_string(),
                    staff_id: staff_id.to_string(),
                });
            }
            return Err(AssignError::OrderAlreadyAssigned {
                order_id: order_id.to_string(),
                staff_id: current.clone(),
            });
        }

        self.check_target(&txn, &order, staff_id)?;
        self.capacity.increment_in(&txn, staff_id, now)?;

        record_assignment(&mut order, AssignmentAction::Assigned, staff_id, None, actor, reason, now);
        self.storage.put_order(&txn, &order)?;
        txn.commit()?;

        tracing::info!(
            order_id = %order_id,
            staff_id = %staff_id,
            actor = %actor,
            "Order assigned (manual)"
        );
        self.fanout
            .emit(DispatchEventKind::Assigned, &order, None, actor, reason);
        Ok(order)
    }

    /// Move an order to `new_staff_id`; one unit of capacity moves with it.
    ///
    /// An unassigned order is simply assigned.
    pub fn reassign(
        &self,
        order_id: &str,
        new_staff_id: &str,
        actor: &Actor,
        reason: Option<&str>,
    ) -> AssignResult<Order> {
        let now = shared::util::now_millis();
        let txn = self.storage.begin_write()?;

        let mut order = self.load_open_order(&txn, order_id)?;
        let previous = order.assigned_staff_id.clone();
        if previous.as_deref() == Some(new_staff_id) {
            return Err(AssignError::OrderAlreadyAssignedToTarget {
                order_id: order_id.to_string(),
                staff_id: new_staff_id.to_string(),
            });
        }

        self.check_target(&txn, &order, new_staff_id)?;
        if let Some(prev) = &previous {
            self.capacity.decrement_in(&txn, prev, now)?;
        }
        self.capacity.increment_in(&txn, new_staff_id, now)?;

        let action = if previous.is_some() {
            AssignmentAction::Reassigned
        } else {
            AssignmentAction::Assigned
        };
        record_assignment(
            &mut order,
            action,
            new_staff_id,
            previous.clone(),
            actor,
            reason,
            now,
        );
        self.storage.put_order(&txn, &order)?;
        txn.commit()?;

        tracing::info!(
            order_id = %order_id,
            from = ?previous,
            to = %new_staff_id,
            actor = %actor,
            "Order reassigned"
        );
        if let Some(prev) = &previous {
            self.fanout
                .emit(DispatchEventKind::Removed, &order, Some(prev), actor, reason);
        }
        self.fanout
            .emit(DispatchEventKind::Assigned, &order, previous.as_deref(), actor, reason);
        Ok(order)
    }

    /// Take an order away from its assignee and leave it unassigned
    pub fn unassign(&self, order_id: &str, actor: &Actor, reason: Option<&str>) -> AssignResult<Order> {
        let now = shared::util::now_millis();
        let txn = self.storage.begin_write()?;

        let mut order = self.load_open_order(&txn, order_id)?;
        let Some(previous) = order.assigned_staff_id.take() else {
            return Err(AssignError::OrderNotAssigned(order_id.to_string()));
        };

        self.capacity.decrement_in(&txn, &previous, now)?;

        order.assigned_at = None;
        order.acknowledged_at = None;
        order.updated_at = now;
        order.assignment_history.push(AssignmentRecord {
            action: AssignmentAction::Unassigned,
            staff_id: None,
            previous_staff_id: Some(previous.clone()),
            actor: actor.clone(),
            reason: reason.map(String::from),
            at: now,
        });
        self.storage.put_order(&txn, &order)?;
        txn.commit()?;

        tracing::info!(order_id = %order_id, staff_id = %previous, actor = %actor, "Order unassigned");
        self.fanout
            .emit(DispatchEventKind::Removed, &order, Some(&previous), actor, reason);
        Ok(order)
    }

    /// Target must be in the order's branch and able to take one more order
    fn check_target(&self, txn: &WriteTransaction, order: &Order, staff_id: &str) -> AssignResult<Staff> {
        let staff = self
            .storage
            .get_staff_txn(txn, staff_id)?
            .ok_or_else(|| AssignError::StaffNotFound(staff_id.to_string()))?;

        if !staff.belongs_to(&order.scope()) {
            return Err(AssignError::StaffNotInBranch {
                staff_id: staff_id.to_string(),
                scope: order.scope().key(),
            });
        }
        if !staff.is_active || !staff.is_available {
            return Err(AssignError::StaffUnavailable(staff_id.to_string()));
        }
        if !staff.has_spare_capacity() {
            return Err(AssignError::StaffAtCapacity(staff_id.to_string()));
        }
        Ok(staff)
    }
}

fn record_assignment(
    order: &mut Order,
    action: AssignmentAction,
    staff_id: &str,
    previous_staff_id: Option<String>,
    actor: &Actor,
    reason: Option<&str>,
    now: i64,
) {
    order.assigned_staff_id = Some(staff_id.to_string());
    order.assigned_at = Some(now);
    order.acknowledged_at = None;
    order.updated_at = now;
    order.assignment_history.push(AssignmentRecord {
        action,
        staff_id: Some(staff_id.to_string()),
        previous_staff_id,
        actor: actor.clone(),
        reason: reason.map(String::from),
        at: now,
    });
}
