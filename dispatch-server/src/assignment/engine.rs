//! AssignmentEngine - 订单分配编排
//!
//! # 自动分配流程
//!
//! ```text
//! assign(order_id)
//!     ├─ 1. Begin write transaction
//!     ├─ 2. Load order (must be non-terminal, unassigned)
//!     ├─ 3. RoundRobinAllocator::allocate_in (roster → pointer → scan → increment)
//!     ├─ 4. Write assignment + history onto the order
//!     ├─ 5. Commit
//!     └─ 6. Fan-out `assigned` (best-effort, after commit)
//! ```
//!
//! 任一步失败时事务被丢弃，不产生任何状态变更。

use redb::WriteTransaction;
use shared::message::DispatchEventKind;
use shared::models::{
    Actor, AssignmentAction, AssignmentRecord, BranchScope, Order, OrderStatus,
};

use super::allocator::RoundRobinAllocator;
use super::capacity::CapacityTracker;
use super::error::{AssignError, AssignResult, ensure_scope};
use super::storage::DispatchStorage;
use crate::notify::NotificationFanout;

#[derive(Debug, Clone)]
pub struct AssignmentEngine {
    pub(super) storage: DispatchStorage,
    pub(super) capacity: CapacityTracker,
    pub(super) allocator: RoundRobinAllocator,
    pub(super) fanout: NotificationFanout,
}

impl AssignmentEngine {
    pub fn new(storage: DispatchStorage, fanout: NotificationFanout) -> Self {
        let capacity = CapacityTracker::new(storage.clone());
        let allocator = RoundRobinAllocator::new(storage.clone(), capacity.clone());
        Self {
            storage,
            capacity,
            allocator,
            fanout,
        }
    }

    pub fn storage(&self) -> &DispatchStorage {
        &self.storage
    }

    pub fn capacity(&self) -> &CapacityTracker {
        &self.capacity
    }

    pub fn allocator(&self) -> &RoundRobinAllocator {
        &self.allocator
    }

    pub fn get_order(&self, order_id: &str) -> AssignResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or_else(|| AssignError::OrderNotFound(order_id.to_string()))
    }

    /// Store a new pending order without assigning it
    pub fn create_order(
        &self,
        order_id: &str,
        scope: &BranchScope,
        table_id: Option<String>,
    ) -> AssignResult<Order> {
        ensure_scope(scope)?;
        let txn = self.storage.begin_write()?;
        if self.storage.get_order_txn(&txn, order_id)?.is_some() {
            return Err(AssignError::OrderAlreadyExists(order_id.to_string()));
        }
        let order = Order::new(order_id, scope, table_id, shared::util::now_millis());
        self.storage.put_order(&txn, &order)?;
        txn.commit()?;

        tracing::info!(order_id = %order_id, scope = %scope, "Order created");
        Ok(order)
    }

    /// Automatic round-robin assignment
    pub fn assign(&self, order_id: &str) -> AssignResult<Order> {
        let now = shared::util::now_millis();
        let txn = self.storage.begin_write()?;

        let mut order = self.load_open_order(&txn, order_id)?;
        if let Some(current) = &order.assigned_staff_id {
            return Err(AssignError::OrderAlreadyAssigned {
                order_id: order_id.to_string(),
                staff_id: current.clone(),
            });
        }

        let staff = self.allocator.allocate_in(&txn, &order.scope(), now)?;

        order.assigned_staff_id = Some(staff.id.clone());
        order.assigned_at = Some(now);
        order.acknowledged_at = None;
        order.updated_at = now;
        order.assignment_history.push(AssignmentRecord {
            action: AssignmentAction::Assigned,
            staff_id: Some(staff.id.clone()),
            previous_staff_id: None,
            actor: Actor::System,
            reason: None,
            at: now,
        });
        self.storage.put_order(&txn, &order)?;
        txn.commit()?;

        tracing::info!(
            order_id = %order_id,
            staff_id = %staff.id,
            active = staff.active_order_count,
            max = staff.max_orders_capacity,
            "Order assigned (round-robin)"
        );
        self.fanout
            .emit(DispatchEventKind::Assigned, &order, None, &Actor::System, None);
        Ok(order)
    }

    /// Completion releases the assignee's capacity
    pub fn on_order_completed(&self, order_id: &str, actor: &Actor) -> AssignResult<Order> {
        self.update_status(order_id, OrderStatus::Completed, actor, None)
    }

    /// Cancellation releases the assignee's capacity
    pub fn on_order_cancelled(
        &self,
        order_id: &str,
        actor: &Actor,
        reason: Option<&str>,
    ) -> AssignResult<Order> {
        self.update_status(order_id, OrderStatus::Cancelled, actor, reason)
    }

    /// Lifecycle transition; entering a terminal state decrements the assignee's counter
    pub fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        actor: &Actor,
        reason: Option<&str>,
    ) -> AssignResult<Order> {
        let now = shared::util::now_millis();
        let txn = self.storage.begin_write()?;

        let mut order = self.load_open_order(&txn, order_id)?;
        if !order.status.can_transition_to(status) {
            return Err(AssignError::InvalidStatusTransition {
                order_id: order_id.to_string(),
                from: order.status,
                to: status,
            });
        }

        if status.is_terminal()
            && let Some(staff_id) = &order.assigned_staff_id
        {
            self.capacity.decrement_in(&txn, staff_id, now)?;
        }

        let from = order.status;
        order.status = status;
        order.updated_at = now;
        self.storage.put_order(&txn, &order)?;
        txn.commit()?;

        tracing::info!(order_id = %order_id, from = %from, to = %status, actor = %actor, "Order status changed");

        let event = match status {
            OrderStatus::Completed => DispatchEventKind::Completed,
            OrderStatus::Cancelled => DispatchEventKind::Cancelled,
            _ => DispatchEventKind::StatusChanged,
        };
        self.fanout.emit(event, &order, None, actor, reason);
        Ok(order)
    }

    /// The assignee acknowledges the order; repeated calls are no-ops
    pub fn mark_viewed(&self, order_id: &str, staff_id: &str) -> AssignResult<Order> {
        let now = shared::util::now_millis();
        let txn = self.storage.begin_write()?;

        let mut order = self.load_open_order(&txn, order_id)?;
        match order.assigned_staff_id.as_deref() {
            None => return Err(AssignError::OrderNotAssigned(order_id.to_string())),
            Some(current) if current != staff_id => {
                return Err(AssignError::NotAssignee {
                    order_id: order_id.to_string(),
                    staff_id: staff_id.to_string(),
                });
            }
            Some(_) => {}
        }
        if order.acknowledged_at.is_some() {
            return Ok(order);
        }

        order.acknowledged_at = Some(now);
        order.updated_at = now;
        self.storage.put_order(&txn, &order)?;
        txn.commit()?;

        tracing::info!(order_id = %order_id, staff_id = %staff_id, "Order viewed");
        let actor = Actor::user(staff_id, "staff");
        self.fanout
            .emit(DispatchEventKind::Viewed, &order, None, &actor, None);
        Ok(order)
    }

    /// Load an order that is neither completed nor cancelled
    pub(super) fn load_open_order(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> AssignResult<Order> {
        let order = self
            .storage
            .get_order_txn(txn, order_id)?
            .ok_or_else(|| AssignError::OrderNotFound(order_id.to_string()))?;
        if order.is_terminal() {
            return Err(AssignError::OrderInTerminalState(order_id.to_string()));
        }
        Ok(order)
    }
}
