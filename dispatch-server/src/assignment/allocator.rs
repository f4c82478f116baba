//! Round-Robin Allocator
//!
//! 每个 (hotel, branch) 一个轮询指针。名册 = 分店在职 waiter，按
//! `(created_at, id)` 稳定排序。从指针之后一位开始环形扫描一圈，
//! 第一个 `can_accept_order` 的员工获得订单。
//!
//! ```text
//! roster:  [A] [B] [C] [D]
//! pointer:      ^ (last = B)
//! scan:             C → D → A → B
//! ```
//!
//! 指针记录的员工已不在名册时，从 `last_index % len` 继续（不报错）。

use redb::WriteTransaction;
use serde::Serialize;
use shared::models::{BranchScope, PointerRecord, Staff};

use super::capacity::CapacityTracker;
use super::error::{AssignError, AssignResult, ensure_scope, ensure_scope_id};
use super::storage::DispatchStorage;

/// 指针重置范围
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ResetTarget {
    All,
    Hotel { hotel_id: String },
    Branch { hotel_id: String, branch_id: String },
}

impl std::fmt::Display for ResetTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Hotel { hotel_id } => write!(f, "{}:*", hotel_id),
            Self::Branch {
                hotel_id,
                branch_id,
            } => write!(f, "{}:{}", hotel_id, branch_id),
        }
    }
}

/// Round-robin roster: active waiters in stable order
pub fn build_roster(staff: Vec<Staff>) -> Vec<Staff> {
    let mut roster: Vec<Staff> = staff
        .into_iter()
        .filter(|s| s.is_active && s.role.takes_round_robin())
        .collect();
    roster.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    roster
}

/// Index where the circular scan starts
pub fn scan_start(roster: &[Staff], pointer: Option<&PointerRecord>) -> usize {
    let len = roster.len();
    if len == 0 {
        return 0;
    }
    match pointer {
        None => 0,
        Some(p) => match roster.iter().position(|s| s.id == p.last_staff_id) {
            Some(pos) => (pos + 1) % len,
            None => p.last_index % len,
        },
    }
}

/// First eligible candidate in one circular pass
pub fn select_candidate(roster: &[Staff], pointer: Option<&PointerRecord>) -> Option<usize> {
    let len = roster.len();
    let start = scan_start(roster, pointer);
    (0..len)
        .map(|offset| (start + offset) % len)
        .find(|&idx| roster[idx].can_accept_order())
}

#[derive(Debug, Clone)]
pub struct RoundRobinAllocator {
    storage: DispatchStorage,
    capacity: CapacityTracker,
}

impl RoundRobinAllocator {
    pub fn new(storage: DispatchStorage, capacity: CapacityTracker) -> Self {
        Self { storage, capacity }
    }

    /// Pick the next eligible waiter, increment its counter and move the pointer.
    ///
    /// Runs inside `txn`; nothing is visible until the caller commits.
    pub fn allocate_in(
        &self,
        txn: &WriteTransaction,
        scope: &BranchScope,
        now: i64,
    ) -> AssignResult<Staff> {
        let roster = build_roster(self.storage.list_branch_staff_txn(txn, scope)?);
        let pointer = self.storage.get_pointer_txn(txn, scope)?;

        let Some(index) = select_candidate(&roster, pointer.as_ref()) else {
            tracing::info!(
                scope = %scope,
                roster = roster.len(),
                "No eligible staff for automatic assignment"
            );
            return Err(AssignError::NoEligibleStaff(scope.key()));
        };

        let staff = self.capacity.increment_in(txn, &roster[index].id, now)?;

        self.storage.put_pointer(
            txn,
            &PointerRecord {
                hotel_id: scope.hotel_id.clone(),
                branch_id: scope.branch_id.clone(),
                last_staff_id: staff.id.clone(),
                last_index: index,
                updated_at: now,
            },
        )?;

        tracing::debug!(scope = %scope, staff_id = %staff.id, index, "Round-robin pointer moved");
        Ok(staff)
    }

    pub fn pointer(&self, scope: &BranchScope) -> AssignResult<Option<PointerRecord>> {
        Ok(self.storage.get_pointer(scope)?)
    }

    pub fn list_pointers(&self, hotel_id: Option<&str>) -> AssignResult<Vec<PointerRecord>> {
        if let Some(hotel_id) = hotel_id {
            ensure_scope_id(hotel_id)?;
        }
        let prefix = hotel_id.map(BranchScope::hotel_prefix);
        Ok(self.storage.list_pointers(prefix.as_deref())?)
    }

    /// Clear pointers in `target`; returns how many were removed
    pub fn reset(&self, target: &ResetTarget) -> AssignResult<usize> {
        let txn = self.storage.begin_write()?;
        let cleared = self.reset_in(&txn, target)?;
        txn.commit()?;

        tracing::info!(target = %target, cleared, "Round-robin pointers reset");
        Ok(cleared)
    }

    pub fn reset_in(&self, txn: &WriteTransaction, target: &ResetTarget) -> AssignResult<usize> {
        let cleared = match target {
            ResetTarget::All => self.storage.clear_pointers(txn, None)?,
            ResetTarget::Hotel { hotel_id } => {
                ensure_scope_id(hotel_id)?;
                let prefix = BranchScope::hotel_prefix(hotel_id);
                self.storage.clear_pointers(txn, Some(&prefix))?
            }
            ResetTarget::Branch {
                hotel_id,
                branch_id,
            } => {
                let scope = BranchScope::new(hotel_id, branch_id);
                ensure_scope(&scope)?;
                usize::from(self.storage.remove_pointer(txn, &scope)?)
            }
        };
        Ok(cleared)
    }
}
