//! 事件 → 接收者路由表
//!
//! | 事件 | 被指派员工 | 原员工 | 分店管理者 | 分店频道 |
//! |------|:---:|:---:|:---:|:---:|
//! | assigned | ✔ | | ✔ | ✔ |
//! | removed | | ✔ | ✔ | |
//! | viewed | | | ✔ | |
//! | status_changed | ✔ | | ✔ | ✔ |
//! | completed | ✔ | | ✔ | ✔ |
//! | cancelled | ✔ | | ✔ | ✔ |

use shared::message::{DispatchEventKind, NotificationPayload, branch_channel, manager_channel, staff_channel};
use shared::models::Staff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Assignee,
    PreviousAssignee,
    BranchManagers,
    Branch,
}

const ASSIGNEE_MANAGERS_BRANCH: &[Recipient] = &[
    Recipient::Assignee,
    Recipient::BranchManagers,
    Recipient::Branch,
];

pub fn recipients(event: DispatchEventKind) -> &'static [Recipient] {
    match event {
        DispatchEventKind::Assigned => ASSIGNEE_MANAGERS_BRANCH,
        DispatchEventKind::Removed => &[Recipient::PreviousAssignee, Recipient::BranchManagers],
        DispatchEventKind::Viewed => &[Recipient::BranchManagers],
        DispatchEventKind::StatusChanged
        | DispatchEventKind::Completed
        | DispatchEventKind::Cancelled => ASSIGNEE_MANAGERS_BRANCH,
    }
}

/// Resolve concrete channel keys for `payload`.
///
/// `branch_staff` is the branch roster; only active manager/branch_admin
/// members receive `manager:{id}` messages. Recipients without an id
/// (e.g. no assignee) are skipped.
pub fn resolve_channels(payload: &NotificationPayload, branch_staff: &[Staff]) -> Vec<String> {
    let mut channels = Vec::new();
    for recipient in recipients(payload.event) {
        match recipient {
            Recipient::Assignee => {
                if let Some(id) = &payload.staff_id {
                    channels.push(staff_channel(id));
                }
            }
            Recipient::PreviousAssignee => {
                if let Some(id) = &payload.previous_staff_id {
                    channels.push(staff_channel(id));
                }
            }
            Recipient::BranchManagers => {
                channels.extend(
                    branch_staff
                        .iter()
                        .filter(|s| s.is_active && s.role.is_branch_manager())
                        .map(|s| manager_channel(&s.id)),
                );
            }
            Recipient::Branch => {
                channels.push(branch_channel(&payload.hotel_id, &payload.branch_id));
            }
        }
    }
    channels
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{Actor, OrderStatus, StaffRole};

    fn payload(event: DispatchEventKind, staff: Option<&str>, previous: Option<&str>) -> NotificationPayload {
        NotificationPayload {
            event,
            order_id: "o1".into(),
            hotel_id: "h1".into(),
            branch_id: "b1".into(),
            table_id: None,
            staff_id: staff.map(String::from),
            previous_staff_id: previous.map(String::from),
            status: OrderStatus::Pending,
            actor: Actor::System,
            reason: None,
            at: 0,
        }
    }

    fn member(id: &str, role: StaffRole, active: bool) -> Staff {
        Staff {
            id: id.into(),
            hotel_id: "h1".into(),
            branch_id: "b1".into(),
            name: id.into(),
            role,
            active_order_count: 0,
            max_orders_capacity: 20,
            is_available: true,
            is_active: active,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn roster() -> Vec<Staff> {
        vec![
            member("w1", StaffRole::Waiter, true),
            member("m1", StaffRole::Manager, true),
            member("m2", StaffRole::BranchAdmin, true),
            member("m3", StaffRole::Manager, false),
        ]
    }

    #[test]
    fn test_assigned_routes() {
        let channels = resolve_channels(&payload(DispatchEventKind::Assigned, Some("w1"), None), &roster());
        assert_eq!(
            channels,
            vec!["staff:w1", "manager:m1", "manager:m2", "branch:h1:b1"]
        );
    }

    #[test]
    fn test_removed_goes_to_previous_assignee() {
        let channels = resolve_channels(
            &payload(DispatchEventKind::Removed, Some("w2"), Some("w1")),
            &roster(),
        );
        assert_eq!(channels, vec!["staff:w1", "manager:m1", "manager:m2"]);
    }

    #[test]
    fn test_viewed_only_managers() {
        let channels = resolve_channels(&payload(DispatchEventKind::Viewed, Some("w1"), None), &roster());
        assert_eq!(channels, vec!["manager:m1", "manager:m2"]);
    }

    #[test]
    fn test_unassigned_order_skips_assignee() {
        let channels = resolve_channels(&payload(DispatchEventKind::Cancelled, None, None), &[]);
        assert_eq!(channels, vec!["branch:h1:b1"]);
    }
}
