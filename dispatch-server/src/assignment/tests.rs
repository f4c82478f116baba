//! 分配引擎端到端测试 (redb InMemoryBackend)

use shared::message::{DispatchEventKind, NotificationPayload};
use shared::models::{
    Actor, AssignmentAction, BranchScope, OrderStatus, Staff, StaffRole,
};
use tokio::sync::mpsc;

use super::*;
use crate::notify::NotificationFanout;

fn scope() -> BranchScope {
    BranchScope::new("h1", "b1")
}

fn manager() -> Actor {
    Actor::user("m1", "manager")
}

fn waiter(id: &str, created_at: i64, max: u32) -> Staff {
    Staff {
        id: id.to_string(),
        hotel_id: "h1".into(),
        branch_id: "b1".into(),
        name: id.to_uppercase(),
        role: StaffRole::Waiter,
        active_order_count: 0,
        max_orders_capacity: max,
        is_available: true,
        is_active: true,
        created_at,
        updated_at: created_at,
    }
}

fn create_test_engine(
    members: Vec<Staff>,
) -> (AssignmentEngine, mpsc::Receiver<NotificationPayload>) {
    let storage = DispatchStorage::open_in_memory().unwrap();
    let txn = storage.begin_write().unwrap();
    for s in &members {
        storage.put_staff(&txn, s).unwrap();
    }
    txn.commit().unwrap();

    let (fanout, rx) = NotificationFanout::channel(64);
    (AssignmentEngine::new(storage, fanout), rx)
}

fn new_order(engine: &AssignmentEngine, id: &str) {
    engine.create_order(id, &scope(), Some("t1".into())).unwrap();
}

fn complete(engine: &AssignmentEngine, id: &str) {
    for status in [OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Served] {
        engine
            .update_status(id, status, &Actor::System, None)
            .unwrap();
    }
    engine.on_order_completed(id, &Actor::System).unwrap();
}

fn drain(rx: &mut mpsc::Receiver<NotificationPayload>) -> Vec<NotificationPayload> {
    let mut events = Vec::new();
    while let Ok(p) = rx.try_recv() {
        events.push(p);
    }
    events
}

fn count(engine: &AssignmentEngine, staff_id: &str) -> u32 {
    engine.capacity().active_count(staff_id).unwrap()
}

// ========== End-to-end flows ==========

#[test]
fn test_capacity_one_roster_flow() {
    let (engine, mut rx) = create_test_engine(vec![waiter("a", 1, 1), waiter("b", 2, 1)]);
    for id in ["o1", "o2", "o3"] {
        new_order(&engine, id);
    }

    let o1 = engine.assign("o1").unwrap();
    let o2 = engine.assign("o2").unwrap();
    assert_eq!(o1.assigned_staff_id.as_deref(), Some("a"));
    assert_eq!(o2.assigned_staff_id.as_deref(), Some("b"));

    let err = engine.assign("o3").unwrap_err();
    assert!(matches!(err, AssignError::NoEligibleStaff(_)));
    let o3 = engine.get_order("o3").unwrap();
    assert!(o3.assigned_staff_id.is_none());
    assert_eq!(o3.status, OrderStatus::Pending);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.event == DispatchEventKind::Assigned));

    // o1 完成后 A 释放容量，o3 分给 A
    complete(&engine, "o1");
    assert_eq!(count(&engine, "a"), 0);

    let o3 = engine.assign("o3").unwrap();
    assert_eq!(o3.assigned_staff_id.as_deref(), Some("a"));
    assert_eq!(count(&engine, "a"), 1);
    assert_eq!(count(&engine, "b"), 1);

    // 手动指派给已满的 B 被拒绝，B 不变
    new_order(&engine, "o4");
    let err = engine
        .manual_assign("o4", "b", &manager(), None)
        .unwrap_err();
    assert!(matches!(err, AssignError::StaffAtCapacity(_)));
    assert_eq!(count(&engine, "b"), 1);
    assert!(engine.get_order("o4").unwrap().assigned_staff_id.is_none());
}

#[test]
fn test_reset_restarts_rotation() {
    let (engine, _rx) = create_test_engine(vec![
        waiter("a", 1, 5),
        waiter("b", 2, 5),
        waiter("c", 3, 5),
    ]);
    for id in ["o1", "o2", "o3"] {
        new_order(&engine, id);
    }

    engine.assign("o1").unwrap();
    engine.assign("o2").unwrap();
    let pointer = engine.allocator().pointer(&scope()).unwrap().unwrap();
    assert_eq!(pointer.last_staff_id, "b");

    assert_eq!(engine.allocator().reset(&ResetTarget::All).unwrap(), 1);
    assert!(engine.allocator().pointer(&scope()).unwrap().is_none());

    let o3 = engine.assign("o3").unwrap();
    assert_eq!(o3.assigned_staff_id.as_deref(), Some("a"));
}

// ========== Properties ==========

#[test]
fn test_equal_capacity_split_evenly() {
    let members: Vec<Staff> = (0..4)
        .map(|i| waiter(&format!("w{}", i), i, 3))
        .collect();
    let (engine, _rx) = create_test_engine(members);

    for i in 0..4 {
        let id = format!("o{}", i);
        new_order(&engine, &id);
        engine.assign(&id).unwrap();
    }
    for i in 0..4 {
        assert_eq!(count(&engine, &format!("w{}", i)), 1);
    }
}

#[test]
fn test_automatic_path_never_exceeds_capacity() {
    let (engine, _rx) = create_test_engine(vec![waiter("a", 1, 2), waiter("b", 2, 3)]);

    let mut assigned = 0;
    for i in 0..10 {
        let id = format!("o{}", i);
        new_order(&engine, &id);
        match engine.assign(&id) {
            Ok(_) => assigned += 1,
            Err(AssignError::NoEligibleStaff(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(assigned, 5);
    assert_eq!(count(&engine, "a"), 2);
    assert_eq!(count(&engine, "b"), 3);
}

#[test]
fn test_unavailable_and_non_waiters_skipped() {
    let mut off = waiter("a", 1, 5);
    off.is_available = false;
    let mut cook = waiter("k", 0, 5);
    cook.role = StaffRole::Kitchen;
    let (engine, _rx) = create_test_engine(vec![off, cook, waiter("b", 2, 5)]);

    new_order(&engine, "o1");
    let order = engine.assign("o1").unwrap();
    assert_eq!(order.assigned_staff_id.as_deref(), Some("b"));
}

#[test]
fn test_assign_twice_rejected() {
    let (engine, _rx) = create_test_engine(vec![waiter("a", 1, 5)]);
    new_order(&engine, "o1");
    engine.assign("o1").unwrap();

    let err = engine.assign("o1").unwrap_err();
    assert!(matches!(err, AssignError::OrderAlreadyAssigned { .. }));
    assert_eq!(count(&engine, "a"), 1);
}

#[test]
fn test_create_order_duplicate() {
    let (engine, _rx) = create_test_engine(vec![]);
    new_order(&engine, "o1");
    let err = engine.create_order("o1", &scope(), None).unwrap_err();
    assert!(matches!(err, AssignError::OrderAlreadyExists(_)));
}

// ========== Manual override ==========

#[test]
fn test_manual_assign_leaves_pointer_untouched() {
    let (engine, mut rx) = create_test_engine(vec![waiter("a", 1, 5), waiter("b", 2, 5)]);
    new_order(&engine, "o1");
    new_order(&engine, "o2");

    engine.assign("o1").unwrap();
    let before = engine.allocator().pointer(&scope()).unwrap();

    let order = engine
        .manual_assign("o2", "a", &manager(), Some("regular guest"))
        .unwrap();
    assert_eq!(order.assigned_staff_id.as_deref(), Some("a"));
    assert_eq!(engine.allocator().pointer(&scope()).unwrap(), before);
    assert_eq!(count(&engine, "a"), 2);

    let record = order.assignment_history.last().unwrap();
    assert_eq!(record.action, AssignmentAction::Assigned);
    assert_eq!(record.actor, manager());
    assert_eq!(record.reason.as_deref(), Some("regular guest"));

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].reason.as_deref(), Some("regular guest"));
}

#[test]
fn test_manual_assign_may_target_kitchen_staff() {
    let mut cook = waiter("k", 1, 5);
    cook.role = StaffRole::Kitchen;
    let (engine, _rx) = create_test_engine(vec![cook]);
    new_order(&engine, "o1");

    let order = engine.manual_assign("o1", "k", &manager(), None).unwrap();
    assert_eq!(order.assigned_staff_id.as_deref(), Some("k"));
}

#[test]
fn test_manual_assign_errors_leave_state_unchanged() {
    let mut other_branch = waiter("x", 1, 5);
    other_branch.branch_id = "b2".into();
    let mut off = waiter("z", 3, 5);
    off.is_available = false;
    let (engine, _rx) = create_test_engine(vec![waiter("a", 1, 5), other_branch, off]);
    new_order(&engine, "o1");

    assert!(matches!(
        engine.manual_assign("o1", "x", &manager(), None),
        Err(AssignError::StaffNotInBranch { .. })
    ));
    assert!(matches!(
        engine.manual_assign("o1", "z", &manager(), None),
        Err(AssignError::StaffUnavailable(_))
    ));
    assert!(matches!(
        engine.manual_assign("o1", "ghost", &manager(), None),
        Err(AssignError::StaffNotFound(_))
    ));
    assert_eq!(count(&engine, "x"), 0);
    assert!(engine.get_order("o1").unwrap().assignment_history.is_empty());

    engine.manual_assign("o1", "a", &manager(), None).unwrap();
    assert!(matches!(
        engine.manual_assign("o1", "a", &manager(), None),
        Err(AssignError::OrderAlreadyAssignedToTarget { .. })
    ));
    assert_eq!(count(&engine, "a"), 1);
}

#[test]
fn test_reassign_moves_one_unit() {
    let (engine, mut rx) = create_test_engine(vec![waiter("a", 1, 5), waiter("b", 2, 5)]);
    new_order(&engine, "o1");
    engine.assign("o1").unwrap();
    engine.mark_viewed("o1", "a").unwrap();
    drain(&mut rx);

    let order = engine
        .reassign("o1", "b", &manager(), Some("shift change"))
        .unwrap();
    assert_eq!(order.assigned_staff_id.as_deref(), Some("b"));
    assert!(order.acknowledged_at.is_none());
    assert_eq!(count(&engine, "a"), 0);
    assert_eq!(count(&engine, "b"), 1);

    let record = order.assignment_history.last().unwrap();
    assert_eq!(record.action, AssignmentAction::Reassigned);
    assert_eq!(record.previous_staff_id.as_deref(), Some("a"));

    let events = drain(&mut rx);
    let kinds: Vec<DispatchEventKind> = events.iter().map(|e| e.event).collect();
    assert_eq!(kinds, vec![DispatchEventKind::Removed, DispatchEventKind::Assigned]);
    assert_eq!(events[0].previous_staff_id.as_deref(), Some("a"));

    assert!(matches!(
        engine.reassign("o1", "b", &manager(), None),
        Err(AssignError::OrderAlreadyAssignedToTarget { .. })
    ));
}

#[test]
fn test_reassign_to_full_staff_is_atomic() {
    let mut full = waiter("b", 2, 1);
    full.active_order_count = 1;
    let (engine, _rx) = create_test_engine(vec![waiter("a", 1, 5), full]);
    new_order(&engine, "o1");
    engine.assign("o1").unwrap();

    let err = engine.reassign("o1", "b", &manager(), None).unwrap_err();
    assert!(matches!(err, AssignError::StaffAtCapacity(_)));
    assert_eq!(count(&engine, "a"), 1);
    assert_eq!(count(&engine, "b"), 1);
    assert_eq!(
        engine.get_order("o1").unwrap().assigned_staff_id.as_deref(),
        Some("a")
    );
}

#[test]
fn test_reassign_unassigned_order_assigns() {
    let (engine, _rx) = create_test_engine(vec![waiter("a", 1, 5)]);
    new_order(&engine, "o1");

    let order = engine.reassign("o1", "a", &manager(), None).unwrap();
    assert_eq!(
        order.assignment_history.last().unwrap().action,
        AssignmentAction::Assigned
    );
    assert_eq!(count(&engine, "a"), 1);
}

#[test]
fn test_unassign_releases_capacity() {
    let (engine, mut rx) = create_test_engine(vec![waiter("a", 1, 5)]);
    new_order(&engine, "o1");
    engine.assign("o1").unwrap();
    drain(&mut rx);

    let order = engine.unassign("o1", &manager(), None).unwrap();
    assert!(order.assigned_staff_id.is_none());
    assert_eq!(count(&engine, "a"), 0);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, DispatchEventKind::Removed);

    assert!(matches!(
        engine.unassign("o1", &manager(), None),
        Err(AssignError::OrderNotAssigned(_))
    ));
}

// ========== Lifecycle ==========

#[test]
fn test_terminal_orders_rejected() {
    let (engine, _rx) = create_test_engine(vec![waiter("a", 1, 5), waiter("b", 2, 5)]);
    new_order(&engine, "o1");
    engine.assign("o1").unwrap();

    let order = engine
        .on_order_cancelled("o1", &manager(), Some("guest left"))
        .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.assigned_staff_id.as_deref(), Some("a"));
    assert_eq!(count(&engine, "a"), 0);

    // 终态订单不再释放容量
    assert!(matches!(
        engine.on_order_completed("o1", &Actor::System),
        Err(AssignError::OrderInTerminalState(_))
    ));
    assert!(matches!(
        engine.reassign("o1", "b", &manager(), None),
        Err(AssignError::OrderInTerminalState(_))
    ));
    assert_eq!(count(&engine, "a"), 0);
    assert_eq!(count(&engine, "b"), 0);
}

#[test]
fn test_invalid_status_transition() {
    let (engine, _rx) = create_test_engine(vec![waiter("a", 1, 5)]);
    new_order(&engine, "o1");

    let err = engine
        .update_status("o1", OrderStatus::Served, &Actor::System, None)
        .unwrap_err();
    assert!(matches!(err, AssignError::InvalidStatusTransition { .. }));
    assert_eq!(engine.get_order("o1").unwrap().status, OrderStatus::Pending);
}

#[test]
fn test_status_change_events() {
    let (engine, mut rx) = create_test_engine(vec![waiter("a", 1, 5)]);
    new_order(&engine, "o1");
    engine.assign("o1").unwrap();
    drain(&mut rx);

    complete(&engine, "o1");
    let kinds: Vec<DispatchEventKind> = drain(&mut rx).iter().map(|e| e.event).collect();
    assert_eq!(
        kinds,
        vec![
            DispatchEventKind::StatusChanged,
            DispatchEventKind::StatusChanged,
            DispatchEventKind::StatusChanged,
            DispatchEventKind::Completed,
        ]
    );
}

#[test]
fn test_mark_viewed() {
    let (engine, mut rx) = create_test_engine(vec![waiter("a", 1, 5), waiter("b", 2, 5)]);
    new_order(&engine, "o1");

    assert!(matches!(
        engine.mark_viewed("o1", "a"),
        Err(AssignError::OrderNotAssigned(_))
    ));

    engine.assign("o1").unwrap();
    drain(&mut rx);

    assert!(matches!(
        engine.mark_viewed("o1", "b"),
        Err(AssignError::NotAssignee { .. })
    ));

    let first = engine.mark_viewed("o1", "a").unwrap();
    let at = first.acknowledged_at.unwrap();
    let again = engine.mark_viewed("o1", "a").unwrap();
    assert_eq!(again.acknowledged_at, Some(at));

    // 只有第一次确认产生通知
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, DispatchEventKind::Viewed);
    assert_eq!(events[0].actor, Actor::user("a", "staff"));
}

// ========== Scope ids ==========

#[test]
fn test_separator_in_scope_ids_rejected() {
    let (engine, _rx) = create_test_engine(vec![waiter("x1", 1, 5)]);

    // "h:1"/"b" and "h"/"1:b" would share the key "h:1:b"
    for bad in [BranchScope::new("h:1", "b"), BranchScope::new("h", "1:b")] {
        let err = engine.create_order("ox1", &bad, None).unwrap_err();
        assert!(matches!(err, AssignError::InvalidScope(_)), "{err:?}");
    }
    assert!(matches!(
        engine.get_order("ox1").unwrap_err(),
        AssignError::OrderNotFound(_)
    ));

    let directory = StaffDirectory::new(engine.storage().clone(), 20);
    let err = directory
        .create(shared::models::StaffCreate {
            id: Some("y1".into()),
            hotel_id: "h".into(),
            branch_id: "1:b".into(),
            name: "Y1".into(),
            role: StaffRole::Waiter,
            max_orders_capacity: None,
            is_available: None,
        })
        .unwrap_err();
    assert!(matches!(err, AssignError::InvalidScope(_)));
    assert!(matches!(
        directory.get("y1").unwrap_err(),
        AssignError::StaffNotFound(_)
    ));
}

#[test]
fn test_branches_keep_separate_pointers() {
    let mut y1 = waiter("y1", 1, 5);
    y1.hotel_id = "h1".into();
    y1.branch_id = "b2".into();
    let (engine, _rx) = create_test_engine(vec![waiter("x1", 1, 5), waiter("x2", 2, 5), y1]);

    new_order(&engine, "ox1");
    engine
        .create_order("oy1", &BranchScope::new("h1", "b2"), None)
        .unwrap();
    new_order(&engine, "ox2");

    assert_eq!(engine.assign("ox1").unwrap().assigned_staff_id.as_deref(), Some("x1"));
    assert_eq!(engine.assign("oy1").unwrap().assigned_staff_id.as_deref(), Some("y1"));
    // branch b2's assignment does not disturb b1's rotation
    assert_eq!(engine.assign("ox2").unwrap().assigned_staff_id.as_deref(), Some("x2"));
}

// ========== Concurrency ==========

#[test]
fn test_concurrent_assign_same_branch() {
    let (engine, _rx) = create_test_engine(vec![waiter("a", 1, 1), waiter("b", 2, 1)]);
    for i in 0..8 {
        new_order(&engine, &format!("o{i}"));
    }

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            std::thread::spawn(move || engine.assign(&format!("o{i}")))
        })
        .collect();

    let mut assigned = Vec::new();
    for handle in handles {
        match handle.join().unwrap() {
            Ok(order) => assigned.push(order.assigned_staff_id.unwrap()),
            Err(err) => assert!(matches!(err, AssignError::NoEligibleStaff(_)), "{err:?}"),
        }
    }
    assigned.sort();
    assert_eq!(assigned, vec!["a", "b"]);
    assert_eq!(count(&engine, "a"), 1);
    assert_eq!(count(&engine, "b"), 1);
}
