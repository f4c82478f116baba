//! Order Assignment Scheduler
//!
//! # 组件 (叶子在前)
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`capacity`] | 员工活跃订单计数，唯一的资格判断来源 |
//! | [`allocator`] | 每分店轮询指针，自动分配 |
//! | [`manual`] | 管理者手动指派 / 改派，不移动指针 |
//! | [`reset_scheduler`] | 每日窗口内随机时刻清空全部指针 |
//! | [`directory`] | 分店员工名册维护 |
//! | [`storage`] | redb 持久化 (员工、订单、指针、调度计划) |
//!
//! 所有状态变更都在单个 redb 写事务内完成；redb 同一时刻只允许一个写者，
//! 同一分店并发到达的订单因此被串行化，不会超额分配。
//! 通知在事务提交之后才入队。

pub mod allocator;
pub mod capacity;
pub mod directory;
pub mod engine;
pub mod error;
pub mod manual;
pub mod reset_scheduler;
pub mod storage;

#[cfg(test)]
mod tests;

pub use allocator::{ResetTarget, RoundRobinAllocator};
pub use capacity::CapacityTracker;
pub use directory::StaffDirectory;
pub use engine::AssignmentEngine;
pub use error::{AssignError, AssignResult};
pub use reset_scheduler::{PointerResetScheduler, ResetWindow, ScheduleStatus, SchedulerPhase};
pub use storage::{DispatchStorage, StorageError, StorageResult, StorageStats};
