//! 轮询指针每日重置调度器
//!
//! 每个自然日在固定窗口 (默认 02:00–05:00，业务时区) 内随机抽取一个时刻，
//! 清空全部轮询指针。抽取结果持久化到 redb：
//!
//! - 重启后直接读取已持久化的 `next_run_at`，不重新抽取
//! - 进程停机期间错过的运行，启动时立即执行
//! - 执行失败只记录日志，等待 [`RETRY_DELAY`] 后重试
//!
//! 状态机: `Idle → Resetting → Idle`

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use rand::Rng;
use serde::Serialize;
use shared::models::ResetSchedule;
use tokio_util::sync::CancellationToken;

use super::allocator::{ResetTarget, RoundRobinAllocator};
use super::error::AssignResult;
use super::storage::DispatchStorage;

/// 失败后的重试间隔
pub const RETRY_DELAY: Duration = Duration::from_secs(60);

/// 每日重置窗口 `[start, end)`，本地时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub tz: Tz,
}

impl ResetWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, tz: Tz) -> Self {
        Self { start, end, tz }
    }

    /// 窗口长度 (秒)，至少 1
    fn span_secs(&self) -> i64 {
        (self.end - self.start).num_seconds().max(1)
    }

    /// 在 `date` 当天的窗口内均匀抽取一个时刻
    pub fn draw<R: Rng + ?Sized>(&self, date: NaiveDate, rng: &mut R) -> DateTime<Utc> {
        let offset = rng.gen_range(0..self.span_secs());
        let naive = date.and_time(self.start) + chrono::Duration::seconds(offset);

        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                // DST gap: 本地时间不存在，顺延一小时
                self.tz
                    .from_local_datetime(&(naive + chrono::Duration::hours(1)))
                    .earliest()
            })
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc())
    }

    /// 计算下一次运行时刻
    ///
    /// `last_run` 与 `now` 在同一本地日期时从明天开始抽取，保证每天最多一次。
    /// 抽出的时刻不晚于 `now` 时顺延一天。
    pub fn next_run_after<R: Rng + ?Sized>(
        &self,
        now: DateTime<Utc>,
        last_run: Option<DateTime<Utc>>,
        rng: &mut R,
    ) -> DateTime<Utc> {
        let today = now.with_timezone(&self.tz).date_naive();
        let already_ran_today =
            last_run.is_some_and(|t| t.with_timezone(&self.tz).date_naive() >= today);

        let mut date = if already_ran_today {
            today + chrono::Duration::days(1)
        } else {
            today
        };

        loop {
            let candidate = self.draw(date, rng);
            if candidate > now {
                return candidate;
            }
            date += chrono::Duration::days(1);
        }
    }
}

/// 调度器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    Idle,
    Resetting,
}

/// 调度状态快照 (供 API 查询)
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleStatus {
    pub phase: SchedulerPhase,
    pub window_start: String,
    pub window_end: String,
    pub timezone: String,
    pub next_run_at: Option<i64>,
    pub last_run_at: Option<i64>,
    pub last_cleared: Option<usize>,
}

/// 轮询指针重置调度器
///
/// 注册为 `TaskKind::Periodic`，在 `start_background_tasks()` 中启动。
#[derive(Debug, Clone)]
pub struct PointerResetScheduler {
    storage: DispatchStorage,
    allocator: RoundRobinAllocator,
    window: ResetWindow,
    phase: Arc<RwLock<SchedulerPhase>>,
}

impl PointerResetScheduler {
    pub fn new(storage: DispatchStorage, allocator: RoundRobinAllocator, window: ResetWindow) -> Self {
        Self {
            storage,
            allocator,
            window,
            phase: Arc::new(RwLock::new(SchedulerPhase::Idle)),
        }
    }

    pub fn window(&self) -> &ResetWindow {
        &self.window
    }

    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.read()
    }

    pub fn status(&self) -> AssignResult<ScheduleStatus> {
        let schedule = self.storage.get_reset_schedule()?;
        Ok(ScheduleStatus {
            phase: self.phase(),
            window_start: self.window.start.format("%H:%M").to_string(),
            window_end: self.window.end.format("%H:%M").to_string(),
            timezone: self.window.tz.name().to_string(),
            next_run_at: schedule.next_run_at,
            last_run_at: schedule.last_run_at,
            last_cleared: schedule.last_cleared,
        })
    }

    /// 主循环：读取/抽取下次运行时刻 → sleep → 清空指针
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            window_start = %self.window.start.format("%H:%M"),
            window_end = %self.window.end.format("%H:%M"),
            timezone = %self.window.tz,
            "Pointer reset scheduler started"
        );

        loop {
            let next = match self.ensure_next_run(Utc::now()) {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load pointer reset schedule");
                    if wait_or_shutdown(RETRY_DELAY, &shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tracing::info!(
                next_run = %next.with_timezone(&self.window.tz).format("%Y-%m-%d %H:%M:%S"),
                "Next pointer reset in {} minutes",
                wait.as_secs() / 60
            );

            if wait_or_shutdown(wait, &shutdown).await {
                break;
            }

            if let Err(e) = self.run_once(Utc::now()) {
                tracing::error!(error = %e, "Pointer reset failed, retrying later");
                if wait_or_shutdown(RETRY_DELAY, &shutdown).await {
                    break;
                }
            }
        }

        tracing::info!("Pointer reset scheduler received shutdown signal");
    }

    /// 返回已持久化的下次运行时刻；没有则抽取并持久化
    ///
    /// 返回值可能早于 `now` (停机期间错过)，调用方应立即执行。
    pub fn ensure_next_run(&self, now: DateTime<Utc>) -> AssignResult<DateTime<Utc>> {
        let mut schedule = self.storage.get_reset_schedule()?;
        if let Some(next) = schedule.next_run_at.and_then(DateTime::from_timestamp_millis) {
            return Ok(next);
        }

        let last_run = schedule.last_run_at.and_then(DateTime::from_timestamp_millis);
        let next = self
            .window
            .next_run_after(now, last_run, &mut rand::thread_rng());
        schedule.next_run_at = Some(next.timestamp_millis());

        let txn = self.storage.begin_write()?;
        self.storage.put_reset_schedule(&txn, &schedule)?;
        txn.commit()?;

        Ok(next)
    }

    /// 执行一次全量重置，并在同一事务内写入下一次计划
    pub fn run_once(&self, now: DateTime<Utc>) -> AssignResult<usize> {
        *self.phase.write() = SchedulerPhase::Resetting;
        let result = self.reset_and_reschedule(now);
        *self.phase.write() = SchedulerPhase::Idle;

        if let Ok(cleared) = &result {
            tracing::info!(cleared, "Daily round-robin pointer reset completed");
        }
        result
    }

    fn reset_and_reschedule(&self, now: DateTime<Utc>) -> AssignResult<usize> {
        let next = self
            .window
            .next_run_after(now, Some(now), &mut rand::thread_rng());

        let txn = self.storage.begin_write()?;
        let cleared = self.allocator.reset_in(&txn, &ResetTarget::All)?;
        self.storage.put_reset_schedule(
            &txn,
            &ResetSchedule {
                next_run_at: Some(next.timestamp_millis()),
                last_run_at: Some(now.timestamp_millis()),
                last_cleared: Some(cleared),
            },
        )?;
        txn.commit()?;

        Ok(cleared)
    }
}

/// sleep `duration`; returns true when shutdown fired first
async fn wait_or_shutdown(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.cancelled() => true,
    }
}
