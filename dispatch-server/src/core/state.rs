use std::sync::Arc;

use parking_lot::Mutex;
use shared::message::NotificationPayload;
use tokio::sync::mpsc;

use crate::assignment::{
    AssignmentEngine, DispatchStorage, PointerResetScheduler, StaffDirectory,
};
use crate::auth::JwtService;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result};
use crate::message::MessageBus;
use crate::notify::{NotificationFanout, NotificationWorker};

/// 服务器状态 - 持有所有服务的共享引用
///
/// 所有字段都是廉价 Clone (内部 Arc)，直接作为 axum State 使用。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | storage | DispatchStorage | redb 存储 |
/// | engine | AssignmentEngine | 自动分配 / 手动指派 / 订单生命周期 |
/// | directory | StaffDirectory | 员工名册 |
/// | scheduler | PointerResetScheduler | 每日指针重置 |
/// | message_bus | MessageBus | 通知传输层 |
/// | jwt_service | Arc<JwtService> | JWT 认证服务 |
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub storage: DispatchStorage,
    pub engine: AssignmentEngine,
    pub directory: StaffDirectory,
    pub scheduler: PointerResetScheduler,
    pub message_bus: MessageBus,
    pub jwt_service: Arc<JwtService>,
    /// 通知队列接收端，由 `start_background_tasks` 取走一次
    notify_rx: Arc<Mutex<Option<mpsc::Receiver<NotificationPayload>>>>,
    /// 启动时间 (Unix millis)
    pub started_at: i64,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 1. 创建工作目录
    /// 2. 打开 redb 数据库 (`{work_dir}/dispatch.redb`)
    /// 3. 组装分配引擎、通知扇出、重置调度器和消息总线
    pub fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let db_path = config.database_path();
        let storage = DispatchStorage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Dispatch storage opened");

        Ok(Self::with_storage(config.clone(), storage))
    }

    /// 使用已打开的存储组装状态
    pub fn with_storage(config: Config, storage: DispatchStorage) -> Self {
        let (fanout, notify_rx) = NotificationFanout::channel(config.notify_queue_capacity);
        let engine = AssignmentEngine::new(storage.clone(), fanout);
        let directory = StaffDirectory::new(storage.clone(), config.default_max_orders_capacity);
        let scheduler = PointerResetScheduler::new(
            storage.clone(),
            engine.allocator().clone(),
            config.reset_window(),
        );
        let message_bus = MessageBus::with_capacity(config.message_channel_capacity);
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));

        Self {
            config,
            storage,
            engine,
            directory,
            scheduler,
            message_bus,
            jwt_service,
            notify_rx: Arc::new(Mutex::new(Some(notify_rx))),
            started_at: shared::util::now_millis(),
        }
    }

    /// 启动后台任务
    ///
    /// - `notification_worker` (Worker): 消费通知队列，发布到消息总线
    /// - `pointer_reset_scheduler` (Periodic): 每日指针重置
    ///
    /// 通知队列只能被消费一次，重复调用时不再注册 worker。
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();
        let shutdown = tasks.shutdown_token();

        match self.notify_rx.lock().take() {
            Some(rx) => {
                let worker = NotificationWorker::new(
                    rx,
                    self.storage.clone(),
                    Arc::new(self.message_bus.clone()),
                );
                tasks.spawn(
                    "notification_worker",
                    TaskKind::Worker,
                    worker.run(shutdown.clone()),
                );
            }
            None => {
                tracing::warn!("Notification worker already started, skipping");
            }
        }

        tasks.spawn(
            "pointer_reset_scheduler",
            TaskKind::Periodic,
            self.scheduler.clone().run(shutdown),
        );

        tasks.log_summary();
        tasks
    }

    /// 获取 JWT 服务
    pub fn get_jwt_service(&self) -> Arc<JwtService> {
        self.jwt_service.clone()
    }
}
