//! Notification Fan-out
//!
//! ```text
//! AssignmentEngine ── emit() ──▶ mpsc (bounded, try_send) ──▶ NotificationWorker
//!                                                                  │
//!                                              resolve_channels() ─┤
//!                                                                  ▼
//!                                         NotificationTransport::publish(channel, ...)
//! ```
//!
//! 分配事务提交后才调用 `emit()`。队列满时丢弃并告警，传输失败只记录日志，
//! 从不影响已提交的分配 (at-most-once, best-effort)。

use std::sync::Arc;

use async_trait::async_trait;
use shared::message::{DispatchEventKind, NotificationPayload};
use shared::models::{Actor, Order};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::routing::resolve_channels;
use crate::assignment::storage::DispatchStorage;

/// 通知传输层
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn publish(
        &self,
        channel: &str,
        event: DispatchEventKind,
        payload: &NotificationPayload,
    ) -> anyhow::Result<()>;
}

/// 通知发送端 (引擎持有)
#[derive(Debug, Clone)]
pub struct NotificationFanout {
    tx: mpsc::Sender<NotificationPayload>,
}

impl NotificationFanout {
    /// 创建发送端和队列接收端
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationPayload>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// 根据订单当前状态构造载荷并入队
    pub fn emit(
        &self,
        event: DispatchEventKind,
        order: &Order,
        previous_staff_id: Option<&str>,
        actor: &Actor,
        reason: Option<&str>,
    ) {
        let payload = NotificationPayload {
            event,
            order_id: order.id.clone(),
            hotel_id: order.hotel_id.clone(),
            branch_id: order.branch_id.clone(),
            table_id: order.table_id.clone(),
            staff_id: order.assigned_staff_id.clone(),
            previous_staff_id: previous_staff_id.map(String::from),
            status: order.status,
            actor: actor.clone(),
            reason: reason.map(String::from),
            at: order.updated_at,
        };

        match self.tx.try_send(payload) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(p)) => {
                tracing::warn!(
                    order_id = %p.order_id,
                    event = %p.event,
                    "Notification queue full, event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(p)) => {
                tracing::debug!(order_id = %p.order_id, "Notification queue closed");
            }
        }
    }
}

/// 通知工作者：解析接收者并调用传输层
pub struct NotificationWorker {
    rx: mpsc::Receiver<NotificationPayload>,
    storage: DispatchStorage,
    transport: Arc<dyn NotificationTransport>,
}

impl NotificationWorker {
    pub fn new(
        rx: mpsc::Receiver<NotificationPayload>,
        storage: DispatchStorage,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        Self {
            rx,
            storage,
            transport,
        }
    }

    /// 运行直到队列关闭或收到关机信号
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Notification worker started");

        loop {
            tokio::select! {
                payload = self.rx.recv() => match payload {
                    Some(payload) => {
                        self.deliver(&payload).await;
                    }
                    None => {
                        tracing::info!("Notification queue closed, worker stopping");
                        return;
                    }
                },
                _ = shutdown.cancelled() => {
                    tracing::info!("Notification worker received shutdown signal");
                    return;
                }
            }
        }
    }

    /// 投递一条通知到所有接收频道，返回成功投递数
    pub async fn deliver(&self, payload: &NotificationPayload) -> usize {
        let scope = shared::models::BranchScope::new(&payload.hotel_id, &payload.branch_id);
        let branch_staff = match self.storage.list_branch_staff(&scope) {
            Ok(staff) => staff,
            Err(e) => {
                tracing::warn!(scope = %scope, error = %e, "Failed to load branch staff, managers skipped");
                Vec::new()
            }
        };

        let mut delivered = 0;
        for channel in resolve_channels(payload, &branch_staff) {
            match self.transport.publish(&channel, payload.event, payload).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        channel = %channel,
                        order_id = %payload.order_id,
                        event = %payload.event,
                        error = %e,
                        "Notification delivery failed"
                    );
                }
            }
        }

        tracing::debug!(order_id = %payload.order_id, event = %payload.event, delivered, "Notification fanned out");
        delivered
    }
}
