//! 消息总线核心实现
//!
//! # 架构
//!
//! ```text
//! NotificationWorker ──▶ publish() ──▶ broadcast::Sender<BusMessage>
//!                                              │
//!                       ┌──────────────────────┼──────────────────────┐
//!                       ▼                      ▼                      ▼
//!              ChannelSubscriber      ChannelSubscriber      ChannelSubscriber
//!              (staff:{id})           (manager:{id})         (branch:{h}:{b})
//! ```
//!
//! 单一广播通道，订阅者按频道键过滤。投递是 at-most-once：没有订阅者或
//! 订阅者落后 (lagged) 时消息直接丢弃。

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use shared::message::{BusMessage, DispatchEventKind, NotificationPayload};
use tokio::sync::broadcast;

use crate::notify::NotificationTransport;

/// 消息总线
#[derive(Debug, Clone)]
pub struct MessageBus {
    /// 服务器到客户端的广播通道
    server_tx: broadcast::Sender<BusMessage>,
    /// 每种事件已发布的消息数 (键集合固定，不随频道增长)
    published: Arc<DashMap<DispatchEventKind, u64>>,
}

impl MessageBus {
    /// 创建指定容量的消息总线
    pub fn with_capacity(capacity: usize) -> Self {
        let (server_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            server_tx,
            published: Arc::new(DashMap::new()),
        }
    }

    /// 发布消息，返回收到消息的订阅者数量
    pub fn publish(&self, msg: BusMessage) -> usize {
        *self.published.entry(msg.event).or_insert(0) += 1;
        match self.server_tx.send(msg) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(msg)) => {
                tracing::trace!(channel = %msg.channel, "No subscribers, message dropped");
                0
            }
        }
    }

    /// 订阅全部消息
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.server_tx.subscribe()
    }

    /// 订阅一组频道
    pub fn subscribe_channels<I, S>(&self, channels: I) -> ChannelSubscriber
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ChannelSubscriber {
            channels: channels.into_iter().map(Into::into).collect(),
            rx: self.server_tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.server_tx.receiver_count()
    }

    /// 指定事件累计发布数
    pub fn published_count(&self, event: DispatchEventKind) -> u64 {
        self.published.get(&event).map(|v| *v).unwrap_or(0)
    }

    /// 全部事件累计发布数
    pub fn published_total(&self) -> u64 {
        self.published.iter().map(|entry| *entry.value()).sum()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::with_capacity(1024)
    }
}

#[async_trait]
impl NotificationTransport for MessageBus {
    async fn publish(
        &self,
        channel: &str,
        event: DispatchEventKind,
        payload: &NotificationPayload,
    ) -> anyhow::Result<()> {
        let mut msg = BusMessage::notification(channel, payload)?;
        msg.event = event;
        MessageBus::publish(self, msg);
        Ok(())
    }
}

/// 按频道过滤的订阅者
pub struct ChannelSubscriber {
    channels: HashSet<String>,
    rx: broadcast::Receiver<BusMessage>,
}

impl ChannelSubscriber {
    pub fn channels(&self) -> &HashSet<String> {
        &self.channels
    }

    /// 接收下一条属于已订阅频道的消息；总线关闭时返回 `None`
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if self.channels.contains(&msg.channel) => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Channel subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
