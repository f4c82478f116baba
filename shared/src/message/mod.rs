//! 消息总线消息类型定义
//!
//! 这些类型在 dispatch-server 和 clients 之间共享。每条消息属于一个逻辑频道：
//!
//! | 频道 | 接收者 |
//! |------|--------|
//! | `staff:{id}` | 单个员工 |
//! | `manager:{id}` | 单个分店管理者 |
//! | `branch:{hotel_id}:{branch_id}` | 分店大屏/前台 |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod payload;
pub use payload::*;

pub fn staff_channel(staff_id: &str) -> String {
    format!("staff:{}", staff_id)
}

pub fn manager_channel(staff_id: &str) -> String {
    format!("manager:{}", staff_id)
}

pub fn branch_channel(hotel_id: &str, branch_id: &str) -> String {
    format!("branch:{}:{}", hotel_id, branch_id)
}

/// 总线消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub request_id: Uuid,
    pub channel: String,
    pub event: DispatchEventKind,
    pub payload: Vec<u8>,
    pub published_at: i64,
}

impl BusMessage {
    pub fn new(channel: impl Into<String>, event: DispatchEventKind, payload: Vec<u8>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            channel: channel.into(),
            event,
            payload,
            published_at: crate::util::now_millis(),
        }
    }

    /// 序列化通知载荷并封装为总线消息
    pub fn notification(
        channel: impl Into<String>,
        payload: &NotificationPayload,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(channel, payload.event, serde_json::to_vec(payload)?))
    }

    /// 解析载荷
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Actor, OrderStatus};

    #[test]
    fn test_notification_payload_through_bus_message() {
        let payload = NotificationPayload {
            event: DispatchEventKind::Assigned,
            order_id: "o1".into(),
            hotel_id: "h1".into(),
            branch_id: "b1".into(),
            table_id: Some("t4".into()),
            staff_id: Some("s1".into()),
            previous_staff_id: None,
            status: OrderStatus::Pending,
            actor: Actor::System,
            reason: None,
            at: 42,
        };
        let msg = BusMessage::notification(staff_channel("s1"), &payload).unwrap();
        assert_eq!(msg.channel, "staff:s1");
        assert_eq!(msg.event, DispatchEventKind::Assigned);

        let parsed: NotificationPayload = msg.parse_payload().unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(manager_channel("m1"), "manager:m1");
        assert_eq!(branch_channel("h1", "b1"), "branch:h1:b1");
        assert_eq!(
            serde_json::to_string(&DispatchEventKind::StatusChanged).unwrap(),
            "\"status_changed\""
        );
    }
}
