//! Notifications WebSocket Handler
//!
//! 协议:
//! - Server → Client: `NotificationPayload` JSON 文本帧
//! - Client → Server: 无业务消息 (仅 Pong / Close)

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::message::{branch_channel, manager_channel, staff_channel};
use tokio::time::Duration;

use crate::auth::{CurrentUser, JwtError};
use crate::core::ServerState;
use crate::message::ChannelSubscriber;
use crate::security_log;
use crate::utils::AppError;

const PING_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

/// 调用者订阅的频道
///
/// | 条件 | 频道 |
/// |------|------|
/// | 总是 | `staff:{sub}` |
/// | manager / admin | `manager:{sub}` |
/// | 令牌带分店 | `branch:{hotel_id}:{branch_id}` |
pub(crate) fn channels_for(user: &CurrentUser) -> Vec<String> {
    let mut channels = vec![staff_channel(&user.id)];
    if user.is_manager() {
        channels.push(manager_channel(&user.id));
    }
    if let Some(scope) = user.scope() {
        channels.push(branch_channel(&scope.hotel_id, &scope.branch_id));
    }
    channels
}

/// GET /ws/notifications?token=<JWT>
pub async fn handle_notifications_ws(
    State(state): State<ServerState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let claims = state
        .get_jwt_service()
        .validate_token(&query.token)
        .map_err(|e| {
            security_log!(WARN, "ws_auth_failed", error = %e);
            match e {
                JwtError::ExpiredToken => AppError::token_expired(),
                _ => AppError::invalid_token("Invalid token"),
            }
        })?;
    let user = CurrentUser::from(claims);

    // 在升级前订阅，握手期间产生的通知不会丢失
    let subscriber = state.message_bus.subscribe_channels(channels_for(&user));
    Ok(ws.on_upgrade(move |socket| notification_session(socket, subscriber, user)))
}

async fn notification_session(socket: WebSocket, mut subscriber: ChannelSubscriber, user: CurrentUser) {
    let (mut sink, mut stream) = socket.split();

    tracing::info!(
        user_id = %user.id,
        channels = ?subscriber.channels(),
        "Notification WS connected"
    );

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            msg = subscriber.recv() => {
                let Some(msg) = msg else { break };
                let text = String::from_utf8_lossy(&msg.payload).into_owned();
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    tracing::info!(user_id = %user.id, "Notification WS disconnected");
}
