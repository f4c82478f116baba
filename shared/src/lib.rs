//! Shared types for the dispatch platform
//!
//! Common types used by dispatch-server and its clients: error codes,
//! response envelope, dispatch models and message-bus payloads.

pub mod error;
pub mod message;
pub mod models;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

// Message bus re-exports (for convenient access)
pub use message::{BusMessage, DispatchEventKind, NotificationPayload};
