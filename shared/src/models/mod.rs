//! Data models
//!
//! Shared between dispatch-server and clients (via API and message bus).
//! All IDs are platform strings; timestamps are Unix millis.

pub mod assignment;
pub mod order;
pub mod staff;

// Re-exports
pub use assignment::*;
pub use order::*;
pub use staff::*;
