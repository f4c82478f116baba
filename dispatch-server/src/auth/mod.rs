//! 认证授权模块
//!
//! - [`JwtService`] - JWT 令牌验证
//! - [`CurrentUser`] - 当前用户上下文 (角色 + 所属分店)
//! - [`require_auth`] / [`require_manager`] / [`require_admin`] - 中间件

pub mod extractor;
pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService, UserRole};
pub use middleware::{require_admin, require_auth, require_manager};
