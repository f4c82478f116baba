//! JWT 令牌服务
//!
//! 令牌由平台认证服务签发，本服务只负责验证和解析。
//! Claims 携带角色和所属分店，用于分店范围的权限判断。

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use shared::models::BranchScope;
use thiserror::Error;

use crate::utils::AppError;

/// 密钥最短长度
const MIN_SECRET_LEN: usize = 32;

/// JWT 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// JWT 密钥 (至少 32 字节)
    pub secret: String,
    /// 令牌过期时间 (分钟)，仅用于本地签发 (测试/工具)
    pub expiration_minutes: i64,
    /// 令牌签发者
    pub issuer: String,
    /// 令牌受众
    pub audience: String,
}

impl JwtConfig {
    /// 从环境变量加载
    ///
    /// | 变量 | 默认值 |
    /// |------|--------|
    /// | JWT_SECRET | 开发构建自动生成，发布构建必须设置 |
    /// | JWT_EXPIRATION_MINUTES | 1440 |
    /// | JWT_ISSUER | dispatch-server |
    /// | JWT_AUDIENCE | dispatch-clients |
    pub fn from_env() -> Result<Self, JwtError> {
        Ok(Self {
            secret: load_jwt_secret()?,
            expiration_minutes: std::env::var("JWT_EXPIRATION_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1440),
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "dispatch-server".to_string()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "dispatch-clients".to_string()),
        })
    }

    /// 使用给定密钥和默认签发者/受众
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expiration_minutes: 1440,
            issuer: "dispatch-server".to_string(),
            audience: "dispatch-clients".to_string(),
        }
    }
}

/// 令牌中的用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// 平台管理员，不受分店限制
    Admin,
    /// 分店经理 / 分店管理员
    Manager,
    /// 普通员工
    Staff,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Staff => "staff",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 存储在令牌中的 JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 ID (Subject)，员工令牌即 staff id
    pub sub: String,
    /// 显示名称
    pub name: String,
    pub role: UserRole,
    /// 所属酒店 (admin 可为空)
    #[serde(default)]
    pub hotel_id: Option<String>,
    /// 所属分店 (admin 可为空)
    #[serde(default)]
    pub branch_id: Option<String>,
    /// 过期时间戳
    pub exp: i64,
    /// 签发时间戳
    pub iat: i64,
    /// 签发者
    pub iss: String,
    /// 受众
    pub aud: String,
}

/// JWT 错误
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token generation failed: {0}")]
    GenerationFailed(String),

    #[error("JWT configuration error: {0}")]
    ConfigError(String),
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::ExpiredToken => AppError::token_expired(),
            JwtError::ConfigError(msg) => {
                AppError::with_message(shared::error::ErrorCode::ConfigError, msg)
            }
            JwtError::GenerationFailed(msg) => AppError::internal(msg),
            _ => AppError::invalid_token("Invalid token"),
        }
    }
}

/// 生成可打印的安全 JWT 密钥 (用于开发环境)
pub fn generate_printable_jwt_secret() -> Result<String, JwtError> {
    const ALLOWED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    let rng = SystemRandom::new();
    let mut bytes = [0u8; 64];
    rng.fill(&mut bytes)
        .map_err(|_| JwtError::ConfigError("Failed to generate secure random key".to_string()))?;

    Ok(bytes
        .iter()
        .map(|b| ALLOWED[*b as usize % ALLOWED.len()] as char)
        .collect())
}

/// 从环境变量安全地加载 JWT 密钥
fn load_jwt_secret() -> Result<String, JwtError> {
    match std::env::var("JWT_SECRET") {
        Ok(secret) => {
            if secret.len() < MIN_SECRET_LEN {
                return Err(JwtError::ConfigError(format!(
                    "JWT_SECRET must be at least {} characters long",
                    MIN_SECRET_LEN
                )));
            }
            Ok(secret)
        }
        Err(_) => {
            #[cfg(debug_assertions)]
            {
                tracing::warn!("JWT_SECRET not set! Generating temporary key for development.");
                generate_printable_jwt_secret()
            }
            #[cfg(not(debug_assertions))]
            {
                Err(JwtError::ConfigError(
                    "JWT_SECRET environment variable must be set in production!".to_string(),
                ))
            }
        }
    }
}

/// JWT 令牌服务
#[derive(Clone)]
pub struct JwtService {
    pub config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .finish()
    }
}

impl JwtService {
    pub fn with_config(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 签发令牌 (测试与运维工具使用；正式令牌由认证服务签发)
    pub fn generate_token(
        &self,
        user_id: &str,
        name: &str,
        role: UserRole,
        scope: Option<&BranchScope>,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let expiration = now + Duration::minutes(self.config.expiration_minutes);

        let claims = Claims {
            sub: user_id.to_string(),
            name: name.to_string(),
            role,
            hotel_id: scope.map(|s| s.hotel_id.clone()),
            branch_id: scope.map(|s| s.branch_id.clone()),
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    /// 验证并解码令牌
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }

    /// 从 Authorization 头提取令牌
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ")
    }
}

/// 当前用户上下文 (从 JWT Claims 解析)
///
/// 由认证中间件注入请求扩展，handler 通过提取器获取。
///
/// | 角色 | 读取 | 分店内管理操作 | 全局操作 |
/// |------|------|--------------|---------|
/// | admin | 任意分店 | ✔ | ✔ |
/// | manager | 本分店 | ✔ | |
/// | staff | 本分店 | | |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub role: UserRole,
    pub hotel_id: Option<String>,
    pub branch_id: Option<String>,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            role: claims.role,
            hotel_id: claims.hotel_id,
            branch_id: claims.branch_id,
        }
    }
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// 经理或管理员
    pub fn is_manager(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Manager)
    }

    /// 令牌中的分店
    pub fn scope(&self) -> Option<BranchScope> {
        match (&self.hotel_id, &self.branch_id) {
            (Some(h), Some(b)) => Some(BranchScope::new(h, b)),
            _ => None,
        }
    }

    pub fn in_scope(&self, scope: &BranchScope) -> bool {
        self.is_admin()
            || (self.hotel_id.as_deref() == Some(scope.hotel_id.as_str())
                && self.branch_id.as_deref() == Some(scope.branch_id.as_str()))
    }

    /// 只能访问本分店 (admin 除外)
    pub fn ensure_scope(&self, scope: &BranchScope) -> Result<(), AppError> {
        if self.in_scope(scope) {
            Ok(())
        } else {
            crate::security_log!(
                WARN,
                "branch_access_denied",
                user_id = %self.id,
                scope = %scope
            );
            Err(AppError::branch_access_denied(&scope.hotel_id, &scope.branch_id))
        }
    }

    /// 本分店的经理，或管理员
    pub fn ensure_manager(&self, scope: &BranchScope) -> Result<(), AppError> {
        if !self.is_manager() {
            return Err(AppError::new(shared::error::ErrorCode::ManagerRequired));
        }
        self.ensure_scope(scope)
    }

    /// 审计日志与分配历史中的操作者
    pub fn actor(&self) -> shared::models::Actor {
        shared::models::Actor::user(&self.id, self.role.as_str())
    }
}
