//! 错误类型与统一响应结构

use super::codes::ErrorCode;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// 带错误码的应用错误
///
/// handler 返回 `AppError`，由 [`axum::response::IntoResponse`] 转成
/// `ApiResponse` JSON 和对应的 HTTP 状态码。
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    /// 附加字段 (staff_id, hotel_id 等)
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// 使用错误码的默认消息
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    // ==================== Shorthands ====================

    /// 请求体 / 路径参数校验失败
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }

    /// 角色不足
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::PermissionDenied, msg)
    }

    /// 操作目标不在令牌所属分店
    pub fn branch_access_denied(hotel_id: &str, branch_id: &str) -> Self {
        Self::new(ErrorCode::BranchAccessDenied)
            .with_detail("hotel_id", hotel_id)
            .with_detail("branch_id", branch_id)
    }

    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::TokenInvalid, msg)
    }

    pub fn token_expired() -> Self {
        Self::new(ErrorCode::TokenExpired)
    }

    /// 缺少 Authorization 头
    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::NotAuthenticated)
    }
}

/// 统一 API 响应
///
/// | 字段 | 成功 | 失败 |
/// |------|------|------|
/// | code | 0 | 错误码 |
/// | message | "OK" 或提示 | 错误消息 |
/// | data | 载荷 | 无 |
/// | details | 无 | 附加字段 |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::success_with_message("OK", data)
    }

    /// 成功但需要提示调用方 (如订单暂无可分配员工)
    pub fn success_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            code: Some(0),
            message: message.into(),
            data: Some(data),
            details: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(err: &AppError) -> Self {
        Self {
            code: Some(err.code.code()),
            message: err.message.clone(),
            data: None,
            details: err.details.clone(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

// ===== Axum =====

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;

        let status = self.http_status();
        let body = ApiResponse::<()>::error(&self);

        if matches!(self.code.category(), super::category::ErrorCategory::System) {
            tracing::error!(
                code = %self.code,
                message = %self.message,
                "System error occurred"
            );
        }

        (status, Json(body)).into_response()
    }
}

impl<T: Serialize> axum::response::IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;

        let status = match self.code {
            None | Some(0) => StatusCode::OK,
            Some(code) => ErrorCode::try_from(code)
                .map(|c| c.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        };

        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_default_and_custom_message() {
        let err = AppError::new(ErrorCode::NoEligibleStaff);
        assert_eq!(err.message, "No eligible staff available in this branch");
        assert_eq!(err.http_status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = AppError::with_message(ErrorCode::StaffAtCapacity, "Staff s-2 is full");
        assert_eq!(err.to_string(), "Staff s-2 is full");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_branch_access_denied_details() {
        let err = AppError::branch_access_denied("h1", "b2");
        assert_eq!(err.code, ErrorCode::BranchAccessDenied);
        assert_eq!(err.http_status(), StatusCode::FORBIDDEN);
        let details = err.details.unwrap();
        assert_eq!(details.get("hotel_id").unwrap(), "h1");
        assert_eq!(details.get("branch_id").unwrap(), "b2");
    }

    #[test]
    fn test_auth_shorthands() {
        assert_eq!(AppError::unauthorized().http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::token_expired().code, ErrorCode::TokenExpired);
        assert_eq!(AppError::invalid_token("bad sig").code, ErrorCode::TokenInvalid);
        assert_eq!(AppError::forbidden("manager only").http_status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::validation("name").http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_body_carries_code_and_details() {
        let err = AppError::with_message(ErrorCode::StaffNotFound, "Staff not found")
            .with_detail("staff_id", "s-9");
        let body = ApiResponse::<()>::error(&err);

        assert_eq!(body.code, Some(8001));
        assert!(body.data.is_none());
        assert_eq!(body.details.unwrap().get("staff_id").unwrap(), "s-9");
    }

    #[test]
    fn test_success_serialize() {
        let json = serde_json::to_string(&ApiResponse::success("o-1")).unwrap();
        assert_eq!(json, r#"{"code":0,"message":"OK","data":"o-1"}"#);

        let pending = ApiResponse::success_with_message("Order left pending", 1);
        assert_eq!(pending.message, "Order left pending");
    }

    #[test]
    fn test_into_response_status() {
        assert_eq!(
            AppError::new(ErrorCode::InternalError).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiResponse::success(1).into_response().status(), StatusCode::OK);
    }
}
