//! 核心错误处理模块
//!
//! 所有传输层共用同一张 错误 → 状态码/原因 映射表。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::app::users::model::UserId;
use crate::app::users::store::StoreError;

/// 资源核心错误类型
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("user {0} not found")]
    NotFound(UserId),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("store call exceeded its deadline")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl UserError {
    pub fn status(&self) -> StatusCode {
        match self {
            UserError::Validation(_) => StatusCode::BAD_REQUEST,
            UserError::NotFound(_) => StatusCode::NOT_FOUND,
            UserError::Conflict(_) => StatusCode::CONFLICT,
            UserError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            UserError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            UserError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 机器可读的错误原因
    pub fn reason(&self) -> &'static str {
        match self {
            UserError::Validation(_) => "invalid_input",
            UserError::NotFound(_) => "not_found",
            UserError::Conflict(_) => "conflict",
            UserError::PayloadTooLarge(_) => "payload_too_large",
            UserError::Timeout => "store_timeout",
            UserError::Internal(_) => "internal",
        }
    }

    /// 返回给客户端的说明，内部错误不暴露细节
    pub fn public_message(&self) -> String {
        match self {
            UserError::Validation(msg) | UserError::Conflict(msg) => msg.clone(),
            UserError::NotFound(id) => format!("user {id} not found"),
            UserError::PayloadTooLarge(limit) => format!("request body exceeds {limit} bytes"),
            UserError::Timeout => "the store did not answer in time".to_string(),
            UserError::Internal(_) => "internal server error".to_string(),
        }
    }
}

impl From<StoreError> for UserError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { constraint } => {
                UserError::Conflict(format!("email already exists ({constraint})"))
            }
            StoreError::NotFound(id) => UserError::NotFound(id),
            StoreError::Backend(msg) => UserError::Internal(msg),
        }
    }
}

impl From<validator::ValidationErrors> for UserError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    error
                        .message
                        .as_ref()
                        .map(|msg| msg.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid"))
                })
            })
            .collect();
        messages.sort();

        UserError::Validation(messages.join(", "))
    }
}

/// 错误响应结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, reason: &str, message: impl Into<String>) -> Self {
        Self {
            error: reason.to_string(),
            message: message.into(),
            code: status.as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl From<&UserError> for ErrorResponse {
    fn from(err: &UserError) -> Self {
        if let UserError::Internal(detail) = err {
            error!(error = %detail, "internal error while serving user request");
        }
        ErrorResponse::new(err.status(), err.reason(), err.public_message())
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorResponse::from(&self))).into_response()
    }
}
