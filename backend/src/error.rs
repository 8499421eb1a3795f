//! Error handling for the Campus Procurement service
//!
//! Provides consistent error responses in Thai and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{FieldError, OrderStatus, ProcurementError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        message_th: String,
    },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_th: String,
    },

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_th: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Procurement rule refusals
    #[error(transparent)]
    Procurement(#[from] ProcurementError),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: &str, message_th: &str) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.to_string(),
            message_th: message_th.to_string(),
        }
    }

    /// Map a unique-constraint violation to `conflict`, pass anything else through
    pub fn on_unique_violation(err: sqlx::Error, conflict: impl FnOnce() -> AppError) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => conflict(),
            _ => AppError::DatabaseError(err),
        }
    }
}

impl From<FieldError> for AppError {
    fn from(err: FieldError) -> Self {
        AppError::Validation {
            field: err.field,
            message: err.message.to_string(),
            message_th: format!("ข้อมูลไม่ถูกต้อง: {}", err.message),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            message: errors.to_string(),
            message_th: format!("ข้อมูลไม่ถูกต้อง: {}", field),
            field,
        }
    }
}

impl From<shared::ParseEnumError> for AppError {
    fn from(err: shared::ParseEnumError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_th: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn new(code: &str, message_en: impl Into<String>, message_th: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message_en: message_en.into(),
            message_th: message_th.into(),
            field: None,
            details: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

fn procurement_status(err: &ProcurementError) -> StatusCode {
    match err {
        ProcurementError::BudgetShortfall { .. }
        | ProcurementError::OverReceipt { .. }
        | ProcurementError::PaymentExceedsValue { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ProcurementError::InvalidTransition { .. }
        | ProcurementError::StateConflict { .. }
        | ProcurementError::DuplicateInspection { .. }
        | ProcurementError::DuplicatePayment { .. } => StatusCode::CONFLICT,
    }
}

fn status_th(status: &OrderStatus) -> &'static str {
    status.label_th()
}

fn procurement_message_th(err: &ProcurementError) -> String {
    match err {
        ProcurementError::BudgetShortfall {
            required,
            available,
        } => format!(
            "งบประมาณไม่เพียงพอ: ต้องการ {} คงเหลือ {}",
            required, available
        ),
        ProcurementError::InvalidTransition { from, to } => format!(
            "ไม่สามารถเปลี่ยนสถานะจาก {} เป็น {}",
            status_th(from),
            status_th(to)
        ),
        ProcurementError::StateConflict { current, .. } => {
            format!("ไม่สามารถดำเนินการได้ในสถานะปัจจุบัน ({})", current)
        }
        ProcurementError::OverReceipt {
            material_name,
            requested,
            remaining,
            ..
        } => format!(
            "จำนวนรับเกินกว่าที่สั่ง: {} ขอรับ {} คงเหลือ {}",
            material_name, requested, remaining
        ),
        ProcurementError::DuplicateInspection { .. } => {
            "รายการรับนี้ได้รับการตรวจรับแล้ว".to_string()
        }
        ProcurementError::DuplicatePayment { .. } => "รายการรับนี้มีการเบิกจ่ายแล้ว".to_string(),
        ProcurementError::PaymentExceedsValue {
            requested,
            max_allowed,
        } => format!(
            "ยอดเบิกจ่ายเกินมูลค่าที่ตรวจรับ: ขอ {} สูงสุด {}",
            requested, max_allowed
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired", "โทเค็นหมดอายุแล้ว"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token", "โทเค็นไม่ถูกต้อง"),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                    "คุณไม่มีสิทธิ์ในการดำเนินการนี้",
                ),
            ),
            AppError::Unauthorized { message, message_th } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone(), message_th.clone()),
            ),
            AppError::Validation {
                field,
                message,
                message_th,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_th.clone())
                    .with_field(field),
            ),
            AppError::Conflict {
                resource,
                message,
                message_th,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONFLICT", message.clone(), message_th.clone())
                    .with_field(resource),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("ไม่พบ {}", resource),
                ),
            ),
            AppError::Procurement(err) => {
                let mut detail =
                    ErrorDetail::new(err.code(), err.to_string(), procurement_message_th(err));
                detail.details = Some(err.details());
                (procurement_status(err), detail)
            }
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "DATABASE_ERROR",
                    "A database error occurred",
                    "เกิดข้อผิดพลาดกับฐานข้อมูล",
                ),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone(), "เกิดข้อผิดพลาดภายในเซิร์ฟเวอร์"),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred",
                    "เกิดข้อผิดพลาดภายในเซิร์ฟเวอร์",
                ),
            ),
        };

        match &self {
            AppError::Procurement(err) => tracing::warn!(code = err.code(), "Refused: {}", err),
            AppError::InsufficientPermissions => tracing::warn!("Refused: {}", self),
            _ => tracing::error!("Error: {:?}", self),
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_procurement_status_codes() {
        let shortfall = ProcurementError::BudgetShortfall {
            required: Decimal::from(50_000),
            available: Decimal::from(40_000),
        };
        assert_eq!(procurement_status(&shortfall), StatusCode::UNPROCESSABLE_ENTITY);

        let duplicate = ProcurementError::DuplicateInspection {
            partial_receive_id: uuid::Uuid::new_v4(),
        };
        assert_eq!(procurement_status(&duplicate), StatusCode::CONFLICT);
    }

    #[test]
    fn test_error_response_status() {
        let response = AppError::from(ProcurementError::InvalidTransition {
            from: OrderStatus::Draft,
            to: OrderStatus::Approved,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::NotFound("Order".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_field_error_becomes_validation() {
        let err = AppError::from(FieldError::new("items[0].quantity", "Quantity must be greater than zero"));
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items[0].quantity"));
    }
}
