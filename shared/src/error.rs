//! Domain errors for procurement rules
//!
//! These are the refusals the lifecycle, ledger, receiving and payment rules
//! can produce. Each one is scoped to a single requested operation; the
//! caller rolls back and reports it with the structured fields intact.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::OrderStatus;

/// A procurement rule refused the requested operation
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcurementError {
    #[error("Insufficient budget: required {required}, available {available}")]
    BudgetShortfall { required: Decimal, available: Decimal },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Cannot {operation} while status is {current}")]
    StateConflict { current: String, operation: String },

    #[error("Over-receipt for '{material_name}': requested {requested}, remaining {remaining}")]
    OverReceipt {
        order_item_id: Uuid,
        material_name: String,
        requested: i64,
        remaining: i64,
    },

    #[error("Partial receive {partial_receive_id} has already been inspected")]
    DuplicateInspection { partial_receive_id: Uuid },

    #[error("Partial receive {partial_receive_id} already has a payment")]
    DuplicatePayment { partial_receive_id: Uuid },

    #[error("Payment of {requested} exceeds the allowed {max_allowed}")]
    PaymentExceedsValue {
        requested: Decimal,
        max_allowed: Decimal,
    },
}

impl ProcurementError {
    pub fn state_conflict(current: impl std::fmt::Display, operation: &str) -> Self {
        ProcurementError::StateConflict {
            current: current.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            ProcurementError::BudgetShortfall { .. } => "BUDGET_SHORTFALL",
            ProcurementError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ProcurementError::StateConflict { .. } => "STATE_CONFLICT",
            ProcurementError::OverReceipt { .. } => "OVER_RECEIPT",
            ProcurementError::DuplicateInspection { .. } => "DUPLICATE_INSPECTION",
            ProcurementError::DuplicatePayment { .. } => "DUPLICATE_PAYMENT",
            ProcurementError::PaymentExceedsValue { .. } => "PAYMENT_EXCEEDS_VALUE",
        }
    }

    /// Amount by which a budget check failed, if this is a shortfall
    pub fn shortfall(&self) -> Option<Decimal> {
        match self {
            ProcurementError::BudgetShortfall {
                required,
                available,
            } => Some(*required - *available),
            _ => None,
        }
    }

    /// Structured fields as JSON, for error response bodies
    pub fn details(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
