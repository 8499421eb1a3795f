//! Validation utilities for Campus Procurement
//!
//! Field-level checks on what requesters and officers type in. Lifecycle and
//! budget refusals live in [`crate::error::ProcurementError`] instead.

use rust_decimal::Decimal;

use crate::models::{order_total, NewOrderItem};

pub const MAX_ITEMS_PER_ORDER: usize = 50;
pub const MAX_QUANTITY: i32 = 999_999;
pub const MAX_REASON_LENGTH: usize = 1_000;
pub const MAX_UNIT_LENGTH: usize = 50;

/// Largest money amount accepted anywhere: unit prices, line and order
/// totals, budgets, payments
pub fn max_amount() -> Decimal {
    Decimal::new(99_999_999_999, 2)
}

/// A validation failure pinned to an input field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: &'static str,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: &'static str) -> Self {
        Self {
            field: field.into(),
            message,
        }
    }
}

// ============================================================================
// Money
// ============================================================================

/// Positive, at most 999,999,999.99, at most two decimal places
pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Amount must be greater than zero");
    }
    if amount > max_amount() {
        return Err("Amount must not exceed 999,999,999.99");
    }
    if amount.normalize().scale() > 2 {
        return Err("Amount must have at most two decimal places");
    }
    Ok(())
}

/// Budget totals may be zero but never negative
pub fn validate_budget(total: Decimal) -> Result<(), &'static str> {
    if total < Decimal::ZERO {
        return Err("Budget cannot be negative");
    }
    if total > max_amount() {
        return Err("Budget must not exceed 999,999,999.99");
    }
    if total.normalize().scale() > 2 {
        return Err("Budget must have at most two decimal places");
    }
    Ok(())
}

// ============================================================================
// Order content
// ============================================================================

/// Reject text that looks like HTML markup
pub fn contains_markup(text: &str) -> bool {
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        let starts_tag = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!');
        if starts_tag && after.contains('>') {
            return true;
        }
        rest = after;
    }
    false
}

/// Material name: 3 to 200 characters after trimming, no markup
pub fn validate_material_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();
    if length < 3 {
        return Err("Material name must be at least 3 characters");
    }
    if length > 200 {
        return Err("Material name must be at most 200 characters");
    }
    if contains_markup(trimmed) {
        return Err("Material name must not contain HTML tags");
    }
    Ok(())
}

pub fn validate_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than zero");
    }
    if quantity > MAX_QUANTITY {
        return Err("Quantity must not exceed 999,999");
    }
    Ok(())
}

pub fn validate_unit(unit: &str) -> Result<(), &'static str> {
    let trimmed = unit.trim();
    if trimmed.is_empty() {
        return Err("Unit is required");
    }
    if trimmed.chars().count() > MAX_UNIT_LENGTH {
        return Err("Unit must be at most 50 characters");
    }
    Ok(())
}

/// Rejection reasons and purchase reasons: non-blank, bounded
pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err("Reason is required");
    }
    if trimmed.chars().count() > MAX_REASON_LENGTH {
        return Err("Reason must be at most 1,000 characters");
    }
    Ok(())
}

pub fn validate_order_item(item: &NewOrderItem) -> Result<(), FieldError> {
    validate_material_name(&item.material_name)
        .map_err(|m| FieldError::new("material_name", m))?;
    validate_quantity(item.quantity).map_err(|m| FieldError::new("quantity", m))?;
    validate_unit(&item.unit).map_err(|m| FieldError::new("unit", m))?;
    validate_amount(item.unit_price).map_err(|m| FieldError::new("unit_price", m))?;
    let line_total = Decimal::from(item.quantity).checked_mul(item.unit_price);
    if line_total.map_or(true, |total| total > max_amount()) {
        return Err(FieldError::new(
            "unit_price",
            "Line total must not exceed 999,999,999.99",
        ));
    }
    Ok(())
}

/// An order needs 1 to 50 valid items; errors name the failing item index
pub fn validate_order_items(items: &[NewOrderItem]) -> Result<(), FieldError> {
    validate_item_count(items.len(), MAX_ITEMS_PER_ORDER)?;
    for (index, item) in items.iter().enumerate() {
        validate_order_item(item).map_err(|e| {
            FieldError::new(format!("items[{}].{}", index, e.field), e.message)
        })?;
    }
    if order_total(items) > max_amount() {
        return Err(FieldError::new(
            "items",
            "Order total must not exceed 999,999,999.99",
        ));
    }
    Ok(())
}

/// Item count against a configurable ceiling
pub fn validate_item_count(count: usize, max_items: usize) -> Result<(), FieldError> {
    if count == 0 {
        return Err(FieldError::new("items", "At least one item is required"));
    }
    if count > max_items {
        return Err(FieldError::new("items", "Too many items on one order"));
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Project codes are uppercase letters, digits and dashes
pub fn validate_project_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 3 || code.len() > 30 {
        return Err("Project code must be 3 to 30 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Project code must be uppercase alphanumeric or '-'");
    }
    Ok(())
}
