//! WebAssembly module for the Campus Procurement platform
//!
//! Lets the order form check its work before a round trip:
//! - Order totals and line validation
//! - Budget affordability and usage
//! - Remaining deliverable quantity
//! - Status labels and allowed moves

use rust_decimal::Decimal;
use std::str::FromStr;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::ledger;
use shared::line_items::{self, ReceiptLine};

fn js_error(message: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&message.to_string()).into()
}

fn parse_amount(field: &str, value: &str) -> Result<Decimal, JsValue> {
    Decimal::from_str(value.trim()).map_err(|_| js_error(format!("{}: not a number", field)))
}

fn parse_items(items_json: &str) -> Result<Vec<NewOrderItem>, JsValue> {
    serde_json::from_str(items_json).map_err(|e| js_error(format!("Invalid items JSON: {}", e)))
}

/// Order total of the given line items, as a decimal string
#[wasm_bindgen]
pub fn calculate_order_total(items_json: &str) -> Result<String, JsValue> {
    let items = parse_items(items_json)?;
    Ok(order_total(&items).to_string())
}

/// Validate line items; the error names the offending field
#[wasm_bindgen]
pub fn validate_items(items_json: &str) -> Result<(), JsValue> {
    let items = parse_items(items_json)?;
    validate_order_items(&items).map_err(|e| {
        web_sys::console::warn_1(&JsValue::from_str(&e.to_string()));
        js_error(e)
    })
}

/// Amount still available to `required` once other orders' reservations
/// are taken out. Fails with the shortfall as JSON.
#[wasm_bindgen]
pub fn check_affordability(
    required: &str,
    total_budget: &str,
    reserved_by_others: &str,
) -> Result<String, JsValue> {
    let required = parse_amount("required", required)?;
    let total_budget = parse_amount("total_budget", total_budget)?;
    let reserved_by_others = parse_amount("reserved_by_others", reserved_by_others)?;

    ledger::check_affordability(required, total_budget, reserved_by_others)
        .map(|available| available.to_string())
        .map_err(|e| match serde_json::to_string(&e) {
            Ok(json) => js_error(json),
            Err(_) => js_error(e),
        })
}

/// Reserved share of the total budget in percent, one decimal place
#[wasm_bindgen]
pub fn budget_usage_percent(reserved: &str, total_budget: &str) -> Result<String, JsValue> {
    let reserved = parse_amount("reserved", reserved)?;
    let total_budget = parse_amount("total_budget", total_budget)?;
    Ok(ledger::usage_percent(reserved, total_budget).to_string())
}

/// Quantity still deliverable given earlier batches
/// (`[{"quantity": 4, "verdict": "pass"}, ...]`, verdict null while pending)
#[wasm_bindgen]
pub fn calculate_remaining_quantity(ordered: i32, receipts_json: &str) -> Result<i32, JsValue> {
    let receipts: Vec<ReceiptLine> = serde_json::from_str(receipts_json)
        .map_err(|e| js_error(format!("Invalid receipts JSON: {}", e)))?;
    let remaining = line_items::remaining_quantity(i64::from(ordered), &receipts);
    i32::try_from(remaining).map_err(js_error)
}

/// Thai label for an order status
#[wasm_bindgen]
pub fn order_status_label(status: &str) -> Result<String, JsValue> {
    let status = OrderStatus::from_str(status).map_err(js_error)?;
    Ok(status.label_th().to_string())
}

/// Statuses reachable from `status`, as a JSON array
#[wasm_bindgen]
pub fn allowed_next_statuses(status: &str) -> Result<String, JsValue> {
    let status = OrderStatus::from_str(status).map_err(js_error)?;
    serde_json::to_string(status.allowed_next()).map_err(js_error)
}
