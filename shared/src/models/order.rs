//! Purchase order models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::{round_money, ParseEnumError};

/// Status of a purchase order. Allowed moves live in [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Reserved,
    PendingApproval,
    Approved,
    Processing,
    Rejected,
    Revising,
    Cancelled,
    PartiallyPaid,
    Completed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 10] = [
        OrderStatus::Draft,
        OrderStatus::Reserved,
        OrderStatus::PendingApproval,
        OrderStatus::Approved,
        OrderStatus::Processing,
        OrderStatus::Rejected,
        OrderStatus::Revising,
        OrderStatus::Cancelled,
        OrderStatus::PartiallyPaid,
        OrderStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Reserved => "reserved",
            OrderStatus::PendingApproval => "pending_approval",
            OrderStatus::Approved => "approved",
            OrderStatus::Processing => "processing",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Revising => "revising",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::PartiallyPaid => "partially_paid",
            OrderStatus::Completed => "completed",
        }
    }

    /// Thai label shown to requesters
    pub fn label_th(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "ร่าง",
            OrderStatus::Reserved => "กันวงเงินแล้ว",
            OrderStatus::PendingApproval => "รออนุมัติ",
            OrderStatus::Approved => "อนุมัติแล้ว",
            OrderStatus::Processing => "ส่งดำเนินการจัดซื้อ",
            OrderStatus::Rejected => "ส่งกลับแก้ไข",
            OrderStatus::Revising => "กำลังแก้ไข",
            OrderStatus::Cancelled => "ไม่อนุมัติ",
            OrderStatus::PartiallyPaid => "จ่ายแล้วบางส่วน",
            OrderStatus::Completed => "เสร็จสิ้น",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("order status", s))
    }
}

/// A purchase order raised against a project budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Per-project document number (e.g., "PO-PRJ-2025-0001-0003")
    pub order_no: String,
    pub requester_id: Uuid,
    pub approver_id: Option<Uuid>,
    pub inspection_committee_id: Option<Uuid>,
    pub inspection_committee_name: Option<String>,
    pub reason: Option<String>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub rejection_reason: Option<String>,
    pub staff_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl PurchaseOrder {
    /// Whether an approver has an inspection committee to route the order to
    pub fn has_committee(&self) -> bool {
        self.inspection_committee_id.is_some()
            || self
                .inspection_committee_name
                .as_deref()
                .is_some_and(|name| !name.trim().is_empty())
    }
}

/// A material line on a purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub material_name: String,
    pub quantity: i32,
    pub unit: String,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// A material line as entered by a requester
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewOrderItem {
    #[validate(length(min = 3, max = 200))]
    pub material_name: String,
    #[validate(range(min = 1, max = 999_999))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 50))]
    pub unit: String,
    pub unit_price: Decimal,
}

impl NewOrderItem {
    pub fn total_price(&self) -> Decimal {
        line_total(self.quantity, self.unit_price)
    }
}

/// quantity × unit price, rounded to satang
pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    round_money(Decimal::from(quantity) * unit_price)
}

/// Order total as the sum of its line totals
pub fn order_total(items: &[NewOrderItem]) -> Decimal {
    items.iter().map(NewOrderItem::total_price).sum()
}

/// An entry in an order's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: Uuid,
    pub order_id: Uuid,
    pub action: String,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub actor_id: Uuid,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
