//! Delivery batch and inspection models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ParseEnumError;

/// Status of a delivery batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveStatus {
    PendingInspection,
    /// Terminal: the batch has its one verdict
    Inspected,
}

impl ReceiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiveStatus::PendingInspection => "pending_inspection",
            ReceiveStatus::Inspected => "inspected",
        }
    }
}

impl std::fmt::Display for ReceiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReceiveStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_inspection" => Ok(ReceiveStatus::PendingInspection),
            "inspected" => Ok(ReceiveStatus::Inspected),
            _ => Err(ParseEnumError::new("receive status", s)),
        }
    }
}

/// Inspection verdict for a whole delivery batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionResult {
    Pass,
    Reject,
}

impl InspectionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionResult::Pass => "pass",
            InspectionResult::Reject => "reject",
        }
    }
}

impl std::fmt::Display for InspectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InspectionResult {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(InspectionResult::Pass),
            "reject" => Ok(InspectionResult::Reject),
            _ => Err(ParseEnumError::new("inspection result", s)),
        }
    }
}

/// One physical delivery recorded against an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialReceive {
    pub id: Uuid,
    pub order_id: Uuid,
    pub recorded_by: Uuid,
    /// Committee member assigned to inspect this batch
    pub committee_id: Option<Uuid>,
    pub receipt_no: Option<String>,
    /// Reference into external receipt storage
    pub receipt_file_path: Option<String>,
    pub status: ReceiveStatus,
    pub received_at: DateTime<Utc>,
}

/// Quantity of one order line delivered in a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialReceiveItem {
    pub id: Uuid,
    pub partial_receive_id: Uuid,
    pub order_item_id: Uuid,
    pub material_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_value: Decimal,
}

/// The verdict on a delivery batch; immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inspection {
    pub id: Uuid,
    pub partial_receive_id: Uuid,
    pub committee_id: Uuid,
    pub result: InspectionResult,
    pub comment: Option<String>,
    pub inspected_at: DateTime<Utc>,
}
