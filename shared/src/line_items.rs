//! Line item ledger
//!
//! Delivered quantities are summed from delivery batches on every call.
//! Rejected batches go back to the deliverable pool, so a late verdict can
//! free quantity that was counted a moment ago.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProcurementError;
use crate::models::InspectionResult;

/// One order line's share of one delivery batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub quantity: i64,
    /// `None` while the batch awaits inspection
    pub verdict: Option<InspectionResult>,
}

impl ReceiptLine {
    pub fn pending(quantity: i64) -> Self {
        Self {
            quantity,
            verdict: None,
        }
    }

    pub fn passed(quantity: i64) -> Self {
        Self {
            quantity,
            verdict: Some(InspectionResult::Pass),
        }
    }

    pub fn rejected(quantity: i64) -> Self {
        Self {
            quantity,
            verdict: Some(InspectionResult::Reject),
        }
    }

    /// Whether this quantity still occupies the ordered amount
    pub fn counts_against_order(&self) -> bool {
        self.verdict != Some(InspectionResult::Reject)
    }
}

/// Quantity breakdown for one order line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDelivery {
    pub order_item_id: Uuid,
    pub material_name: String,
    pub ordered: i64,
    pub pending: i64,
    pub passed: i64,
    pub rejected: i64,
    pub remaining: i64,
}

impl ItemDelivery {
    pub fn from_receipts(
        order_item_id: Uuid,
        material_name: impl Into<String>,
        ordered: i64,
        receipts: &[ReceiptLine],
    ) -> Self {
        let sum_where = |pred: fn(&ReceiptLine) -> bool| -> i64 {
            receipts.iter().filter(|r| pred(r)).map(|r| r.quantity).sum()
        };
        Self {
            order_item_id,
            material_name: material_name.into(),
            ordered,
            pending: sum_where(|r| r.verdict.is_none()),
            passed: sum_where(|r| r.verdict == Some(InspectionResult::Pass)),
            rejected: sum_where(|r| r.verdict == Some(InspectionResult::Reject)),
            remaining: remaining_quantity(ordered, receipts),
        }
    }

    pub fn is_fully_passed(&self) -> bool {
        self.passed >= self.ordered
    }
}

/// Ordered quantity minus everything not rejected, floored at zero
pub fn remaining_quantity(ordered: i64, receipts: &[ReceiptLine]) -> i64 {
    let occupied: i64 = receipts
        .iter()
        .filter(|r| r.counts_against_order())
        .map(|r| r.quantity)
        .sum();
    (ordered - occupied).max(0)
}

/// Quantity from batches that passed inspection
pub fn passed_quantity(receipts: &[ReceiptLine]) -> i64 {
    receipts
        .iter()
        .filter(|r| r.verdict == Some(InspectionResult::Pass))
        .map(|r| r.quantity)
        .sum()
}

/// Refuse a delivery line that would exceed what is still deliverable
pub fn check_receipt(
    order_item_id: Uuid,
    material_name: &str,
    ordered: i64,
    receipts: &[ReceiptLine],
    requested: i64,
) -> Result<(), ProcurementError> {
    let remaining = remaining_quantity(ordered, receipts);
    if requested > remaining {
        return Err(ProcurementError::OverReceipt {
            order_item_id,
            material_name: material_name.to_string(),
            requested,
            remaining,
        });
    }
    Ok(())
}

/// An order is fully delivered once every line has passed its ordered quantity
pub fn is_fully_delivered(items: &[ItemDelivery]) -> bool {
    !items.is_empty() && items.iter().all(ItemDelivery::is_fully_passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_batches_occupy_quantity() {
        let receipts = [ReceiptLine::pending(4)];
        assert_eq!(remaining_quantity(10, &receipts), 6);
        assert_eq!(passed_quantity(&receipts), 0);
    }

    #[test]
    fn test_rejected_batches_are_returned() {
        // Scenario C
        let receipts = [ReceiptLine::rejected(5)];
        assert_eq!(remaining_quantity(10, &receipts), 10);
    }

    #[test]
    fn test_redelivery_after_rejection() {
        let receipts = [ReceiptLine::rejected(10), ReceiptLine::passed(10)];
        assert_eq!(remaining_quantity(10, &receipts), 0);
        assert_eq!(passed_quantity(&receipts), 10);
    }

    #[test]
    fn test_over_receipt_names_item_and_remaining() {
        let id = Uuid::new_v4();
        let receipts = [ReceiptLine::passed(7)];
        let err = check_receipt(id, "Toner", 10, &receipts, 4).unwrap_err();
        assert_eq!(
            err,
            ProcurementError::OverReceipt {
                order_item_id: id,
                material_name: "Toner".to_string(),
                requested: 4,
                remaining: 3,
            }
        );
        assert!(check_receipt(id, "Toner", 10, &receipts, 3).is_ok());
    }

    #[test]
    fn test_item_delivery_breakdown() {
        let receipts = [
            ReceiptLine::passed(3),
            ReceiptLine::rejected(2),
            ReceiptLine::pending(4),
        ];
        let delivery = ItemDelivery::from_receipts(Uuid::new_v4(), "Chairs", 10, &receipts);
        assert_eq!(delivery.passed, 3);
        assert_eq!(delivery.rejected, 2);
        assert_eq!(delivery.pending, 4);
        assert_eq!(delivery.remaining, 3);
        assert!(!delivery.is_fully_passed());
    }

    #[test]
    fn test_fully_delivered_requires_every_line() {
        let done = ItemDelivery::from_receipts(Uuid::new_v4(), "A", 2, &[ReceiptLine::passed(2)]);
        let open = ItemDelivery::from_receipts(Uuid::new_v4(), "B", 2, &[ReceiptLine::pending(2)]);
        assert!(is_fully_delivered(&[done.clone()]));
        assert!(!is_fully_delivered(&[done, open]));
        assert!(!is_fully_delivered(&[]));
    }
}
