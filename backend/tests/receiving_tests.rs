//! Receiving and inspection tests
//!
//! Tests for partial deliveries including:
//! - Remaining quantity after pending, passed and rejected batches
//! - Over-receipt refusal
//! - Full delivery detection

use proptest::prelude::*;
use shared::line_items::{self, ItemDelivery, ReceiptLine};
use shared::{InspectionResult, ProcurementError};
use uuid::Uuid;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_pending_batches_occupy_quantity() {
        let receipts = [ReceiptLine::pending(6)];
        assert_eq!(line_items::remaining_quantity(10, &receipts), 4);
    }

    /// 10 ordered, 6 delivered: a delivery of 5 is refused with 4 remaining
    #[test]
    fn test_over_receipt_is_refused() {
        let item_id = Uuid::new_v4();
        let receipts = [ReceiptLine::passed(6)];

        let err = line_items::check_receipt(item_id, "Ethanol 1L", 10, &receipts, 5).unwrap_err();
        assert_eq!(
            err,
            ProcurementError::OverReceipt {
                order_item_id: item_id,
                material_name: "Ethanol 1L".to_string(),
                requested: 5,
                remaining: 4,
            }
        );
        assert_eq!(err.code(), "OVER_RECEIPT");
        assert!(line_items::check_receipt(item_id, "Ethanol 1L", 10, &receipts, 4).is_ok());
    }

    #[test]
    fn test_rejected_batch_can_be_redelivered() {
        let item_id = Uuid::new_v4();
        let receipts = [ReceiptLine::passed(4), ReceiptLine::rejected(6)];

        assert_eq!(line_items::remaining_quantity(10, &receipts), 6);
        assert!(line_items::check_receipt(item_id, "Gloves", 10, &receipts, 6).is_ok());
    }

    #[test]
    fn test_delivery_breakdown() {
        let receipts = [
            ReceiptLine::passed(3),
            ReceiptLine::rejected(2),
            ReceiptLine::pending(4),
        ];
        let delivery = ItemDelivery::from_receipts(Uuid::new_v4(), "Filter paper".to_string(), 10, &receipts);

        assert_eq!(delivery.passed, 3);
        assert_eq!(delivery.rejected, 2);
        assert_eq!(delivery.pending, 4);
        assert_eq!(delivery.remaining, 3);
        assert!(!delivery.is_fully_passed());
    }

    #[test]
    fn test_fully_delivered_needs_every_line_passed() {
        let done = ItemDelivery::from_receipts(Uuid::new_v4(), "A".to_string(), 5, &[ReceiptLine::passed(5)]);
        let awaiting = ItemDelivery::from_receipts(Uuid::new_v4(), "B".to_string(), 5, &[ReceiptLine::pending(5)]);

        assert!(line_items::is_fully_delivered(&[done.clone()]));
        assert!(!line_items::is_fully_delivered(&[done, awaiting]));
        assert!(!line_items::is_fully_delivered(&[]));
    }

    #[test]
    fn test_receipt_line_deserializes_verdict() {
        let line: ReceiptLine = serde_json::from_str(r#"{"quantity": 3, "verdict": "reject"}"#).unwrap();
        assert_eq!(line.verdict, Some(InspectionResult::Reject));
        assert!(!line.counts_against_order());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn receipt_strategy() -> impl Strategy<Value = ReceiptLine> {
    (1i64..50, prop::option::of(prop_oneof![Just(InspectionResult::Pass), Just(InspectionResult::Reject)]))
        .prop_map(|(quantity, verdict)| ReceiptLine { quantity, verdict })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Accepting only checked deliveries never lets non-rejected quantity
    /// exceed the ordered quantity
    #[test]
    fn prop_checked_receipts_never_exceed_order(
        ordered in 1i64..200,
        attempts in prop::collection::vec(receipt_strategy(), 0..30),
    ) {
        let item_id = Uuid::new_v4();
        let mut accepted: Vec<ReceiptLine> = Vec::new();

        for attempt in attempts {
            if line_items::check_receipt(item_id, "item", ordered, &accepted, attempt.quantity).is_ok() {
                accepted.push(attempt);
            }
            let occupied: i64 = accepted
                .iter()
                .filter(|r| r.counts_against_order())
                .map(|r| r.quantity)
                .sum();
            prop_assert!(occupied <= ordered);
        }
    }

    /// Remaining quantity stays within [0, ordered]
    #[test]
    fn prop_remaining_is_bounded(
        ordered in 0i64..200,
        receipts in prop::collection::vec(receipt_strategy(), 0..20),
    ) {
        let remaining = line_items::remaining_quantity(ordered, &receipts);
        prop_assert!(remaining >= 0);
        prop_assert!(remaining <= ordered);
    }
}
