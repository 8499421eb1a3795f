//! Payment reconciliation
//!
//! Payments are authorized against passed delivery value only. Each batch can
//! be paid once, for at most its own line value.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProcurementError;
use crate::models::{InspectionResult, OrderStatus};

/// Value of a batch line: received quantity at the order line's unit price
pub fn receive_line_value(quantity: i64, unit_price: Decimal) -> Decimal {
    Decimal::from(quantity) * unit_price
}

/// Total value of a batch from its (quantity, unit price) lines
pub fn receive_value(lines: impl IntoIterator<Item = (i64, Decimal)>) -> Decimal {
    lines
        .into_iter()
        .map(|(quantity, unit_price)| receive_line_value(quantity, unit_price))
        .sum()
}

/// Passed value still waiting to be paid, never negative
pub fn order_payable(passed_value: Decimal, paid_amount: Decimal) -> Decimal {
    (passed_value - paid_amount).max(Decimal::ZERO)
}

/// A passed batch that has no payment yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayableReceive {
    pub partial_receive_id: Uuid,
    pub order_id: Uuid,
    pub order_no: String,
    pub receipt_no: Option<String>,
    pub line_value: Decimal,
}

/// What payment authorization needs to know about the target batch
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentTarget {
    pub partial_receive_id: Uuid,
    pub verdict: Option<InspectionResult>,
    pub already_paid: bool,
    pub line_value: Decimal,
}

/// Authorize a payment of `amount` against a batch
pub fn check_payment(target: &PaymentTarget, amount: Decimal) -> Result<(), ProcurementError> {
    match target.verdict {
        Some(InspectionResult::Pass) => {}
        Some(InspectionResult::Reject) => {
            return Err(ProcurementError::state_conflict("rejected", "pay delivery"));
        }
        None => {
            return Err(ProcurementError::state_conflict(
                "pending_inspection",
                "pay delivery",
            ));
        }
    }
    if target.already_paid {
        return Err(ProcurementError::DuplicatePayment {
            partial_receive_id: target.partial_receive_id,
        });
    }
    if amount > target.line_value {
        return Err(ProcurementError::PaymentExceedsValue {
            requested: amount,
            max_allowed: target.line_value,
        });
    }
    Ok(())
}

/// Order status after a payment is recorded.
///
/// Returns `None` when the order should stay where it is. Completed orders
/// never move back.
pub fn settle_status(
    current: OrderStatus,
    fully_delivered: bool,
    all_passed_paid: bool,
) -> Option<OrderStatus> {
    if current == OrderStatus::Completed {
        return None;
    }
    let next = if fully_delivered && all_passed_paid {
        OrderStatus::Completed
    } else {
        OrderStatus::PartiallyPaid
    };
    (next != current).then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passed(line_value: i64) -> PaymentTarget {
        PaymentTarget {
            partial_receive_id: Uuid::new_v4(),
            verdict: Some(InspectionResult::Pass),
            already_paid: false,
            line_value: Decimal::from(line_value),
        }
    }

    #[test]
    fn test_payment_within_value_is_allowed() {
        assert!(check_payment(&passed(1_000), Decimal::from(1_000)).is_ok());
        assert!(check_payment(&passed(1_000), Decimal::from(900)).is_ok());
    }

    #[test]
    fn test_scenario_d_payment_exceeds_value() {
        let target = passed(500);
        assert_eq!(
            check_payment(&target, Decimal::from(600)),
            Err(ProcurementError::PaymentExceedsValue {
                requested: Decimal::from(600),
                max_allowed: Decimal::from(500),
            })
        );
    }

    #[test]
    fn test_second_payment_is_duplicate() {
        let mut target = passed(500);
        target.already_paid = true;
        assert_eq!(
            check_payment(&target, Decimal::from(100)),
            Err(ProcurementError::DuplicatePayment {
                partial_receive_id: target.partial_receive_id,
            })
        );
    }

    #[test]
    fn test_unpassed_batches_cannot_be_paid() {
        let mut target = passed(500);
        target.verdict = None;
        assert!(matches!(
            check_payment(&target, Decimal::from(1)),
            Err(ProcurementError::StateConflict { .. })
        ));
        target.verdict = Some(InspectionResult::Reject);
        assert!(matches!(
            check_payment(&target, Decimal::from(1)),
            Err(ProcurementError::StateConflict { .. })
        ));
    }

    #[test]
    fn test_receive_value() {
        let value = receive_value([(10, Decimal::from(100)), (2, Decimal::new(2550, 2))]);
        assert_eq!(value, Decimal::new(105100, 2));
        assert_eq!(order_payable(value, Decimal::from(2_000)), Decimal::ZERO);
    }

    #[test]
    fn test_settle_status() {
        use OrderStatus::*;
        assert_eq!(settle_status(Approved, false, false), Some(PartiallyPaid));
        assert_eq!(settle_status(Processing, true, true), Some(Completed));
        assert_eq!(settle_status(PartiallyPaid, true, false), None);
        assert_eq!(settle_status(PartiallyPaid, true, true), Some(Completed));
        assert_eq!(settle_status(Completed, false, false), None);
    }
}
