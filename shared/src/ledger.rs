//! Budget ledger rules
//!
//! A project's reservation is never adjusted in place. It is summed from the
//! project's orders every time something changes, so the stored figure is
//! always a function of current order and payment state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProcurementError;
use crate::models::OrderStatus;

/// What the ledger needs to know about one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBudgetLine {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    /// Sum of every payment recorded against the order
    pub paid_amount: Decimal,
    /// Line value of passed deliveries that have no payment yet
    pub unpaid_passed_value: Decimal,
}

impl OrderBudgetLine {
    /// Amount this order holds against the project budget.
    ///
    /// Open orders hold their full estimated total. A completed order holds
    /// what was actually paid plus delivered value still awaiting payment,
    /// which releases any gap between estimate and actual price.
    pub fn contribution(&self) -> Decimal {
        if !self.status.counts_toward_reservation() {
            return Decimal::ZERO;
        }
        match self.status {
            OrderStatus::Completed => self.paid_amount + self.unpaid_passed_value,
            _ => self.total_amount,
        }
    }
}

/// Sum of contributions across a project's orders
pub fn recompute_reserved<'a>(lines: impl IntoIterator<Item = &'a OrderBudgetLine>) -> Decimal {
    lines.into_iter().map(OrderBudgetLine::contribution).sum()
}

/// Reservation held by every order except `order_id`
pub fn reserved_excluding(lines: &[OrderBudgetLine], order_id: Uuid) -> Decimal {
    recompute_reserved(lines.iter().filter(|line| line.order_id != order_id))
}

/// Check that `required` fits in what the other orders leave free.
/// Returns the available amount on success.
pub fn check_affordability(
    required: Decimal,
    total_budget: Decimal,
    reserved_by_others: Decimal,
) -> Result<Decimal, ProcurementError> {
    let available = (total_budget - reserved_by_others).max(Decimal::ZERO);
    if required > available {
        return Err(ProcurementError::BudgetShortfall {
            required,
            available,
        });
    }
    Ok(available)
}

/// A project's budget figures after a recompute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPosition {
    pub project_id: Uuid,
    pub total_budget: Decimal,
    pub reserved_budget: Decimal,
    pub spent_budget: Decimal,
    pub remaining_budget: Decimal,
}

impl BudgetPosition {
    /// Derive the position from the project's orders and confirmed spend.
    /// Spend is already inside the reservation of every counted order, so
    /// remaining is total minus reserved.
    pub fn compute(
        project_id: Uuid,
        total_budget: Decimal,
        lines: &[OrderBudgetLine],
        spent_budget: Decimal,
    ) -> Self {
        let reserved_budget = recompute_reserved(lines);
        Self {
            project_id,
            total_budget,
            reserved_budget,
            spent_budget,
            remaining_budget: total_budget - reserved_budget,
        }
    }

    /// Share of the budget already held, in percent with one decimal
    pub fn usage_percent(&self) -> Decimal {
        usage_percent(self.reserved_budget, self.total_budget)
    }

    pub fn is_overcommitted(&self) -> bool {
        self.remaining_budget < Decimal::ZERO
    }
}

pub fn usage_percent(reserved: Decimal, total: Decimal) -> Decimal {
    if total <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (reserved / total * Decimal::from(100)).round_dp(1)
}
