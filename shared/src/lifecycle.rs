//! Purchase order lifecycle
//!
//! Every status change goes through [`transition`], which checks the move
//! against a single table. Budget effects are not applied here: the ledger
//! recomputes reservations from order states after each successful move.

use serde::{Deserialize, Serialize};

use crate::error::ProcurementError;
use crate::models::{Capability, OrderStatus};

impl OrderStatus {
    /// Statuses reachable from this one in a single step
    pub fn allowed_next(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Draft => &[Reserved, Cancelled],
            Reserved => &[PendingApproval],
            PendingApproval => &[Approved, Rejected, Cancelled],
            Approved => &[Processing, PartiallyPaid, Completed],
            Processing => &[PartiallyPaid, Completed],
            Rejected => &[Revising, Reserved],
            Revising => &[Reserved, PendingApproval],
            PartiallyPaid => &[Completed],
            Cancelled | Completed => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Line items and total may only change in these states
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Draft | OrderStatus::Rejected | OrderStatus::Revising
        )
    }

    /// Whether the order's amount is part of the project reservation
    pub fn counts_toward_reservation(&self) -> bool {
        !matches!(self, OrderStatus::Draft | OrderStatus::Cancelled)
    }

    /// Deliveries may be recorded against the order
    pub fn accepts_receipts(&self) -> bool {
        matches!(
            self,
            OrderStatus::Approved | OrderStatus::Processing | OrderStatus::PartiallyPaid
        )
    }

    /// Payments may be attached (Completed orders may still settle unpaid batches)
    pub fn accepts_payments(&self) -> bool {
        matches!(
            self,
            OrderStatus::Approved
                | OrderStatus::Processing
                | OrderStatus::PartiallyPaid
                | OrderStatus::Completed
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }
}

/// Validate a single status move
pub fn transition(from: OrderStatus, to: OrderStatus) -> Result<OrderStatus, ProcurementError> {
    if from.can_transition_to(to) {
        Ok(to)
    } else {
        Err(ProcurementError::InvalidTransition { from, to })
    }
}

/// Moving an order out of an editable state into one that holds budget
/// requires the order's total to fit in what the project has left.
pub fn requires_budget_check(from: OrderStatus, to: OrderStatus) -> bool {
    from.is_editable() && to.counts_toward_reservation()
}

/// Refuse edits unless the order is still editable
pub fn ensure_editable(status: OrderStatus) -> Result<(), ProcurementError> {
    if status.is_editable() {
        Ok(())
    } else {
        Err(ProcurementError::state_conflict(status, "edit order"))
    }
}

/// Named operations that move an order between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Submit,
    Revise,
    Withdraw,
    SendForApproval,
    Approve,
    Reject,
    Cancel,
    Forward,
    RecordPayment,
    Complete,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Submit => "submit",
            OrderAction::Revise => "revise",
            OrderAction::Withdraw => "withdraw",
            OrderAction::SendForApproval => "send_for_approval",
            OrderAction::Approve => "approve",
            OrderAction::Reject => "reject",
            OrderAction::Cancel => "cancel",
            OrderAction::Forward => "forward",
            OrderAction::RecordPayment => "record_payment",
            OrderAction::Complete => "complete",
        }
    }

    pub fn target(&self) -> OrderStatus {
        match self {
            OrderAction::Submit => OrderStatus::Reserved,
            OrderAction::Revise => OrderStatus::Revising,
            OrderAction::Withdraw => OrderStatus::Cancelled,
            OrderAction::SendForApproval => OrderStatus::PendingApproval,
            OrderAction::Approve => OrderStatus::Approved,
            OrderAction::Reject => OrderStatus::Rejected,
            OrderAction::Cancel => OrderStatus::Cancelled,
            OrderAction::Forward => OrderStatus::Processing,
            OrderAction::RecordPayment => OrderStatus::PartiallyPaid,
            OrderAction::Complete => OrderStatus::Completed,
        }
    }

    /// Capability the caller must hold; `None` for moves the system makes itself
    pub fn required_capability(&self) -> Option<Capability> {
        match self {
            OrderAction::Submit
            | OrderAction::Revise
            | OrderAction::Withdraw
            | OrderAction::SendForApproval => Some(Capability::CreateOrders),
            OrderAction::Approve | OrderAction::Reject | OrderAction::Cancel => {
                Some(Capability::DecideApprovals)
            }
            OrderAction::Forward => Some(Capability::ForwardOrders),
            OrderAction::RecordPayment => Some(Capability::ManagePayments),
            OrderAction::Complete => None,
        }
    }

    /// Resolve the action against the current status
    pub fn apply(&self, from: OrderStatus) -> Result<OrderStatus, ProcurementError> {
        if *self == OrderAction::Withdraw && from != OrderStatus::Draft {
            return Err(ProcurementError::state_conflict(from, "withdraw order"));
        }
        transition(from, self.target())
    }
}

/// An approver's verdict on a pending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Reject,
    Cancel,
}

impl ApprovalDecision {
    pub fn action(&self) -> OrderAction {
        match self {
            ApprovalDecision::Approve => OrderAction::Approve,
            ApprovalDecision::Reject => OrderAction::Reject,
            ApprovalDecision::Cancel => OrderAction::Cancel,
        }
    }

    /// Rejections must say what to fix
    pub fn requires_reason(&self) -> bool {
        matches!(self, ApprovalDecision::Reject)
    }
}
