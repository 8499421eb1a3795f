//! Order lifecycle tests
//!
//! Tests for the purchase order state machine including:
//! - Allowed and refused status moves
//! - Editability and withdrawal rules
//! - Approval decisions and their capabilities

use proptest::prelude::*;
use shared::lifecycle::{self, ApprovalDecision, OrderAction};
use shared::{Capability, OrderStatus, ProcurementError, Role};
use std::str::FromStr;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn test_status_round_trips_through_storage_form() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(OrderStatus::from_str("shipped").is_err());
    }

    #[test]
    fn test_rejection_path() {
        let path = [Draft, Reserved, PendingApproval, Rejected, Revising, PendingApproval, Approved];
        for pair in path.windows(2) {
            assert!(lifecycle::transition(pair[0], pair[1]).is_ok(), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_refused_moves_report_both_ends() {
        assert_eq!(
            lifecycle::transition(Draft, Approved),
            Err(ProcurementError::InvalidTransition { from: Draft, to: Approved })
        );
        assert!(lifecycle::transition(Approved, Rejected).is_err());
        assert!(lifecycle::transition(Cancelled, Draft).is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(Cancelled.is_terminal());
        assert!(Completed.is_terminal());
        for status in OrderStatus::ALL {
            if status != Cancelled && status != Completed {
                assert!(!status.is_terminal(), "{} should not be terminal", status);
            }
        }
    }

    #[test]
    fn test_only_draft_rejected_revising_are_editable() {
        let editable: Vec<OrderStatus> = OrderStatus::ALL
            .into_iter()
            .filter(OrderStatus::is_editable)
            .collect();
        assert_eq!(editable, vec![Draft, Rejected, Revising]);

        assert!(lifecycle::ensure_editable(Revising).is_ok());
        assert_eq!(
            lifecycle::ensure_editable(Approved),
            Err(ProcurementError::state_conflict(Approved, "edit order"))
        );
    }

    #[test]
    fn test_budget_check_points() {
        assert!(lifecycle::requires_budget_check(Draft, Reserved));
        assert!(lifecycle::requires_budget_check(Rejected, Reserved));
        assert!(lifecycle::requires_budget_check(Rejected, Revising));
        assert!(lifecycle::requires_budget_check(Revising, PendingApproval));
        assert!(!lifecycle::requires_budget_check(Reserved, PendingApproval));
        assert!(!lifecycle::requires_budget_check(PendingApproval, Approved));
        assert!(!lifecycle::requires_budget_check(Draft, Cancelled));
    }

    #[test]
    fn test_withdraw_only_from_draft() {
        assert_eq!(OrderAction::Withdraw.apply(Draft), Ok(Cancelled));
        assert_eq!(
            OrderAction::Withdraw.apply(PendingApproval),
            Err(ProcurementError::state_conflict(PendingApproval, "withdraw order"))
        );
    }

    #[test]
    fn test_approval_decisions() {
        assert_eq!(ApprovalDecision::Approve.action().apply(PendingApproval), Ok(Approved));
        assert_eq!(ApprovalDecision::Reject.action().apply(PendingApproval), Ok(Rejected));
        assert_eq!(ApprovalDecision::Cancel.action().apply(PendingApproval), Ok(Cancelled));
        assert!(ApprovalDecision::Reject.requires_reason());
        assert!(!ApprovalDecision::Approve.requires_reason());

        // Decisions only apply to pending orders
        assert!(ApprovalDecision::Approve.action().apply(Reserved).is_err());
    }

    #[test]
    fn test_decision_deserializes_from_snake_case() {
        let decision: ApprovalDecision = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(decision, ApprovalDecision::Reject);
    }

    #[test]
    fn test_roles_cover_their_actions() {
        assert!(Role::Requester.has(OrderAction::Submit.required_capability().unwrap()));
        assert!(!Role::Requester.has(OrderAction::Approve.required_capability().unwrap()));
        assert!(Role::Officer.has(Capability::DecideApprovals));
        assert!(Role::Officer.has(Capability::ForwardOrders));
        assert!(Role::Inspector.has(Capability::InspectDeliveries));
        assert!(!Role::Inspector.has(Capability::ManagePayments));
        assert!(Role::Admin.has(Capability::ManageUsers));
        assert!(!Role::Officer.has(Capability::ManageUsers));
        assert_eq!(OrderAction::Complete.required_capability(), None);
    }

    #[test]
    fn test_receipts_and_payments_windows() {
        assert!(Approved.accepts_receipts());
        assert!(PartiallyPaid.accepts_receipts());
        assert!(!Completed.accepts_receipts());
        assert!(!PendingApproval.accepts_receipts());

        assert!(Completed.accepts_payments());
        assert!(!Rejected.accepts_payments());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn status_strategy() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(OrderStatus::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// transition succeeds exactly for pairs in the table
    #[test]
    fn prop_transition_follows_table(from in status_strategy(), to in status_strategy()) {
        let result = lifecycle::transition(from, to);
        prop_assert_eq!(result.is_ok(), from.allowed_next().contains(&to));
    }

    /// A status never lists itself as a next step
    #[test]
    fn prop_no_self_loops(status in status_strategy()) {
        prop_assert!(!status.can_transition_to(status));
    }

    /// Every status except Draft is reachable from Draft
    #[test]
    fn prop_reachable_from_draft(target in status_strategy()) {
        let mut seen = vec![OrderStatus::Draft];
        let mut frontier = vec![OrderStatus::Draft];
        while let Some(current) = frontier.pop() {
            for next in current.allowed_next() {
                if !seen.contains(next) {
                    seen.push(*next);
                    frontier.push(*next);
                }
            }
        }
        prop_assert!(seen.contains(&target));
    }
}
