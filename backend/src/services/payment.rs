//! Payment service
//!
//! One payment per passed batch, never above the batch's value. Recording a
//! payment settles the order to PartiallyPaid or Completed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::lifecycle::OrderAction;
use shared::line_items;
use shared::reconciliation::{self, PayableReceive, PaymentTarget};
use shared::{
    validate_amount, Capability, InspectionResult, OrderStatus, Payment, PaymentStatus,
    ProcurementError,
};
use sqlx::{FromRow, PgConnection, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{convert_all, PaymentRow, PAYMENT_COLUMNS};
use crate::services::ledger::{lock_project, recompute_reserved_budget};
use crate::services::order::{can_view, fetch_order, lock_project_and_order, transition_order};
use crate::services::receiving::{load_deliveries, lock_receive, order_id_of_receive};

/// Payment service
#[derive(Clone)]
pub struct PaymentService {
    db: PgPool,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentInput {
    pub partial_receive_id: Uuid,
    pub amount_paid: Decimal,
}

/// A recorded payment and where it left the order
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub order_status: OrderStatus,
}

#[derive(Debug, FromRow)]
struct PayableRow {
    partial_receive_id: Uuid,
    order_id: Uuid,
    order_no: String,
    receipt_no: Option<String>,
    line_value: Decimal,
}

async fn load_payment_target(conn: &mut PgConnection, receive_id: Uuid) -> AppResult<PaymentTarget> {
    let verdict = sqlx::query_scalar::<_, String>(
        "SELECT result FROM inspections WHERE partial_receive_id = $1",
    )
    .bind(receive_id)
    .fetch_optional(&mut *conn)
    .await?
    .as_deref()
    .map(InspectionResult::from_str)
    .transpose()?;

    let already_paid = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM payments WHERE partial_receive_id = $1)",
    )
    .bind(receive_id)
    .fetch_one(&mut *conn)
    .await?;

    let line_value = sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(pri.quantity * oi.unit_price), 0)
        FROM partial_receive_items pri
        JOIN order_items oi ON oi.id = pri.order_item_id
        WHERE pri.partial_receive_id = $1
        "#,
    )
    .bind(receive_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(PaymentTarget {
        partial_receive_id: receive_id,
        verdict,
        already_paid,
        line_value,
    })
}

/// True when every passed batch of the order has a payment
async fn all_passed_paid(conn: &mut PgConnection, order_id: Uuid) -> AppResult<bool> {
    let unpaid = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM partial_receives pr
            JOIN inspections i ON i.partial_receive_id = pr.id AND i.result = 'pass'
            WHERE pr.order_id = $1
              AND NOT EXISTS (SELECT 1 FROM payments p WHERE p.partial_receive_id = pr.id)
        )
        "#,
    )
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(!unpaid)
}

impl PaymentService {
    /// Create a new PaymentService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Pay a passed batch and settle the order status
    pub async fn create_payment(&self, user: &AuthUser, input: CreatePaymentInput) -> AppResult<PaymentOutcome> {
        user.require(Capability::ManagePayments)?;
        validate_amount(input.amount_paid).map_err(|message| {
            AppError::validation("amount_paid", message, "จำนวนเงินไม่ถูกต้อง")
        })?;

        let receive_id = input.partial_receive_id;
        let mut tx = self.db.begin().await?;

        let order_id = order_id_of_receive(&mut tx, receive_id).await?;
        let (project, order) = lock_project_and_order(&mut tx, order_id).await?;
        if !order.status.accepts_payments() {
            return Err(ProcurementError::state_conflict(order.status, "record payment").into());
        }
        lock_receive(&mut tx, receive_id).await?;

        let target = load_payment_target(&mut tx, receive_id).await?;
        reconciliation::check_payment(&target, input.amount_paid)?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            INSERT INTO payments (project_id, order_id, partial_receive_id, amount_paid, status, created_by)
            VALUES ($1, $2, $3, $4, 'processing', $5)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(project.id)
        .bind(order.id)
        .bind(receive_id)
        .bind(input.amount_paid)
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::on_unique_violation(e, || {
                ProcurementError::DuplicatePayment {
                    partial_receive_id: receive_id,
                }
                .into()
            })
        })?;
        let payment = Payment::try_from(row)?;

        let deliveries = load_deliveries(&mut tx, order.id).await?;
        let fully_delivered = line_items::is_fully_delivered(&deliveries);
        let settled = all_passed_paid(&mut tx, order.id).await?;

        let order_status = match reconciliation::settle_status(order.status, fully_delivered, settled) {
            Some(next) => {
                let action = if next == OrderStatus::Completed {
                    OrderAction::Complete
                } else {
                    OrderAction::RecordPayment
                };
                transition_order(&mut tx, &project, &order, action, user.user_id, None).await?
            }
            None => order.status,
        };

        let position = recompute_reserved_budget(&mut tx, &project).await?;
        tx.commit().await?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = %order.id,
            partial_receive_id = %receive_id,
            amount = %payment.amount_paid,
            order_status = %order_status,
            reserved = %position.reserved_budget,
            "Payment recorded"
        );

        Ok(PaymentOutcome { payment, order_status })
    }

    /// Processing -> Paid
    pub async fn confirm_payment(&self, user: &AuthUser, payment_id: Uuid) -> AppResult<Payment> {
        user.require(Capability::ManagePayments)?;

        let mut tx = self.db.begin().await?;
        let project_id = sqlx::query_scalar::<_, Uuid>("SELECT project_id FROM payments WHERE id = $1")
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment".to_string()))?;
        let project = lock_project(&mut tx, project_id).await?;

        let current = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await?;
        let current = Payment::try_from(current)?;
        if !current.status.can_transition_to(PaymentStatus::Paid) {
            return Err(ProcurementError::state_conflict(current.status, "confirm payment").into());
        }

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            UPDATE payments
            SET status = 'paid', confirmed_by = $2, paid_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;
        let payment = Payment::try_from(row)?;

        let position = recompute_reserved_budget(&mut tx, &project).await?;
        tx.commit().await?;

        tracing::info!(
            payment_id = %payment.id,
            amount = %payment.amount_paid,
            spent = %position.spent_budget,
            "Payment confirmed"
        );

        Ok(payment)
    }

    pub async fn get_payment(&self, user: &AuthUser, payment_id: Uuid) -> AppResult<Payment> {
        let mut conn = self.db.acquire().await?;
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment".to_string()))?;
        let payment = Payment::try_from(row)?;

        let order = fetch_order(&mut conn, payment.order_id, "").await?;
        if !user.can(Capability::ManagePayments) && !can_view(user, &order) {
            return Err(AppError::InsufficientPermissions);
        }
        Ok(payment)
    }

    /// Payments of one order, oldest first
    pub async fn list_payments(&self, user: &AuthUser, order_id: Uuid) -> AppResult<Vec<Payment>> {
        let mut conn = self.db.acquire().await?;
        let order = fetch_order(&mut conn, order_id, "").await?;
        if !user.can(Capability::ManagePayments) && !can_view(user, &order) {
            return Err(AppError::InsufficientPermissions);
        }

        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE order_id = $1 ORDER BY created_at",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        convert_all(rows)
    }

    /// Passed batches of a project still waiting for payment
    pub async fn list_payable_receives(&self, user: &AuthUser, project_id: Uuid) -> AppResult<Vec<PayableReceive>> {
        user.require(Capability::ManagePayments)?;

        let rows = sqlx::query_as::<_, PayableRow>(
            r#"
            SELECT pr.id AS partial_receive_id, o.id AS order_id, o.order_no, pr.receipt_no,
                   COALESCE(SUM(pri.quantity * oi.unit_price), 0) AS line_value
            FROM partial_receives pr
            JOIN purchase_orders o ON o.id = pr.order_id
            JOIN inspections i ON i.partial_receive_id = pr.id AND i.result = 'pass'
            JOIN partial_receive_items pri ON pri.partial_receive_id = pr.id
            JOIN order_items oi ON oi.id = pri.order_item_id
            WHERE o.project_id = $1
              AND NOT EXISTS (SELECT 1 FROM payments p WHERE p.partial_receive_id = pr.id)
            GROUP BY pr.id, o.id, o.order_no, pr.receipt_no
            ORDER BY pr.received_at
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PayableReceive {
                partial_receive_id: row.partial_receive_id,
                order_id: row.order_id,
                order_no: row.order_no,
                receipt_no: row.receipt_no,
                line_value: row.line_value,
            })
            .collect())
    }
}
