//! Payment HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::reconciliation::PayableReceive;
use shared::Payment;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::payment::{CreatePaymentInput, PaymentOutcome, PaymentService};
use crate::AppState;

/// Record a payment against a passed batch
pub async fn create_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePaymentInput>,
) -> AppResult<(StatusCode, Json<PaymentOutcome>)> {
    let service = PaymentService::new(state.db);
    let outcome = service.create_payment(&current_user.0, input).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Confirm a processing payment as paid
pub async fn confirm_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<Payment>> {
    let service = PaymentService::new(state.db);
    let payment = service.confirm_payment(&current_user.0, payment_id).await?;
    Ok(Json(payment))
}

pub async fn get_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<Payment>> {
    let service = PaymentService::new(state.db);
    let payment = service.get_payment(&current_user.0, payment_id).await?;
    Ok(Json(payment))
}

/// Payments recorded against an order
pub async fn list_payments(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<Payment>>> {
    let service = PaymentService::new(state.db);
    let payments = service.list_payments(&current_user.0, order_id).await?;
    Ok(Json(payments))
}

/// Passed batches of a project awaiting payment
pub async fn list_payable_receives(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<PayableReceive>>> {
    let service = PaymentService::new(state.db);
    let payables = service
        .list_payable_receives(&current_user.0, project_id)
        .await?;
    Ok(Json(payables))
}
