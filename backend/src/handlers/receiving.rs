//! Receiving and inspection HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::line_items::ItemDelivery;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::receiving::{
    ReceiveDetail, ReceivingService, RecordInspectionInput, RecordReceiveInput,
};
use crate::AppState;

/// Record a delivery batch against an order
pub async fn record_partial_receive(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<RecordReceiveInput>,
) -> AppResult<(StatusCode, Json<ReceiveDetail>)> {
    let service = ReceivingService::new(state.db);
    let receive = service
        .record_partial_receive(&current_user.0, order_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(receive)))
}

/// List the delivery batches of an order
pub async fn list_receives(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<ReceiveDetail>>> {
    let service = ReceivingService::new(state.db);
    let receives = service.list_receives(&current_user.0, order_id).await?;
    Ok(Json(receives))
}

/// Per-item delivery progress of an order
pub async fn get_order_deliveries(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<ItemDelivery>>> {
    let service = ReceivingService::new(state.db);
    let deliveries = service.get_order_deliveries(&current_user.0, order_id).await?;
    Ok(Json(deliveries))
}

pub async fn get_receive(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(receive_id): Path<Uuid>,
) -> AppResult<Json<ReceiveDetail>> {
    let service = ReceivingService::new(state.db);
    let receive = service.get_receive(&current_user.0, receive_id).await?;
    Ok(Json(receive))
}

/// Record the inspection verdict on a batch
pub async fn record_inspection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(receive_id): Path<Uuid>,
    Json(input): Json<RecordInspectionInput>,
) -> AppResult<(StatusCode, Json<ReceiveDetail>)> {
    let service = ReceivingService::new(state.db);
    let receive = service
        .record_inspection(&current_user.0, receive_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(receive)))
}

/// Remaining deliverable quantity of an order line
pub async fn get_remaining_quantity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_item_id): Path<Uuid>,
) -> AppResult<Json<ItemDelivery>> {
    let service = ReceivingService::new(state.db);
    let delivery = service
        .get_remaining_quantity(&current_user.0, order_item_id)
        .await?;
    Ok(Json(delivery))
}
