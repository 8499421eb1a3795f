//! Purchase order HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{validate_item_count, OrderEvent, PaginatedResponse, PurchaseOrder};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::order::{
    ApprovalDecisionInput, CreateOrderInput, EditOrderInput, ForwardOrderInput, ListOrdersQuery,
    OrderDetail, OrderService, SendForApprovalInput,
};
use crate::AppState;

/// Create a Draft order
pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<OrderDetail>)> {
    validate_item_count(input.items.len(), state.config.procurement.max_items_per_order)?;
    let service = OrderService::new(state.db);
    let order = service.create_order(&current_user.0, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List orders visible to the caller
pub async fn list_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListOrdersQuery>,
) -> AppResult<Json<PaginatedResponse<PurchaseOrder>>> {
    let service = OrderService::new(state.db);
    let orders = service.list_orders(&current_user.0, query).await?;
    Ok(Json(orders))
}

/// Get an order with its items
pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db);
    let order = service.get_order(&current_user.0, order_id).await?;
    Ok(Json(order))
}

/// Replace an editable order's items
pub async fn edit_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<EditOrderInput>,
) -> AppResult<Json<OrderDetail>> {
    validate_item_count(input.items.len(), state.config.procurement.max_items_per_order)?;
    let service = OrderService::new(state.db);
    let order = service.edit_order(&current_user.0, order_id, input).await?;
    Ok(Json(order))
}

/// Submit an order, reserving its total
pub async fn submit_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let service = OrderService::new(state.db);
    let order = service.submit_order(&current_user.0, order_id).await?;
    Ok(Json(order))
}

/// Route a reserved order to approval
pub async fn send_for_approval(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    input: Option<Json<SendForApprovalInput>>,
) -> AppResult<Json<PurchaseOrder>> {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    let service = OrderService::new(state.db);
    let order = service.send_for_approval(&current_user.0, order_id, input).await?;
    Ok(Json(order))
}

/// Approve, reject or cancel a pending order
pub async fn record_approval_decision(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<ApprovalDecisionInput>,
) -> AppResult<Json<PurchaseOrder>> {
    let service = OrderService::new(state.db);
    let order = service
        .record_approval_decision(&current_user.0, order_id, input)
        .await?;
    Ok(Json(order))
}

pub async fn forward_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    input: Option<Json<ForwardOrderInput>>,
) -> AppResult<Json<PurchaseOrder>> {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    let service = OrderService::new(state.db);
    let order = service.forward_order(&current_user.0, order_id, input).await?;
    Ok(Json(order))
}

pub async fn withdraw_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let service = OrderService::new(state.db);
    let order = service.withdraw_order(&current_user.0, order_id).await?;
    Ok(Json(order))
}

/// Status history of an order
pub async fn get_order_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<OrderEvent>>> {
    let service = OrderService::new(state.db);
    let events = service.get_order_history(&current_user.0, order_id).await?;
    Ok(Json(events))
}
