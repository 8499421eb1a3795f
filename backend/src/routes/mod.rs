//! Route definitions for the procurement API

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - identity and user directory
        .route(
            "/me",
            get(handlers::me).route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .nest("/users", user_routes(state))
        // Protected routes - projects and their ledgers
        .nest("/projects", project_routes(state))
        .nest("/budget", budget_routes(state))
        // Protected routes - order lifecycle
        .nest("/orders", order_routes(state))
        .nest("/order-items", order_item_routes(state))
        // Protected routes - receiving and payments
        .nest("/receives", receive_routes(state))
        .nest("/payments", payment_routes(state))
}

/// User directory routes (protected)
fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route("/:user_id/role", put(handlers::update_user_role))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Project management routes (protected)
fn project_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_projects).post(handlers::create_project))
        .route(
            "/:project_id",
            get(handlers::get_project).put(handlers::update_project),
        )
        .route(
            "/:project_id/participants",
            get(handlers::list_participants).post(handlers::add_participant),
        )
        .route(
            "/:project_id/participants/:user_id",
            delete(handlers::remove_participant),
        )
        .route("/:project_id/budget", get(handlers::get_remaining_budget))
        .route("/:project_id/budget/reconcile", post(handlers::reconcile_budget))
        .route("/:project_id/payables", get(handlers::list_payable_receives))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Budget overview routes (protected)
fn budget_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/summary", get(handlers::get_budget_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Purchase order routes (protected)
fn order_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/:order_id", get(handlers::get_order).put(handlers::edit_order))
        .route("/:order_id/submit", post(handlers::submit_order))
        .route("/:order_id/send-for-approval", post(handlers::send_for_approval))
        .route("/:order_id/decision", post(handlers::record_approval_decision))
        .route("/:order_id/forward", post(handlers::forward_order))
        .route("/:order_id/withdraw", post(handlers::withdraw_order))
        .route("/:order_id/history", get(handlers::get_order_history))
        .route(
            "/:order_id/receives",
            get(handlers::list_receives).post(handlers::record_partial_receive),
        )
        .route("/:order_id/deliveries", get(handlers::get_order_deliveries))
        .route("/:order_id/payments", get(handlers::list_payments))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Order line routes (protected)
fn order_item_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/:order_item_id/remaining", get(handlers::get_remaining_quantity))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Delivery batch routes (protected)
fn receive_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/:receive_id", get(handlers::get_receive))
        .route("/:receive_id/inspection", post(handlers::record_inspection))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Payment routes (protected)
fn payment_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_payment))
        .route("/:payment_id", get(handlers::get_payment))
        .route("/:payment_id/confirm", post(handlers::confirm_payment))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
