//! Budget ledger HTTP handlers

use axum::{
    extract::{Path, State},
    Json,
};
use shared::ledger::BudgetPosition;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::ledger::{BudgetSummary, LedgerService, Reconciliation};
use crate::AppState;

/// Current budget position of one project
pub async fn get_remaining_budget(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<BudgetPosition>> {
    let service = LedgerService::new(state.db);
    let position = service.get_remaining_budget(project_id).await?;
    Ok(Json(position))
}

/// Budget figures across all projects
pub async fn get_budget_summary(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<BudgetSummary>> {
    let service = LedgerService::new(state.db);
    let summary = service
        .get_budget_summary(&state.config.procurement.currency)
        .await?;
    Ok(Json(summary))
}

/// Recompute a project's stored figures from its orders and payments
pub async fn reconcile_budget(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Reconciliation>> {
    let service = LedgerService::new(state.db);
    let reconciliation = service.reconcile_budget(&current_user.0, project_id).await?;
    Ok(Json(reconciliation))
}
