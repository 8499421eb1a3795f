//! Budget ledger service
//!
//! The stored reserved/spent/remaining figures on `projects` are a cache of
//! [`shared::ledger::recompute_reserved`] over the project's orders. Every
//! operation that can change them takes the project row lock first and calls
//! [`recompute_reserved_budget`] before committing.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::ledger::{self, BudgetPosition, OrderBudgetLine};
use shared::{Capability, OrderStatus, Project};
use sqlx::{FromRow, PgConnection, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{ProjectRow, PROJECT_COLUMNS};

/// Ledger service for budget positions and repairs
#[derive(Clone)]
pub struct LedgerService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct BudgetLineRow {
    id: Uuid,
    status: String,
    total_amount: Decimal,
    paid_amount: Decimal,
    unpaid_passed_value: Decimal,
}

/// Per-project line of the budget summary
#[derive(Debug, Clone, Serialize)]
pub struct ProjectBudget {
    pub project_id: Uuid,
    pub project_code: String,
    pub name: String,
    pub total_budget: Decimal,
    pub reserved_budget: Decimal,
    pub spent_budget: Decimal,
    pub remaining_budget: Decimal,
    pub usage_percent: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetSummary {
    pub currency: String,
    pub projects: Vec<ProjectBudget>,
    pub total_budget: Decimal,
    pub reserved_budget: Decimal,
    pub spent_budget: Decimal,
    pub remaining_budget: Decimal,
    pub usage_percent: Decimal,
}

/// Result of an administrative recompute
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub before: BudgetPosition,
    pub after: BudgetPosition,
    pub drifted: bool,
}

/// Lock the project row for the rest of the transaction
pub(crate) async fn lock_project(conn: &mut PgConnection, project_id: Uuid) -> AppResult<Project> {
    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {} FROM projects WHERE id = $1 FOR UPDATE",
        PROJECT_COLUMNS
    ))
    .bind(project_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Project".to_string()))?;

    Project::try_from(row)
}

/// Load what the ledger needs about every order of a project
pub(crate) async fn load_budget_lines(
    conn: &mut PgConnection,
    project_id: Uuid,
) -> AppResult<Vec<OrderBudgetLine>> {
    let rows = sqlx::query_as::<_, BudgetLineRow>(
        r#"
        SELECT o.id, o.status, o.total_amount,
               COALESCE((
                   SELECT SUM(p.amount_paid) FROM payments p WHERE p.order_id = o.id
               ), 0) AS paid_amount,
               COALESCE((
                   SELECT SUM(pri.quantity * oi.unit_price)
                   FROM partial_receives pr
                   JOIN inspections i ON i.partial_receive_id = pr.id AND i.result = 'pass'
                   JOIN partial_receive_items pri ON pri.partial_receive_id = pr.id
                   JOIN order_items oi ON oi.id = pri.order_item_id
                   WHERE pr.order_id = o.id
                     AND NOT EXISTS (
                         SELECT 1 FROM payments p WHERE p.partial_receive_id = pr.id
                     )
               ), 0) AS unpaid_passed_value
        FROM purchase_orders o
        WHERE o.project_id = $1
        "#,
    )
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| -> AppResult<OrderBudgetLine> {
            Ok(OrderBudgetLine {
                order_id: row.id,
                status: OrderStatus::from_str(&row.status)?,
                total_amount: row.total_amount,
                paid_amount: row.paid_amount,
                unpaid_passed_value: row.unpaid_passed_value,
            })
        })
        .collect()
}

async fn load_spent(conn: &mut PgConnection, project_id: Uuid) -> AppResult<Decimal> {
    let spent = sqlx::query_scalar::<_, Decimal>(
        "SELECT COALESCE(SUM(amount_paid), 0) FROM payments WHERE project_id = $1 AND status = 'paid'",
    )
    .bind(project_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(spent)
}

/// Derive the position from source rows without writing it
pub(crate) async fn compute_position(
    conn: &mut PgConnection,
    project: &Project,
) -> AppResult<BudgetPosition> {
    let lines = load_budget_lines(conn, project.id).await?;
    let spent = load_spent(conn, project.id).await?;
    Ok(BudgetPosition::compute(
        project.id,
        project.total_budget,
        &lines,
        spent,
    ))
}

/// Overwrite the project's stored figures with a fresh recompute.
/// The caller must hold the project lock.
pub(crate) async fn recompute_reserved_budget(
    conn: &mut PgConnection,
    project: &Project,
) -> AppResult<BudgetPosition> {
    let position = compute_position(conn, project).await?;

    sqlx::query(
        r#"
        UPDATE projects
        SET reserved_budget = $2, spent_budget = $3, remaining_budget = $4
        WHERE id = $1
        "#,
    )
    .bind(project.id)
    .bind(position.reserved_budget)
    .bind(position.spent_budget)
    .bind(position.remaining_budget)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        project_id = %project.id,
        reserved = %position.reserved_budget,
        spent = %position.spent_budget,
        remaining = %position.remaining_budget,
        "Budget recomputed"
    );

    Ok(position)
}

/// Refuse `required` unless it fits in what the project's other orders leave.
/// The caller must hold the project lock.
pub(crate) async fn ensure_affordable(
    conn: &mut PgConnection,
    project: &Project,
    order_id: Uuid,
    required: Decimal,
) -> AppResult<Decimal> {
    let lines = load_budget_lines(conn, project.id).await?;
    let others = ledger::reserved_excluding(&lines, order_id);
    let available = ledger::check_affordability(required, project.total_budget, others)?;
    Ok(available)
}

impl LedgerService {
    /// Create a new LedgerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Current position of one project, recomputed from source
    pub async fn get_remaining_budget(&self, project_id: Uuid) -> AppResult<BudgetPosition> {
        let mut conn = self.db.acquire().await?;
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {} FROM projects WHERE id = $1",
            PROJECT_COLUMNS
        ))
        .bind(project_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Project".to_string()))?;
        let project = Project::try_from(row)?;

        compute_position(&mut conn, &project).await
    }

    /// Stored figures for every project plus grand totals
    pub async fn get_budget_summary(&self, currency: &str) -> AppResult<BudgetSummary> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {} FROM projects ORDER BY project_code",
            PROJECT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        let projects: Vec<ProjectBudget> = rows
            .into_iter()
            .map(|row| ProjectBudget {
                usage_percent: ledger::usage_percent(row.reserved_budget, row.total_budget),
                project_id: row.id,
                project_code: row.project_code,
                name: row.name,
                total_budget: row.total_budget,
                reserved_budget: row.reserved_budget,
                spent_budget: row.spent_budget,
                remaining_budget: row.remaining_budget,
            })
            .collect();

        let total_budget: Decimal = projects.iter().map(|p| p.total_budget).sum();
        let reserved_budget: Decimal = projects.iter().map(|p| p.reserved_budget).sum();
        let spent_budget: Decimal = projects.iter().map(|p| p.spent_budget).sum();
        let remaining_budget: Decimal = projects.iter().map(|p| p.remaining_budget).sum();

        Ok(BudgetSummary {
            currency: currency.to_string(),
            usage_percent: ledger::usage_percent(reserved_budget, total_budget),
            projects,
            total_budget,
            reserved_budget,
            spent_budget,
            remaining_budget,
        })
    }

    /// Re-run the recompute under the project lock and report drift
    pub async fn reconcile_budget(&self, user: &AuthUser, project_id: Uuid) -> AppResult<Reconciliation> {
        user.require(Capability::ReconcileBudgets)?;

        let mut tx = self.db.begin().await?;
        let project = lock_project(&mut tx, project_id).await?;
        let before = BudgetPosition {
            project_id,
            total_budget: project.total_budget,
            reserved_budget: project.reserved_budget,
            spent_budget: project.spent_budget,
            remaining_budget: project.remaining_budget,
        };
        let after = recompute_reserved_budget(&mut tx, &project).await?;
        tx.commit().await?;

        let drifted = before != after;
        if drifted {
            tracing::warn!(
                project_id = %project_id,
                stored_reserved = %before.reserved_budget,
                reserved = %after.reserved_budget,
                "Stored budget had drifted; repaired"
            );
        } else {
            tracing::info!(project_id = %project_id, "Budget reconciled, no drift");
        }

        Ok(Reconciliation {
            before,
            after,
            drifted,
        })
    }
}
