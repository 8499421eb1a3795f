//! Purchase order service
//!
//! Owns the order lifecycle. Every status change runs through
//! [`transition_order`] inside a transaction that already holds the project
//! lock, and the budget ledger is recomputed before commit.

use serde::{Deserialize, Serialize};
use shared::lifecycle::{self, ApprovalDecision, OrderAction};
use shared::{
    generate_order_no, order_total, validate_order_items, validate_reason, Capability,
    NewOrderItem, OrderEvent, OrderItem, OrderStatus, PaginatedResponse, Pagination,
    PaginationMeta, Project, PurchaseOrder,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{convert_all, OrderItemRow, OrderRow, ORDER_COLUMNS};
use crate::services::ledger::{ensure_affordable, lock_project, recompute_reserved_budget};
use crate::services::order_history::{record_event, OrderHistoryService};
use crate::services::project::is_participant;
use crate::services::user::ensure_user_exists;

/// Purchase order service
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
}

/// An order together with its line items
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub items: Vec<OrderItem>,
}

/// Input for creating an order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub project_id: Uuid,
    pub items: Vec<NewOrderItem>,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
    pub inspection_committee_id: Option<Uuid>,
    #[validate(length(max = 200))]
    pub inspection_committee_name: Option<String>,
}

/// Input for replacing an editable order's content
#[derive(Debug, Deserialize, Validate)]
pub struct EditOrderInput {
    pub items: Vec<NewOrderItem>,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

/// Input for routing an order to approval
#[derive(Debug, Default, Deserialize, Validate)]
pub struct SendForApprovalInput {
    pub inspection_committee_id: Option<Uuid>,
    #[validate(length(max = 200))]
    pub inspection_committee_name: Option<String>,
}

/// Input for an approver's decision
#[derive(Debug, Deserialize, Validate)]
pub struct ApprovalDecisionInput {
    pub action: ApprovalDecision,
    pub reason: Option<String>,
    #[validate(length(max = 1000))]
    pub staff_note: Option<String>,
}

/// Input for forwarding an approved order to purchasing
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ForwardOrderInput {
    #[validate(length(max = 1000))]
    pub staff_note: Option<String>,
}

/// Filters for listing orders
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub project_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListOrdersQuery {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}

pub(crate) async fn fetch_order(conn: &mut PgConnection, order_id: Uuid, suffix: &str) -> AppResult<PurchaseOrder> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {} FROM purchase_orders WHERE id = $1 {}",
        ORDER_COLUMNS, suffix
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

    PurchaseOrder::try_from(row)
}

/// Lock the order row; callers that also need the project lock take it first
pub(crate) async fn lock_order(conn: &mut PgConnection, order_id: Uuid) -> AppResult<PurchaseOrder> {
    fetch_order(conn, order_id, "FOR UPDATE").await
}

/// Shared lock: the order's status cannot change until commit
pub(crate) async fn share_order(conn: &mut PgConnection, order_id: Uuid) -> AppResult<PurchaseOrder> {
    fetch_order(conn, order_id, "FOR SHARE").await
}

/// Project owning an order; the association never changes so no lock is taken
pub(crate) async fn project_id_of_order(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Uuid> {
    sqlx::query_scalar::<_, Uuid>("SELECT project_id FROM purchase_orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))
}

/// Take the project lock, then the order lock
pub(crate) async fn lock_project_and_order(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> AppResult<(Project, PurchaseOrder)> {
    let project_id = project_id_of_order(conn, order_id).await?;
    let project = lock_project(conn, project_id).await?;
    let order = lock_order(conn, order_id).await?;
    Ok((project, order))
}

pub(crate) async fn load_items(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT id, order_id, material_name, quantity, unit, unit_price, total_price
        FROM order_items
        WHERE order_id = $1
        ORDER BY position, id
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}

async fn insert_items(conn: &mut PgConnection, order_id: Uuid, items: &[NewOrderItem]) -> AppResult<()> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, material_name, quantity, unit, unit_price, total_price, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order_id)
        .bind(item.material_name.trim())
        .bind(item.quantity)
        .bind(item.unit.trim())
        .bind(item.unit_price)
        .bind(item.total_price())
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Apply `action` to a locked order: check the move, check affordability when
/// the order starts holding budget, write the status and the history entry.
/// The caller recomputes the ledger before committing.
pub(crate) async fn transition_order(
    conn: &mut PgConnection,
    project: &Project,
    order: &PurchaseOrder,
    action: OrderAction,
    actor_id: Uuid,
    note: Option<&str>,
) -> AppResult<OrderStatus> {
    let next = action.apply(order.status)?;

    if lifecycle::requires_budget_check(order.status, next) {
        ensure_affordable(conn, project, order.id, order.total_amount).await?;
    }

    sqlx::query("UPDATE purchase_orders SET status = $2 WHERE id = $1")
        .bind(order.id)
        .bind(next.as_str())
        .execute(&mut *conn)
        .await?;

    record_event(conn, order.id, action.as_str(), Some(order.status), next, actor_id, note).await?;

    Ok(next)
}

fn ensure_owner(user: &AuthUser, order: &PurchaseOrder) -> AppResult<()> {
    if order.requester_id == user.user_id {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions)
    }
}

/// Owners, assigned inspectors and anyone allowed to see every order
pub(crate) fn can_view(user: &AuthUser, order: &PurchaseOrder) -> bool {
    order.requester_id == user.user_id
        || user.can(Capability::ViewAllOrders)
        || (user.can(Capability::InspectDeliveries)
            && order.inspection_committee_id == Some(user.user_id))
}

fn validate_items(items: &[NewOrderItem]) -> AppResult<()> {
    validate_order_items(items)?;
    Ok(())
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a Draft order on an active project
    pub async fn create_order(&self, user: &AuthUser, input: CreateOrderInput) -> AppResult<OrderDetail> {
        user.require(Capability::CreateOrders)?;
        input.validate()?;
        validate_items(&input.items)?;

        let mut tx = self.db.begin().await?;

        // Project lock also serializes order numbering
        let project = lock_project(&mut tx, input.project_id).await?;
        if !project.status.accepts_orders() {
            return Err(shared::ProcurementError::state_conflict(project.status, "create order").into());
        }
        if !user.can(Capability::ManageProjects)
            && !is_participant(&mut tx, project.id, user.user_id, shared::ParticipantRole::Requester).await?
        {
            return Err(AppError::InsufficientPermissions);
        }
        if let Some(committee_id) = input.inspection_committee_id {
            ensure_user_exists(&mut tx, committee_id, "inspection_committee_id").await?;
        }

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM purchase_orders WHERE project_id = $1",
        )
        .bind(project.id)
        .fetch_one(&mut *tx)
        .await?;
        let order_no = generate_order_no(&project.project_code, existing + 1);
        let total = order_total(&input.items);

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO purchase_orders (
                project_id, order_no, requester_id, inspection_committee_id,
                inspection_committee_name, reason, total_amount, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'draft')
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(project.id)
        .bind(&order_no)
        .bind(user.user_id)
        .bind(input.inspection_committee_id)
        .bind(&input.inspection_committee_name)
        .bind(&input.reason)
        .bind(total)
        .fetch_one(&mut *tx)
        .await?;
        let order = PurchaseOrder::try_from(row)?;

        insert_items(&mut tx, order.id, &input.items).await?;
        record_event(&mut tx, order.id, "create", None, OrderStatus::Draft, user.user_id, None).await?;
        let items = load_items(&mut tx, order.id).await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            order_no = %order.order_no,
            project_id = %project.id,
            total = %total,
            "Order created"
        );

        Ok(OrderDetail { order, items })
    }

    /// Replace the line items of a Draft, Rejected or Revising order
    pub async fn edit_order(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: EditOrderInput,
    ) -> AppResult<OrderDetail> {
        user.require(Capability::CreateOrders)?;
        input.validate()?;
        validate_items(&input.items)?;

        let mut tx = self.db.begin().await?;
        let (project, order) = lock_project_and_order(&mut tx, order_id).await?;
        ensure_owner(user, &order)?;
        lifecycle::ensure_editable(order.status)?;

        let new_total = order_total(&input.items);

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order.id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, order.id, &input.items).await?;
        sqlx::query(
            "UPDATE purchase_orders SET total_amount = $2, reason = COALESCE($3, reason) WHERE id = $1",
        )
        .bind(order.id)
        .bind(new_total)
        .bind(&input.reason)
        .execute(&mut *tx)
        .await?;
        record_event(&mut tx, order.id, "edit", Some(order.status), order.status, user.user_id, None).await?;

        let edited = PurchaseOrder {
            total_amount: new_total,
            ..order.clone()
        };
        if order.status == OrderStatus::Rejected {
            transition_order(&mut tx, &project, &edited, OrderAction::Revise, user.user_id, None).await?;
        } else if order.status.counts_toward_reservation() {
            // Revising orders already hold budget; the new total must still fit
            ensure_affordable(&mut tx, &project, order.id, new_total).await?;
        }

        let position = recompute_reserved_budget(&mut tx, &project).await?;
        let order = fetch_order(&mut tx, order_id, "").await?;
        let items = load_items(&mut tx, order_id).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            status = %order.status,
            total = %new_total,
            remaining = %position.remaining_budget,
            "Order edited"
        );

        Ok(OrderDetail { order, items })
    }

    /// Draft / Rejected / Revising -> Reserved, reserving the order's total
    pub async fn submit_order(&self, user: &AuthUser, order_id: Uuid) -> AppResult<PurchaseOrder> {
        user.require(Capability::CreateOrders)?;

        let mut tx = self.db.begin().await?;
        let (project, order) = lock_project_and_order(&mut tx, order_id).await?;
        ensure_owner(user, &order)?;

        let next = transition_order(&mut tx, &project, &order, OrderAction::Submit, user.user_id, None).await?;
        sqlx::query("UPDATE purchase_orders SET submitted_at = NOW() WHERE id = $1")
            .bind(order.id)
            .execute(&mut *tx)
            .await?;

        let position = recompute_reserved_budget(&mut tx, &project).await?;
        let order = fetch_order(&mut tx, order_id, "").await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            project_id = %project.id,
            to = %next,
            amount = %order.total_amount,
            reserved = %position.reserved_budget,
            remaining = %position.remaining_budget,
            "Order submitted"
        );

        Ok(order)
    }

    /// Reserved / Revising -> Pending approval; a committee must be assigned
    pub async fn send_for_approval(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: SendForApprovalInput,
    ) -> AppResult<PurchaseOrder> {
        user.require(Capability::CreateOrders)?;
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let (project, order) = lock_project_and_order(&mut tx, order_id).await?;
        ensure_owner(user, &order)?;

        if let Some(committee_id) = input.inspection_committee_id {
            ensure_user_exists(&mut tx, committee_id, "inspection_committee_id").await?;
        }
        let order = PurchaseOrder {
            inspection_committee_id: input.inspection_committee_id.or(order.inspection_committee_id),
            inspection_committee_name: input
                .inspection_committee_name
                .or(order.inspection_committee_name),
            ..order
        };
        if !order.has_committee() {
            return Err(AppError::validation(
                "inspection_committee_id",
                "An inspection committee must be assigned before approval",
                "ต้องกำหนดคณะกรรมการตรวจรับก่อนส่งอนุมัติ",
            ));
        }

        sqlx::query(
            r#"
            UPDATE purchase_orders
            SET inspection_committee_id = $2, inspection_committee_name = $3
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.inspection_committee_id)
        .bind(&order.inspection_committee_name)
        .execute(&mut *tx)
        .await?;

        let next = transition_order(
            &mut tx,
            &project,
            &order,
            OrderAction::SendForApproval,
            user.user_id,
            None,
        )
        .await?;
        recompute_reserved_budget(&mut tx, &project).await?;
        let order = fetch_order(&mut tx, order_id, "").await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, to = %next, "Order sent for approval");

        Ok(order)
    }

    /// Approve, reject (reason required) or cancel a pending order
    pub async fn record_approval_decision(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: ApprovalDecisionInput,
    ) -> AppResult<PurchaseOrder> {
        user.require(Capability::DecideApprovals)?;
        input.validate()?;

        let reason = input.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        if input.action.requires_reason() {
            validate_reason(reason.unwrap_or_default()).map_err(|message| {
                AppError::validation("reason", message, "ต้องระบุเหตุผลในการส่งกลับแก้ไข")
            })?;
        }

        let mut tx = self.db.begin().await?;
        let (project, order) = lock_project_and_order(&mut tx, order_id).await?;
        let from = order.status;

        let action = input.action.action();
        let next = transition_order(&mut tx, &project, &order, action, user.user_id, reason).await?;

        sqlx::query(
            r#"
            UPDATE purchase_orders
            SET approver_id = $2,
                decided_at = NOW(),
                rejection_reason = CASE WHEN $3 THEN $4 ELSE rejection_reason END,
                staff_note = COALESCE($5, staff_note)
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(user.user_id)
        .bind(action == OrderAction::Reject)
        .bind(reason)
        .bind(&input.staff_note)
        .execute(&mut *tx)
        .await?;

        let position = recompute_reserved_budget(&mut tx, &project).await?;
        let order = fetch_order(&mut tx, order_id, "").await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            project_id = %project.id,
            from = %from,
            to = %next,
            reserved = %position.reserved_budget,
            remaining = %position.remaining_budget,
            "Approval decision recorded"
        );

        Ok(order)
    }

    /// Approved -> Processing
    pub async fn forward_order(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: ForwardOrderInput,
    ) -> AppResult<PurchaseOrder> {
        user.require(Capability::ForwardOrders)?;
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let (project, order) = lock_project_and_order(&mut tx, order_id).await?;
        transition_order(
            &mut tx,
            &project,
            &order,
            OrderAction::Forward,
            user.user_id,
            input.staff_note.as_deref(),
        )
        .await?;

        if let Some(note) = &input.staff_note {
            sqlx::query("UPDATE purchase_orders SET staff_note = $2 WHERE id = $1")
                .bind(order.id)
                .bind(note)
                .execute(&mut *tx)
                .await?;
        }

        let order = fetch_order(&mut tx, order_id, "").await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, "Order forwarded to purchasing");

        Ok(order)
    }

    /// Draft -> Cancelled by the requester
    pub async fn withdraw_order(&self, user: &AuthUser, order_id: Uuid) -> AppResult<PurchaseOrder> {
        user.require(Capability::CreateOrders)?;

        let mut tx = self.db.begin().await?;
        let (project, order) = lock_project_and_order(&mut tx, order_id).await?;
        ensure_owner(user, &order)?;
        transition_order(&mut tx, &project, &order, OrderAction::Withdraw, user.user_id, None).await?;
        recompute_reserved_budget(&mut tx, &project).await?;
        let order = fetch_order(&mut tx, order_id, "").await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, "Order withdrawn");

        Ok(order)
    }

    /// Get an order with its items
    pub async fn get_order(&self, user: &AuthUser, order_id: Uuid) -> AppResult<OrderDetail> {
        let mut conn = self.db.acquire().await?;
        let order = fetch_order(&mut conn, order_id, "").await?;
        if !can_view(user, &order) {
            return Err(AppError::InsufficientPermissions);
        }
        let items = load_items(&mut conn, order_id).await?;
        Ok(OrderDetail { order, items })
    }

    /// List orders visible to the caller
    pub async fn list_orders(
        &self,
        user: &AuthUser,
        query: ListOrdersQuery,
    ) -> AppResult<PaginatedResponse<PurchaseOrder>> {
        let pagination = query.pagination();
        let visible_to = (!user.can(Capability::ViewAllOrders)).then_some(user.user_id);
        let status = query.status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM purchase_orders
            WHERE ($1::uuid IS NULL OR project_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR requester_id = $3 OR inspection_committee_id = $3)
            "#,
        )
        .bind(query.project_id)
        .bind(status)
        .bind(visible_to)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {} FROM purchase_orders
            WHERE ($1::uuid IS NULL OR project_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR requester_id = $3 OR inspection_committee_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
            ORDER_COLUMNS
        ))
        .bind(query.project_id)
        .bind(status)
        .bind(visible_to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: convert_all(rows)?,
            pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
        })
    }

    /// Status history of an order, oldest first
    pub async fn get_order_history(&self, user: &AuthUser, order_id: Uuid) -> AppResult<Vec<OrderEvent>> {
        let mut conn = self.db.acquire().await?;
        let order = fetch_order(&mut conn, order_id, "").await?;
        if !can_view(user, &order) {
            return Err(AppError::InsufficientPermissions);
        }
        drop(conn);
        OrderHistoryService::new(self.db.clone()).list_events(order_id).await
    }
}

