//! Receiving and inspection service
//!
//! Deliveries arrive in batches. Each batch gets exactly one verdict; a
//! rejected batch gives its quantity back to the order, a passing batch may
//! complete the order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::lifecycle::OrderAction;
use shared::line_items::{self, ItemDelivery, ReceiptLine};
use shared::{
    Capability, Inspection, InspectionResult, OrderStatus, PartialReceive, PartialReceiveItem,
    Payment, ProcurementError, Project, PurchaseOrder, ReceiveStatus,
};
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    InspectionRow, OrderItemRow, PaymentRow, ReceiveItemRow, ReceiveRow, PAYMENT_COLUMNS,
    RECEIVE_COLUMNS,
};
use crate::services::ledger::{lock_project, recompute_reserved_budget};
use crate::services::order::{
    can_view, fetch_order, lock_order, project_id_of_order, share_order, transition_order,
};
use crate::services::user::ensure_user_exists;

/// Receiving service
#[derive(Clone)]
pub struct ReceivingService {
    db: PgPool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiveItemInput {
    pub order_item_id: Uuid,
    pub quantity: i32,
}

/// Input for recording a delivery batch
#[derive(Debug, Deserialize, Validate)]
pub struct RecordReceiveInput {
    pub committee_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub receipt_no: Option<String>,
    #[validate(length(max = 500))]
    pub receipt_file_path: Option<String>,
    pub items: Vec<ReceiveItemInput>,
}

/// Input for an inspection verdict
#[derive(Debug, Deserialize, Validate)]
pub struct RecordInspectionInput {
    pub result: InspectionResult,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

/// A batch with its lines, verdict and payment
#[derive(Debug, Clone, Serialize)]
pub struct ReceiveDetail {
    #[serde(flatten)]
    pub receive: PartialReceive,
    pub items: Vec<PartialReceiveItem>,
    pub total_value: Decimal,
    pub inspection: Option<Inspection>,
    pub payment: Option<Payment>,
}

#[derive(Debug, FromRow)]
struct ReceiptLineRow {
    order_item_id: Uuid,
    quantity: i32,
    result: Option<String>,
}

/// Every batch line recorded against an order, grouped by order item
pub(crate) async fn load_receipt_lines(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> AppResult<HashMap<Uuid, Vec<ReceiptLine>>> {
    let rows = sqlx::query_as::<_, ReceiptLineRow>(
        r#"
        SELECT pri.order_item_id, pri.quantity, i.result
        FROM partial_receive_items pri
        JOIN partial_receives pr ON pr.id = pri.partial_receive_id
        LEFT JOIN inspections i ON i.partial_receive_id = pr.id
        WHERE pr.order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut lines: HashMap<Uuid, Vec<ReceiptLine>> = HashMap::new();
    for row in rows {
        let verdict = row
            .result
            .as_deref()
            .map(InspectionResult::from_str)
            .transpose()?;
        lines.entry(row.order_item_id).or_default().push(ReceiptLine {
            quantity: i64::from(row.quantity),
            verdict,
        });
    }
    Ok(lines)
}

async fn load_order_items(conn: &mut PgConnection, order_id: Uuid, suffix: &str) -> AppResult<Vec<OrderItemRow>> {
    let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
        r#"
        SELECT id, order_id, material_name, quantity, unit, unit_price, total_price
        FROM order_items
        WHERE order_id = $1
        ORDER BY id
        {}
        "#,
        suffix
    ))
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Per-item delivery breakdown of an order
pub(crate) async fn load_deliveries(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<ItemDelivery>> {
    let items = load_order_items(conn, order_id, "").await?;
    let receipts = load_receipt_lines(conn, order_id).await?;
    Ok(items
        .into_iter()
        .map(|item| {
            ItemDelivery::from_receipts(
                item.id,
                item.material_name,
                i64::from(item.quantity),
                receipts.get(&item.id).map(Vec::as_slice).unwrap_or(&[]),
            )
        })
        .collect())
}

pub(crate) async fn lock_receive(conn: &mut PgConnection, receive_id: Uuid) -> AppResult<PartialReceive> {
    let row = sqlx::query_as::<_, ReceiveRow>(&format!(
        "SELECT {} FROM partial_receives WHERE id = $1 FOR UPDATE",
        RECEIVE_COLUMNS
    ))
    .bind(receive_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Partial receive".to_string()))?;

    PartialReceive::try_from(row)
}

pub(crate) async fn order_id_of_receive(conn: &mut PgConnection, receive_id: Uuid) -> AppResult<Uuid> {
    sqlx::query_scalar::<_, Uuid>("SELECT order_id FROM partial_receives WHERE id = $1")
        .bind(receive_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Partial receive".to_string()))
}

async fn load_receive_detail(conn: &mut PgConnection, receive_id: Uuid) -> AppResult<ReceiveDetail> {
    let row = sqlx::query_as::<_, ReceiveRow>(&format!(
        "SELECT {} FROM partial_receives WHERE id = $1",
        RECEIVE_COLUMNS
    ))
    .bind(receive_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Partial receive".to_string()))?;
    let receive = PartialReceive::try_from(row)?;

    let items: Vec<PartialReceiveItem> = sqlx::query_as::<_, ReceiveItemRow>(
        r#"
        SELECT pri.id, pri.partial_receive_id, pri.order_item_id, oi.material_name,
               pri.quantity, oi.unit_price
        FROM partial_receive_items pri
        JOIN order_items oi ON oi.id = pri.order_item_id
        WHERE pri.partial_receive_id = $1
        ORDER BY oi.position, oi.id
        "#,
    )
    .bind(receive_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(PartialReceiveItem::from)
    .collect();

    let inspection = sqlx::query_as::<_, InspectionRow>(
        r#"
        SELECT id, partial_receive_id, committee_id, result, comment, inspected_at
        FROM inspections WHERE partial_receive_id = $1
        "#,
    )
    .bind(receive_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(Inspection::try_from)
    .transpose()?;

    let payment = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {} FROM payments WHERE partial_receive_id = $1",
        PAYMENT_COLUMNS
    ))
    .bind(receive_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(Payment::try_from)
    .transpose()?;

    Ok(ReceiveDetail {
        total_value: items.iter().map(|i| i.line_value).sum(),
        receive,
        items,
        inspection,
        payment,
    })
}

fn validate_receive_items(items: &[ReceiveItemInput]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::validation(
            "items",
            "At least one item is required",
            "ต้องมีรายการรับอย่างน้อยหนึ่งรายการ",
        ));
    }
    let mut seen = HashSet::new();
    for (index, item) in items.iter().enumerate() {
        if item.quantity <= 0 {
            return Err(AppError::validation(
                format!("items[{}].quantity", index),
                "Quantity must be greater than zero",
                "จำนวนต้องมากกว่าศูนย์",
            ));
        }
        if !seen.insert(item.order_item_id) {
            return Err(AppError::validation(
                format!("items[{}].order_item_id", index),
                "Each order item may appear once per delivery",
                "รายการสินค้าซ้ำในการรับครั้งเดียวกัน",
            ));
        }
    }
    Ok(())
}

impl ReceivingService {
    /// Create a new ReceivingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a delivery batch against an approved order
    pub async fn record_partial_receive(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: RecordReceiveInput,
    ) -> AppResult<ReceiveDetail> {
        user.require(Capability::RecordReceipts)?;
        input.validate()?;
        validate_receive_items(&input.items)?;

        let mut tx = self.db.begin().await?;

        let order = share_order(&mut tx, order_id).await?;
        if !order.status.accepts_receipts() {
            return Err(ProcurementError::state_conflict(order.status, "record delivery").into());
        }

        // Item locks serialize concurrent deliveries against the same lines
        let order_items = load_order_items(&mut tx, order_id, "FOR UPDATE").await?;
        let receipts = load_receipt_lines(&mut tx, order_id).await?;

        for (index, requested) in input.items.iter().enumerate() {
            let item = order_items
                .iter()
                .find(|item| item.id == requested.order_item_id)
                .ok_or_else(|| {
                    AppError::validation(
                        format!("items[{}].order_item_id", index),
                        "Item does not belong to this order",
                        "รายการสินค้าไม่อยู่ในใบสั่งซื้อนี้",
                    )
                })?;
            line_items::check_receipt(
                item.id,
                &item.material_name,
                i64::from(item.quantity),
                receipts.get(&item.id).map(Vec::as_slice).unwrap_or(&[]),
                i64::from(requested.quantity),
            )?;
        }

        let committee_id = input.committee_id.or(order.inspection_committee_id);
        if let Some(committee_id) = input.committee_id {
            ensure_user_exists(&mut tx, committee_id, "committee_id").await?;
        }

        let receive_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO partial_receives (order_id, recorded_by, committee_id, receipt_no, receipt_file_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(order_id)
        .bind(user.user_id)
        .bind(committee_id)
        .bind(&input.receipt_no)
        .bind(&input.receipt_file_path)
        .fetch_one(&mut *tx)
        .await?;

        for item in &input.items {
            sqlx::query(
                r#"
                INSERT INTO partial_receive_items (partial_receive_id, order_item_id, quantity)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(receive_id)
            .bind(item.order_item_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        let detail = load_receive_detail(&mut tx, receive_id).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            partial_receive_id = %receive_id,
            lines = detail.items.len(),
            value = %detail.total_value,
            "Delivery recorded"
        );

        Ok(detail)
    }

    /// Record the single verdict on a batch
    pub async fn record_inspection(
        &self,
        user: &AuthUser,
        receive_id: Uuid,
        input: RecordInspectionInput,
    ) -> AppResult<ReceiveDetail> {
        user.require(Capability::InspectDeliveries)?;
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let order_id = order_id_of_receive(&mut tx, receive_id).await?;

        // A pass may complete the order and move the ledger, so it needs the
        // project lock; a rejection only pins the order status
        let (project, order): (Option<Project>, PurchaseOrder) = match input.result {
            InspectionResult::Pass => {
                let project_id = project_id_of_order(&mut tx, order_id).await?;
                let project = lock_project(&mut tx, project_id).await?;
                let order = lock_order(&mut tx, order_id).await?;
                (Some(project), order)
            }
            InspectionResult::Reject => (None, share_order(&mut tx, order_id).await?),
        };

        let receive = lock_receive(&mut tx, receive_id).await?;
        if receive.committee_id != Some(user.user_id) && !user.can(Capability::RecordReceipts) {
            return Err(AppError::InsufficientPermissions);
        }
        if receive.status != ReceiveStatus::PendingInspection {
            return Err(ProcurementError::DuplicateInspection {
                partial_receive_id: receive_id,
            }
            .into());
        }

        sqlx::query(
            r#"
            INSERT INTO inspections (partial_receive_id, committee_id, result, comment)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(receive_id)
        .bind(user.user_id)
        .bind(input.result.as_str())
        .bind(&input.comment)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::on_unique_violation(e, || {
                ProcurementError::DuplicateInspection {
                    partial_receive_id: receive_id,
                }
                .into()
            })
        })?;

        sqlx::query("UPDATE partial_receives SET status = $2 WHERE id = $1")
            .bind(receive_id)
            .bind(ReceiveStatus::Inspected.as_str())
            .execute(&mut *tx)
            .await?;

        if let Some(project) = &project {
            let deliveries = load_deliveries(&mut tx, order_id).await?;
            if line_items::is_fully_delivered(&deliveries)
                && order.status.can_transition_to(OrderStatus::Completed)
            {
                transition_order(
                    &mut tx,
                    project,
                    &order,
                    OrderAction::Complete,
                    user.user_id,
                    Some("All items delivered and passed inspection"),
                )
                .await?;
                tracing::info!(order_id = %order_id, "Order completed by final inspection");
            }
            recompute_reserved_budget(&mut tx, project).await?;
        }

        let detail = load_receive_detail(&mut tx, receive_id).await?;
        tx.commit().await?;

        tracing::info!(
            partial_receive_id = %receive_id,
            order_id = %order_id,
            result = %input.result,
            "Inspection recorded"
        );

        Ok(detail)
    }

    /// Remaining deliverable quantity of one order line
    pub async fn get_remaining_quantity(&self, user: &AuthUser, order_item_id: Uuid) -> AppResult<ItemDelivery> {
        let mut conn = self.db.acquire().await?;
        let order_id = sqlx::query_scalar::<_, Uuid>("SELECT order_id FROM order_items WHERE id = $1")
            .bind(order_item_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Order item".to_string()))?;

        self.ensure_visible(&mut conn, user, order_id).await?;

        load_deliveries(&mut conn, order_id)
            .await?
            .into_iter()
            .find(|d| d.order_item_id == order_item_id)
            .ok_or_else(|| AppError::NotFound("Order item".to_string()))
    }

    /// Delivery breakdown for every line of an order
    pub async fn get_order_deliveries(&self, user: &AuthUser, order_id: Uuid) -> AppResult<Vec<ItemDelivery>> {
        let mut conn = self.db.acquire().await?;
        self.ensure_visible(&mut conn, user, order_id).await?;
        load_deliveries(&mut conn, order_id).await
    }

    /// Batches recorded against an order, oldest first
    pub async fn list_receives(&self, user: &AuthUser, order_id: Uuid) -> AppResult<Vec<ReceiveDetail>> {
        let mut conn = self.db.acquire().await?;
        self.ensure_visible(&mut conn, user, order_id).await?;

        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM partial_receives WHERE order_id = $1 ORDER BY received_at",
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut details = Vec::with_capacity(ids.len());
        for id in ids {
            details.push(load_receive_detail(&mut conn, id).await?);
        }
        Ok(details)
    }

    pub async fn get_receive(&self, user: &AuthUser, receive_id: Uuid) -> AppResult<ReceiveDetail> {
        let mut conn = self.db.acquire().await?;
        let detail = load_receive_detail(&mut conn, receive_id).await?;
        if detail.receive.committee_id != Some(user.user_id) {
            self.ensure_visible(&mut conn, user, detail.receive.order_id).await?;
        }
        Ok(detail)
    }

    async fn ensure_visible(&self, conn: &mut PgConnection, user: &AuthUser, order_id: Uuid) -> AppResult<()> {
        let order = fetch_order(conn, order_id, "").await?;
        if can_view(user, &order) {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions)
        }
    }
}
