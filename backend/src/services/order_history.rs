//! Order audit trail

use shared::{OrderEvent, OrderStatus};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{convert_all, OrderEventRow};

/// Append one history entry inside the caller's transaction
pub(crate) async fn record_event(
    conn: &mut PgConnection,
    order_id: Uuid,
    action: &str,
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    actor_id: Uuid,
    note: Option<&str>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_events (order_id, action, from_status, to_status, actor_id, note)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(order_id)
    .bind(action)
    .bind(from_status.map(|s| s.as_str()))
    .bind(to_status.as_str())
    .bind(actor_id)
    .bind(note)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Read side of the audit trail
#[derive(Clone)]
pub struct OrderHistoryService {
    db: PgPool,
}

impl OrderHistoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Entries for one order, oldest first
    pub async fn list_events(&self, order_id: Uuid) -> AppResult<Vec<OrderEvent>> {
        let rows = sqlx::query_as::<_, OrderEventRow>(
            r#"
            SELECT id, order_id, action, from_status, to_status, actor_id, note, created_at
            FROM order_events
            WHERE order_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }
}
