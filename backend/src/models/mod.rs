//! Database models for the Campus Procurement service
//!
//! Re-exports models from the shared crate and adds the row types sqlx
//! decodes into. Statuses are stored as TEXT and parsed into the shared enums
//! on the way out; an unknown value is an internal error.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

pub use shared::models::*;

use crate::error::AppError;

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            role: Role::from_str(&row.role)?,
            department: row.department,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub project_code: String,
    pub name: String,
    pub responsible_person: Option<String>,
    pub total_budget: Decimal,
    pub reserved_budget: Decimal,
    pub spent_budget: Decimal,
    pub remaining_budget: Decimal,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = AppError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: row.id,
            project_code: row.project_code,
            name: row.name,
            responsible_person: row.responsible_person,
            total_budget: row.total_budget,
            reserved_budget: row.reserved_budget,
            spent_budget: row.spent_budget,
            remaining_budget: row.remaining_budget,
            status: ProjectStatus::from_str(&row.status)?,
            start_date: row.start_date,
            end_date: row.end_date,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub const PROJECT_COLUMNS: &str = "id, project_code, name, responsible_person, total_budget, \
     reserved_budget, spent_budget, remaining_budget, status, start_date, end_date, \
     created_by, created_at, updated_at";

#[derive(Debug, FromRow)]
pub struct ParticipantRow {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role_in_project: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ParticipantRow> for ProjectParticipant {
    type Error = AppError;

    fn try_from(row: ParticipantRow) -> Result<Self, Self::Error> {
        Ok(ProjectParticipant {
            project_id: row.project_id,
            user_id: row.user_id,
            role_in_project: ParticipantRole::from_str(&row.role_in_project)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub order_no: String,
    pub requester_id: Uuid,
    pub approver_id: Option<Uuid>,
    pub inspection_committee_id: Option<Uuid>,
    pub inspection_committee_name: Option<String>,
    pub reason: Option<String>,
    pub total_amount: Decimal,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub staff_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for PurchaseOrder {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(PurchaseOrder {
            id: row.id,
            project_id: row.project_id,
            order_no: row.order_no,
            requester_id: row.requester_id,
            approver_id: row.approver_id,
            inspection_committee_id: row.inspection_committee_id,
            inspection_committee_name: row.inspection_committee_name,
            reason: row.reason,
            total_amount: row.total_amount,
            status: OrderStatus::from_str(&row.status)?,
            rejection_reason: row.rejection_reason,
            staff_note: row.staff_note,
            created_at: row.created_at,
            updated_at: row.updated_at,
            submitted_at: row.submitted_at,
            decided_at: row.decided_at,
        })
    }
}

pub const ORDER_COLUMNS: &str = "id, project_id, order_no, requester_id, approver_id, \
     inspection_committee_id, inspection_committee_name, reason, total_amount, status, \
     rejection_reason, staff_note, created_at, updated_at, submitted_at, decided_at";

#[derive(Debug, FromRow)]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub material_name: String,
    pub quantity: i32,
    pub unit: String,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            material_name: row.material_name,
            quantity: row.quantity,
            unit: row.unit,
            unit_price: row.unit_price,
            total_price: row.total_price,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ReceiveRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub recorded_by: Uuid,
    pub committee_id: Option<Uuid>,
    pub receipt_no: Option<String>,
    pub receipt_file_path: Option<String>,
    pub status: String,
    pub received_at: DateTime<Utc>,
}

impl TryFrom<ReceiveRow> for PartialReceive {
    type Error = AppError;

    fn try_from(row: ReceiveRow) -> Result<Self, Self::Error> {
        Ok(PartialReceive {
            id: row.id,
            order_id: row.order_id,
            recorded_by: row.recorded_by,
            committee_id: row.committee_id,
            receipt_no: row.receipt_no,
            receipt_file_path: row.receipt_file_path,
            status: ReceiveStatus::from_str(&row.status)?,
            received_at: row.received_at,
        })
    }
}

pub const RECEIVE_COLUMNS: &str =
    "id, order_id, recorded_by, committee_id, receipt_no, receipt_file_path, status, received_at";

#[derive(Debug, FromRow)]
pub struct ReceiveItemRow {
    pub id: Uuid,
    pub partial_receive_id: Uuid,
    pub order_item_id: Uuid,
    pub material_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl From<ReceiveItemRow> for PartialReceiveItem {
    fn from(row: ReceiveItemRow) -> Self {
        PartialReceiveItem {
            line_value: shared::reconciliation::receive_line_value(
                i64::from(row.quantity),
                row.unit_price,
            ),
            id: row.id,
            partial_receive_id: row.partial_receive_id,
            order_item_id: row.order_item_id,
            material_name: row.material_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct InspectionRow {
    pub id: Uuid,
    pub partial_receive_id: Uuid,
    pub committee_id: Uuid,
    pub result: String,
    pub comment: Option<String>,
    pub inspected_at: DateTime<Utc>,
}

impl TryFrom<InspectionRow> for Inspection {
    type Error = AppError;

    fn try_from(row: InspectionRow) -> Result<Self, Self::Error> {
        Ok(Inspection {
            id: row.id,
            partial_receive_id: row.partial_receive_id,
            committee_id: row.committee_id,
            result: InspectionResult::from_str(&row.result)?,
            comment: row.comment,
            inspected_at: row.inspected_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub order_id: Uuid,
    pub partial_receive_id: Option<Uuid>,
    pub amount_paid: Decimal,
    pub status: String,
    pub created_by: Uuid,
    pub confirmed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            project_id: row.project_id,
            order_id: row.order_id,
            partial_receive_id: row.partial_receive_id,
            amount_paid: row.amount_paid,
            status: PaymentStatus::from_str(&row.status)?,
            created_by: row.created_by,
            confirmed_by: row.confirmed_by,
            created_at: row.created_at,
            paid_at: row.paid_at,
        })
    }
}

pub const PAYMENT_COLUMNS: &str = "id, project_id, order_id, partial_receive_id, amount_paid, \
     status, created_by, confirmed_by, created_at, paid_at";

#[derive(Debug, FromRow)]
pub struct OrderEventRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub action: String,
    pub from_status: Option<String>,
    pub to_status: String,
    pub actor_id: Uuid,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OrderEventRow> for OrderEvent {
    type Error = AppError;

    fn try_from(row: OrderEventRow) -> Result<Self, Self::Error> {
        Ok(OrderEvent {
            id: row.id,
            order_id: row.order_id,
            action: row.action,
            from_status: row
                .from_status
                .as_deref()
                .map(OrderStatus::from_str)
                .transpose()?,
            to_status: OrderStatus::from_str(&row.to_status)?,
            actor_id: row.actor_id,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

/// Convert a batch of rows, failing on the first bad status
pub fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}
