//! Database integration tests
//!
//! Run against a disposable PostgreSQL database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use procurement_backend::error::AppError;
use procurement_backend::middleware::AuthUser;
use procurement_backend::services::ledger::LedgerService;
use procurement_backend::services::order::{
    ApprovalDecisionInput, CreateOrderInput, EditOrderInput, ForwardOrderInput, OrderService,
    SendForApprovalInput,
};
use procurement_backend::services::payment::{CreatePaymentInput, PaymentService};
use procurement_backend::services::project::{AddParticipantInput, CreateProjectInput, ProjectService};
use procurement_backend::services::receiving::{
    ReceiveItemInput, ReceivingService, RecordInspectionInput, RecordReceiveInput,
};
use rust_decimal::Decimal;
use shared::lifecycle::ApprovalDecision;
use shared::{
    InspectionResult, NewOrderItem, OrderStatus, ParticipantRole, ProcurementError, Role,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::str::FromStr;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("database connection");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
    pool
}

async fn seed_user(pool: &PgPool, role: Role) -> AuthUser {
    let id = Uuid::new_v4();
    let email = format!("{}@campus.test", id);
    sqlx::query("INSERT INTO users (id, email, full_name, role) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(&email)
        .bind(format!("{} user", role.as_str()))
        .bind(role.as_str())
        .execute(pool)
        .await
        .unwrap();
    AuthUser {
        user_id: id,
        email,
        role,
    }
}

struct Fixture {
    pool: PgPool,
    officer: AuthUser,
    requester: AuthUser,
    inspector: AuthUser,
    project_id: Uuid,
}

async fn fixture(total_budget: &str) -> Fixture {
    let pool = pool().await;
    let officer = seed_user(&pool, Role::Officer).await;
    let requester = seed_user(&pool, Role::Requester).await;
    let inspector = seed_user(&pool, Role::Inspector).await;

    let projects = ProjectService::new(pool.clone());
    let project = projects
        .create_project(
            &officer,
            CreateProjectInput {
                project_code: Some(format!("T-{}", &Uuid::new_v4().simple().to_string()[..8]).to_uppercase()),
                name: "Chemistry teaching lab".to_string(),
                responsible_person: None,
                total_budget: dec(total_budget),
                status: Some(shared::ProjectStatus::Active),
                start_date: None,
                end_date: None,
            },
        )
        .await
        .unwrap();
    projects
        .add_participant(
            &officer,
            project.id,
            AddParticipantInput {
                user_id: requester.user_id,
                role_in_project: ParticipantRole::Requester,
            },
        )
        .await
        .unwrap();

    Fixture {
        pool,
        officer,
        requester,
        inspector,
        project_id: project.id,
    }
}

fn item(name: &str, quantity: i32, unit_price: &str) -> NewOrderItem {
    NewOrderItem {
        material_name: name.to_string(),
        quantity,
        unit: "piece".to_string(),
        unit_price: dec(unit_price),
    }
}

async fn draft(f: &Fixture, items: Vec<NewOrderItem>) -> Uuid {
    OrderService::new(f.pool.clone())
        .create_order(
            &f.requester,
            CreateOrderInput {
                project_id: f.project_id,
                items,
                reason: Some("Semester restock".to_string()),
                inspection_committee_id: Some(f.inspector.user_id),
                inspection_committee_name: None,
            },
        )
        .await
        .unwrap()
        .order
        .id
}

/// Stored project figures must equal a fresh recompute; returns the
/// stored reservation
async fn stored_reserved(f: &Fixture) -> Decimal {
    let (reserved, spent, remaining): (Decimal, Decimal, Decimal) = sqlx::query_as(
        "SELECT reserved_budget, spent_budget, remaining_budget FROM projects WHERE id = $1",
    )
    .bind(f.project_id)
    .fetch_one(&f.pool)
    .await
    .unwrap();

    let recomputed = LedgerService::new(f.pool.clone())
        .get_remaining_budget(f.project_id)
        .await
        .unwrap();
    assert_eq!(reserved, recomputed.reserved_budget, "stored reserved drifted");
    assert_eq!(spent, recomputed.spent_budget, "stored spent drifted");
    assert_eq!(remaining, recomputed.remaining_budget, "stored remaining drifted");
    reserved
}

async fn payment_rows(f: &Fixture, order_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(&f.pool)
        .await
        .unwrap()
}

fn decision(action: ApprovalDecision, reason: Option<&str>) -> ApprovalDecisionInput {
    ApprovalDecisionInput {
        action,
        reason: reason.map(str::to_string),
        staff_note: None,
    }
}

fn batch(order_item_id: Uuid, quantity: i32) -> RecordReceiveInput {
    RecordReceiveInput {
        committee_id: None,
        receipt_no: None,
        receipt_file_path: None,
        items: vec![ReceiveItemInput {
            order_item_id,
            quantity,
        }],
    }
}

fn verdict(result: InspectionResult) -> RecordInspectionInput {
    RecordInspectionInput { result, comment: None }
}

fn payment(partial_receive_id: Uuid, amount: &str) -> CreatePaymentInput {
    CreatePaymentInput {
        partial_receive_id,
        amount_paid: dec(amount),
    }
}

async fn first_item(f: &Fixture, order_id: Uuid) -> Uuid {
    OrderService::new(f.pool.clone())
        .get_order(&f.requester, order_id)
        .await
        .unwrap()
        .items[0]
        .id
}

/// Draft -> Approved -> Processing
async fn approved(f: &Fixture, items: Vec<NewOrderItem>) -> Uuid {
    let orders = OrderService::new(f.pool.clone());
    let id = draft(f, items).await;
    orders.submit_order(&f.requester, id).await.unwrap();
    orders
        .send_for_approval(&f.requester, id, SendForApprovalInput::default())
        .await
        .unwrap();
    orders
        .record_approval_decision(
            &f.officer,
            id,
            ApprovalDecisionInput {
                action: ApprovalDecision::Approve,
                reason: None,
                staff_note: None,
            },
        )
        .await
        .unwrap();
    orders
        .forward_order(&f.officer, id, ForwardOrderInput::default())
        .await
        .unwrap();
    id
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_submissions_cannot_overspend() {
    let f = fixture("100000").await;
    let first = draft(&f, vec![item("Fume hood filter", 6, "10000")]).await;
    let second = draft(&f, vec![item("Centrifuge rotor", 6, "10000")]).await;

    let orders = OrderService::new(f.pool.clone());
    let (a, b) = tokio::join!(
        orders.submit_order(&f.requester, first),
        orders.submit_order(&f.requester, second),
    );

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1, "exactly one submission fits");
    let refused = if a.is_err() { a } else { b };
    assert!(matches!(
        refused,
        Err(AppError::Procurement(ProcurementError::BudgetShortfall { .. }))
    ));

    let position = LedgerService::new(f.pool.clone())
        .get_remaining_budget(f.project_id)
        .await
        .unwrap();
    assert_eq!(position.reserved_budget, dec("60000"));
    assert_eq!(position.remaining_budget, dec("40000"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_rejection_requires_reason_and_keeps_reservation() {
    let f = fixture("100000").await;
    let orders = OrderService::new(f.pool.clone());
    let id = draft(&f, vec![item("Microscope slide box", 10, "1500")]).await;
    orders.submit_order(&f.requester, id).await.unwrap();
    orders
        .send_for_approval(&f.requester, id, SendForApprovalInput::default())
        .await
        .unwrap();

    let no_reason = orders
        .record_approval_decision(
            &f.officer,
            id,
            ApprovalDecisionInput {
                action: ApprovalDecision::Reject,
                reason: Some("   ".to_string()),
                staff_note: None,
            },
        )
        .await;
    assert!(matches!(no_reason, Err(AppError::Validation { .. })));

    let rejected = orders
        .record_approval_decision(
            &f.officer,
            id,
            ApprovalDecisionInput {
                action: ApprovalDecision::Reject,
                reason: Some("Quote a second supplier".to_string()),
                staff_note: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, OrderStatus::Rejected);

    let position = LedgerService::new(f.pool.clone())
        .get_remaining_budget(f.project_id)
        .await
        .unwrap();
    assert_eq!(position.reserved_budget, dec("15000"));

    let history = orders.get_order_history(&f.requester, id).await.unwrap();
    let actions: Vec<&str> = history.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["create", "submit", "send_for_approval", "reject"]);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_delivery_inspection_and_payment_flow() {
    let f = fixture("100000").await;
    let order_id = approved(&f, vec![item("Nitrile gloves", 10, "250")]).await;
    let order = OrderService::new(f.pool.clone())
        .get_order(&f.requester, order_id)
        .await
        .unwrap();
    let order_item_id = order.items[0].id;

    let receiving = ReceivingService::new(f.pool.clone());
    let payments = PaymentService::new(f.pool.clone());

    let batch = |quantity| RecordReceiveInput {
        committee_id: None,
        receipt_no: None,
        receipt_file_path: None,
        items: vec![ReceiveItemInput {
            order_item_id,
            quantity,
        }],
    };

    let first = assert_ok!(receiving.record_partial_receive(&f.officer, order_id, batch(6)).await);
    assert_eq!(first.total_value, dec("1500"));

    let over = receiving.record_partial_receive(&f.officer, order_id, batch(5)).await;
    assert!(matches!(
        over,
        Err(AppError::Procurement(ProcurementError::OverReceipt { requested: 5, remaining: 4, .. }))
    ));

    // Paying before inspection is refused
    assert_err!(
        payments
            .create_payment(
                &f.officer,
                CreatePaymentInput {
                    partial_receive_id: first.receive.id,
                    amount_paid: dec("1500"),
                },
            )
            .await
    );

    let pass = |result| RecordInspectionInput { result, comment: None };
    assert_ok!(receiving.record_inspection(&f.inspector, first.receive.id, pass(InspectionResult::Pass)).await);
    let again = receiving
        .record_inspection(&f.inspector, first.receive.id, pass(InspectionResult::Reject))
        .await;
    assert!(matches!(
        again,
        Err(AppError::Procurement(ProcurementError::DuplicateInspection { .. }))
    ));

    let paid = payments
        .create_payment(
            &f.officer,
            CreatePaymentInput {
                partial_receive_id: first.receive.id,
                amount_paid: dec("1500"),
            },
        )
        .await
        .unwrap();
    assert_eq!(paid.order_status, OrderStatus::PartiallyPaid);

    let second = receiving
        .record_partial_receive(&f.officer, order_id, batch(4))
        .await
        .unwrap();
    receiving
        .record_inspection(&f.inspector, second.receive.id, pass(InspectionResult::Pass))
        .await
        .unwrap();

    let settled = payments
        .create_payment(
            &f.officer,
            CreatePaymentInput {
                partial_receive_id: second.receive.id,
                amount_paid: dec("900"),
            },
        )
        .await
        .unwrap();
    assert_eq!(settled.order_status, OrderStatus::Completed);

    // Completed at 2,400 against an estimate of 2,500
    let position = LedgerService::new(f.pool.clone())
        .get_remaining_budget(f.project_id)
        .await
        .unwrap();
    assert_eq!(position.reserved_budget, dec("2400"));

    let confirmed = payments.confirm_payment(&f.officer, settled.payment.id).await.unwrap();
    assert_eq!(confirmed.status, shared::PaymentStatus::Paid);
    assert_err!(payments.confirm_payment(&f.officer, settled.payment.id).await);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_stored_budget_tracks_every_budget_event() {
    let f = fixture("100000").await;
    let orders = OrderService::new(f.pool.clone());
    let receiving = ReceivingService::new(f.pool.clone());
    let payments = PaymentService::new(f.pool.clone());

    let id = draft(&f, vec![item("Pipette tips", 10, "1000")]).await;
    assert_eq!(stored_reserved(&f).await, Decimal::ZERO);

    orders.submit_order(&f.requester, id).await.unwrap();
    assert_eq!(stored_reserved(&f).await, dec("10000"));

    orders
        .send_for_approval(&f.requester, id, SendForApprovalInput::default())
        .await
        .unwrap();
    orders
        .record_approval_decision(&f.officer, id, decision(ApprovalDecision::Reject, Some("Too many")))
        .await
        .unwrap();
    assert_eq!(stored_reserved(&f).await, dec("10000"));

    let revised = orders
        .edit_order(
            &f.requester,
            id,
            EditOrderInput {
                items: vec![item("Pipette tips", 8, "1000")],
                reason: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(revised.order.status, OrderStatus::Revising);
    assert_eq!(stored_reserved(&f).await, dec("8000"));

    orders
        .send_for_approval(&f.requester, id, SendForApprovalInput::default())
        .await
        .unwrap();
    orders
        .record_approval_decision(&f.officer, id, decision(ApprovalDecision::Approve, None))
        .await
        .unwrap();
    orders
        .forward_order(&f.officer, id, ForwardOrderInput::default())
        .await
        .unwrap();
    assert_eq!(stored_reserved(&f).await, dec("8000"));

    // A cancelled order releases its reservation straight away
    let other = draft(&f, vec![item("Beakers", 5, "1000")]).await;
    orders.submit_order(&f.requester, other).await.unwrap();
    assert_eq!(stored_reserved(&f).await, dec("13000"));
    orders
        .send_for_approval(&f.requester, other, SendForApprovalInput::default())
        .await
        .unwrap();
    orders
        .record_approval_decision(&f.officer, other, decision(ApprovalDecision::Cancel, Some("Duplicate")))
        .await
        .unwrap();
    assert_eq!(stored_reserved(&f).await, dec("8000"));

    let order_item_id = first_item(&f, id).await;
    let delivered = receiving
        .record_partial_receive(&f.officer, id, batch(order_item_id, 8))
        .await
        .unwrap();
    receiving
        .record_inspection(&f.inspector, delivered.receive.id, verdict(InspectionResult::Pass))
        .await
        .unwrap();
    assert_eq!(stored_reserved(&f).await, dec("8000"));

    // Paid below the estimate: the gap goes back to the project
    let paid = payments
        .create_payment(&f.officer, payment(delivered.receive.id, "7500"))
        .await
        .unwrap();
    assert_eq!(paid.order_status, OrderStatus::Completed);
    assert_eq!(stored_reserved(&f).await, dec("7500"));

    payments.confirm_payment(&f.officer, paid.payment.id).await.unwrap();
    assert_eq!(stored_reserved(&f).await, dec("7500"));
    let spent: Decimal = sqlx::query_scalar("SELECT spent_budget FROM projects WHERE id = $1")
        .bind(f.project_id)
        .fetch_one(&f.pool)
        .await
        .unwrap();
    assert_eq!(spent, dec("7500"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_rejected_batch_is_redelivered() {
    let f = fixture("100000").await;
    let order_id = approved(&f, vec![item("Test tubes", 10, "100")]).await;
    let order_item_id = first_item(&f, order_id).await;
    let receiving = ReceivingService::new(f.pool.clone());
    let payments = PaymentService::new(f.pool.clone());

    let broken = receiving
        .record_partial_receive(&f.officer, order_id, batch(order_item_id, 10))
        .await
        .unwrap();
    receiving
        .record_inspection(&f.inspector, broken.receive.id, verdict(InspectionResult::Reject))
        .await
        .unwrap();

    let line = receiving
        .get_remaining_quantity(&f.requester, order_item_id)
        .await
        .unwrap();
    assert_eq!(line.remaining, 10);
    assert_eq!(line.rejected, 10);

    // A rejected batch is never payable
    assert_err!(
        payments
            .create_payment(&f.officer, payment(broken.receive.id, "1000"))
            .await
    );
    assert_eq!(payment_rows(&f, order_id).await, 0);

    let redelivered = assert_ok!(
        receiving
            .record_partial_receive(&f.officer, order_id, batch(order_item_id, 10))
            .await
    );
    receiving
        .record_inspection(&f.inspector, redelivered.receive.id, verdict(InspectionResult::Pass))
        .await
        .unwrap();

    let line = receiving
        .get_remaining_quantity(&f.requester, order_item_id)
        .await
        .unwrap();
    assert_eq!(line.remaining, 0);
    assert_eq!(line.passed, 10);

    let order = OrderService::new(f.pool.clone())
        .get_order(&f.requester, order_id)
        .await
        .unwrap();
    assert_eq!(order.order.status, OrderStatus::Completed);

    payments
        .create_payment(&f.officer, payment(redelivered.receive.id, "1000"))
        .await
        .unwrap();
    assert_eq!(stored_reserved(&f).await, dec("1000"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_overpayment_leaves_no_payment_row() {
    let f = fixture("100000").await;
    let order_id = approved(&f, vec![item("Solder reel", 10, "250")]).await;
    let order_item_id = first_item(&f, order_id).await;
    let receiving = ReceivingService::new(f.pool.clone());

    let delivered = receiving
        .record_partial_receive(&f.officer, order_id, batch(order_item_id, 4))
        .await
        .unwrap();
    receiving
        .record_inspection(&f.inspector, delivered.receive.id, verdict(InspectionResult::Pass))
        .await
        .unwrap();

    let result = PaymentService::new(f.pool.clone())
        .create_payment(&f.officer, payment(delivered.receive.id, "1200"))
        .await;
    assert!(matches!(
        result,
        Err(AppError::Procurement(ProcurementError::PaymentExceedsValue { .. }))
    ));
    assert_eq!(payment_rows(&f, order_id).await, 0);
    assert_eq!(stored_reserved(&f).await, dec("2500"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_receipts_cannot_over_deliver() {
    let f = fixture("100000").await;
    let order_id = approved(&f, vec![item("Agar plates", 10, "50")]).await;
    let order_item_id = first_item(&f, order_id).await;
    let receiving = ReceivingService::new(f.pool.clone());

    let (a, b) = tokio::join!(
        receiving.record_partial_receive(&f.officer, order_id, batch(order_item_id, 6)),
        receiving.record_partial_receive(&f.officer, order_id, batch(order_item_id, 6)),
    );

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1, "exactly one batch fits");
    let refused = if a.is_err() { a } else { b };
    assert!(matches!(
        refused,
        Err(AppError::Procurement(ProcurementError::OverReceipt { requested: 6, remaining: 4, .. }))
    ));

    let line = receiving
        .get_remaining_quantity(&f.requester, order_item_id)
        .await
        .unwrap();
    assert_eq!(line.remaining, 4);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_payments_pay_a_batch_once() {
    let f = fixture("100000").await;
    let order_id = approved(&f, vec![item("Lab coats", 10, "100")]).await;
    let order_item_id = first_item(&f, order_id).await;
    let receiving = ReceivingService::new(f.pool.clone());
    let payments = PaymentService::new(f.pool.clone());

    let delivered = receiving
        .record_partial_receive(&f.officer, order_id, batch(order_item_id, 10))
        .await
        .unwrap();
    receiving
        .record_inspection(&f.inspector, delivered.receive.id, verdict(InspectionResult::Pass))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        payments.create_payment(&f.officer, payment(delivered.receive.id, "1000")),
        payments.create_payment(&f.officer, payment(delivered.receive.id, "1000")),
    );

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1, "exactly one payment lands");
    let refused = if a.is_err() { a } else { b };
    assert!(matches!(
        refused,
        Err(AppError::Procurement(ProcurementError::DuplicatePayment { .. }))
    ));
    assert_eq!(payment_rows(&f, order_id).await, 1);
    assert_eq!(stored_reserved(&f).await, dec("1000"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_oversized_amounts_are_validation_errors() {
    let f = fixture("100000").await;

    let result = OrderService::new(f.pool.clone())
        .create_order(
            &f.requester,
            CreateOrderInput {
                project_id: f.project_id,
                items: vec![item("Big thing", 999_999, "999999999.99")],
                reason: None,
                inspection_committee_id: None,
                inspection_committee_name: None,
            },
        )
        .await;
    assert!(matches!(
        result,
        Err(AppError::Validation { ref field, .. }) if field == "items[0].unit_price"
    ));

    let result = ProjectService::new(f.pool.clone())
        .create_project(
            &f.officer,
            CreateProjectInput {
                project_code: None,
                name: "Particle accelerator".to_string(),
                responsible_person: None,
                total_budget: dec("1000000000.00"),
                status: None,
                start_date: None,
                end_date: None,
            },
        )
        .await;
    assert!(matches!(
        result,
        Err(AppError::Validation { ref field, .. }) if field == "total_budget"
    ));
}
