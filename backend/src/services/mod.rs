//! Business logic services for campus procurement

pub mod ledger;
pub mod order;
pub mod order_history;
pub mod payment;
pub mod project;
pub mod receiving;
pub mod user;

pub use ledger::LedgerService;
pub use order::OrderService;
pub use order_history::OrderHistoryService;
pub use payment::PaymentService;
pub use project::ProjectService;
pub use receiving::ReceivingService;
pub use user::UserService;
