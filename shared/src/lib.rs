//! Shared domain types and rules for the Campus Procurement platform
//!
//! Everything in this crate is pure: no database, no HTTP. The backend loads
//! rows under locks and hands them to these functions, and the WASM module
//! uses the same rules for client-side previews.

pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod line_items;
pub mod models;
pub mod reconciliation;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
