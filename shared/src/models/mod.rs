//! Domain models for the Campus Procurement platform

mod order;
mod payment;
mod project;
mod receiving;
mod user;

pub use order::*;
pub use payment::*;
pub use project::*;
pub use receiving::*;
pub use user::*;
