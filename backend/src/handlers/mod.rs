//! HTTP handlers

pub mod budget;
pub mod health;
pub mod order;
pub mod payment;
pub mod project;
pub mod receiving;
pub mod user;

pub use budget::*;
pub use health::*;
pub use order::*;
pub use payment::*;
pub use project::*;
pub use receiving::*;
pub use user::*;
