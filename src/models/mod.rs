//! Data models for the vice/action bank ledgers.
//!
//! Wire names are camelCase to match the persisted JSON file layouts exactly.

mod action;
mod deposit;
mod deposit_conversion;
mod expense;
mod task_deposit;
mod user;

pub use action::*;
pub use deposit::*;
pub use deposit_conversion::*;
pub use expense::*;
pub use task_deposit::*;
pub use user::*;
