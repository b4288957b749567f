//! HTTP request handlers.

pub mod health;
pub mod inventory;

pub use health::{health_check, readiness_check};
pub use inventory::{create_stock, get_stock, update_stock};
