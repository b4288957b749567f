//! # Inventory Server
//!
//! Process wiring for the inventory reservation service: configuration,
//! startup checks, and the shutdown sequence. The binary in `main.rs` only
//! installs logging and calls into this crate.
//!
//! ```text
//! Config::from_env ─▶ build_application ─▶ Application::run
//!                       │ Postgres connect + migrate
//!                       │ Redpanda metadata probe
//!                       │ metrics recorder
//!                       └ bind HTTP port
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod config;
pub mod lifecycle;

pub use bootstrap::build_application;
pub use config::{Config, ConfigError};
pub use lifecycle::Application;
