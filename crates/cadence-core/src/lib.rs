//! # Cadence Core
//!
//! Error and configuration types shared by the reminder engine and its CLI.

pub mod config;
pub mod error;

pub use config::{BackendKind, CadenceConfig, ReminderDefaults, StoreKind};
pub use error::{CadenceError, Result};
