//! Journal Tooling
//!
//! Offline inspection of management journals, without a running
//! repository.
//!
//! # Modules
//! - `commands`: inspect, verify and dry-run replay
//! - `reports`: report structures with text and JSON rendering

pub mod commands;
pub mod reports;

/// Crate version constant
pub const VERSION: &str = "1.0.0";
