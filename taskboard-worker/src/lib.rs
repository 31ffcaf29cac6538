//! # Taskboard Worker Library
//!
//! Background work that runs beside request handling.
//!
//! ## Modules
//!
//! - `scanner`: periodic overdue task scan with a shutdown token
//! - `alerts`: where overdue reports are delivered

pub mod alerts;
pub mod scanner;
