//! # Taskboard Shared Library
//!
//! Types, storage and business operations shared by the Taskboard API
//! server and the overdue scanner.
//!
//! ## Module Organization
//!
//! - `store`: document store abstraction, backends and repository façade
//! - `db`: PostgreSQL pool and migrations behind the postgres backend
//! - `models`: users, projects and tasks
//! - `auth`: tokens, request identity and the access matrix
//! - `services`: the operations exposed over HTTP
//! - `config`: store configuration
//! - `error`: service error taxonomy

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

/// Current version of the Taskboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
