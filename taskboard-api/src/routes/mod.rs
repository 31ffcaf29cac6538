/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Login and signup
/// - `users`: User listing
/// - `projects`: Project creation and listing
/// - `tasks`: Task creation, listing, search and mutation
/// - `everything`: Full-system dump

pub mod auth;
pub mod everything;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod users;
