/// PostgreSQL plumbing for the document store
///
/// - `pool`: connection pool creation and health checks
/// - `migrations`: embedded schema migrations
///
/// The store itself lives in [`crate::store::postgres`].

pub mod migrations;
pub mod pool;
