//! Document store abstraction
//!
//! Taskboard persists users, projects and tasks as schemaless JSON documents.
//! Everything above this module talks to a [`DocumentStore`], which offers
//! the handful of operations the services need: find, aggregate, insert,
//! update-one, delete-one and count.
//!
//! # Modules
//!
//! - [`identifier`]: primary key forms and candidate resolution
//! - [`filter`]: filter and update language, evaluated in-process
//! - [`pipeline`]: aggregation stages (match, lookup, add-fields)
//! - [`memory`]: process-local backend, used by default and in tests
//! - [`postgres`]: PostgreSQL JSONB backend
//! - [`repository`]: per-collection façade that enforces time budgets
//!
//! # Example
//!
//! ```
//! use taskboard_shared::store::{memory::MemoryStore, filter::Filter, Collection, DocumentStore};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let doc = json!({"_id": "0001", "title": "Write docs"});
//! store.insert_one(Collection::Tasks, doc.as_object().cloned().unwrap()).await?;
//!
//! let found: Vec<_> = store
//!     .find(Collection::Tasks, &Filter::eq("title", "Write docs"))
//!     .await?
//!     .collect();
//! assert_eq!(found.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod filter;
pub mod identifier;
pub mod memory;
pub mod pipeline;
pub mod postgres;
pub mod repository;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

use self::filter::{Filter, Update};
use self::identifier::DocumentId;
use self::pipeline::Stage;

/// A stored document: a JSON object keyed by field name
pub type Document = Map<String, Value>;

/// Name of the primary key field in every collection
pub const ID_FIELD: &str = "_id";

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Logical collections known to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Projects,
    Tasks,
}

impl Collection {
    /// Every collection, in dump order
    pub const ALL: [Collection; 3] = [Collection::Users, Collection::Projects, Collection::Tasks];

    /// Collection name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Projects => "projects",
            Collection::Tasks => "tasks",
        }
    }

    /// Fields that carry a unique index in this collection
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["email"],
            Collection::Projects | Collection::Tasks => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The operation exceeded its time budget
    #[error("store operation `{operation}` timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The backend could not be reached
    #[error("store unavailable: {0}")]
    Connection(String),

    /// A unique index rejected the write
    #[error("duplicate key in {collection}: {key}")]
    DuplicateKey { collection: Collection, key: String },

    /// The filter or pipeline could not be evaluated
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Any other backend failure
    #[error("store error: {0}")]
    Backend(String),

    /// A stored document did not have the expected shape
    #[error("document could not be decoded: {0}")]
    Decode(String),
}

/// Match and modification counts reported by `update_one`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents matched by the filter (0 or 1)
    pub matched: u64,

    /// Documents whose content actually changed (0 or 1)
    pub modified: u64,
}

/// Single-pass sequence of documents returned by reads
///
/// A cursor is consumed by iterating it; once drained it cannot be rewound.
#[derive(Debug)]
pub struct Cursor {
    docs: std::vec::IntoIter<Document>,
}

impl Cursor {
    pub fn new(docs: Vec<Document>) -> Self {
        Self {
            docs: docs.into_iter(),
        }
    }

    /// Documents not yet consumed
    pub fn remaining(&self) -> usize {
        self.docs.len()
    }
}

impl Iterator for Cursor {
    type Item = Document;

    fn next(&mut self) -> Option<Self::Item> {
        self.docs.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.docs.size_hint()
    }
}

/// Storage backend contract
///
/// Implementations must be safe to share between request handlers and the
/// overdue scanner. Single-document writes are atomic; nothing else is.
///
/// `aggregate` has a provided implementation that evaluates the pipeline on
/// top of `find`, so backends only implement the primitive operations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Returns every document in `collection` matching `filter`
    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Cursor>;

    /// Inserts a document, generating an object id when `_id` is absent
    async fn insert_one(&self, collection: Collection, doc: Document) -> StoreResult<DocumentId>;

    /// Applies `update` to the first document matching `filter`
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateOutcome>;

    /// Deletes the first document matching `filter`, returning 0 or 1
    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;

    /// Counts documents matching `filter`
    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;

    /// Verifies the backend is reachable
    async fn ping(&self) -> StoreResult<()>;

    /// Runs an aggregation pipeline over `collection`
    async fn aggregate(&self, collection: Collection, stages: &[Stage]) -> StoreResult<Cursor> {
        pipeline::execute(self, collection, stages).await
    }
}
