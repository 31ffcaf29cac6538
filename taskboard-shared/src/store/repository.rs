//! Per-collection repository façade
//!
//! A [`Repository`] binds a shared [`DocumentStore`] to one collection and
//! bounds every call with a time budget. When the budget elapses the
//! pending store call is dropped and [`StoreError::Timeout`] is returned.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::filter::{Filter, Update};
use super::identifier::DocumentId;
use super::pipeline::Stage;
use super::{Collection, Cursor, Document, DocumentStore, StoreError, StoreResult, UpdateOutcome};

/// Time budgets for store calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Single-document writes, finds and counts
    pub write: Duration,

    /// Aggregation pipelines
    pub query: Duration,

    /// Whole-collection dumps
    pub dump: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            write: Duration::from_secs(5),
            query: Duration::from_secs(10),
            dump: Duration::from_secs(15),
        }
    }
}

/// Store access scoped to a single collection
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
    collection: Collection,
    timeouts: Timeouts,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("backend", &self.store.backend())
            .field("collection", &self.collection)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>, collection: Collection, timeouts: Timeouts) -> Self {
        Self {
            store,
            collection,
            timeouts,
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        after: Duration,
        call: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        match tokio::time::timeout(after, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    collection = %self.collection,
                    operation,
                    budget = ?after,
                    "Store operation timed out"
                );
                Err(StoreError::Timeout { operation, after })
            }
        }
    }

    pub async fn find(&self, filter: &Filter) -> StoreResult<Cursor> {
        self.bounded("find", self.timeouts.write, self.store.find(self.collection, filter))
            .await
    }

    pub async fn aggregate(&self, stages: &[Stage]) -> StoreResult<Cursor> {
        self.bounded(
            "aggregate",
            self.timeouts.query,
            self.store.aggregate(self.collection, stages),
        )
        .await
    }

    /// Runs a pipeline under the dump budget
    pub async fn dump(&self, stages: &[Stage]) -> StoreResult<Cursor> {
        self.bounded(
            "dump",
            self.timeouts.dump,
            self.store.aggregate(self.collection, stages),
        )
        .await
    }

    pub async fn insert_one(&self, doc: Document) -> StoreResult<DocumentId> {
        self.bounded(
            "insert_one",
            self.timeouts.write,
            self.store.insert_one(self.collection, doc),
        )
        .await
    }

    pub async fn update_one(&self, filter: &Filter, update: &Update) -> StoreResult<UpdateOutcome> {
        self.bounded(
            "update_one",
            self.timeouts.write,
            self.store.update_one(self.collection, filter, update),
        )
        .await
    }

    pub async fn delete_one(&self, filter: &Filter) -> StoreResult<u64> {
        self.bounded(
            "delete_one",
            self.timeouts.write,
            self.store.delete_one(self.collection, filter),
        )
        .await
    }

    pub async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        self.bounded("count", self.timeouts.write, self.store.count(self.collection, filter))
            .await
    }
}

/// The three collection repositories over one store
#[derive(Debug, Clone)]
pub struct Repositories {
    pub users: Repository,
    pub projects: Repository,
    pub tasks: Repository,
}

impl Repositories {
    pub fn new(store: Arc<dyn DocumentStore>, timeouts: Timeouts) -> Self {
        Self {
            users: Repository::new(store.clone(), Collection::Users, timeouts),
            projects: Repository::new(store.clone(), Collection::Projects, timeouts),
            tasks: Repository::new(store, Collection::Tasks, timeouts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;

    /// Memory store whose reads stall for a fixed delay
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait]
    impl DocumentStore for SlowStore {
        fn backend(&self) -> &'static str {
            "slow"
        }

        async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Cursor> {
            tokio::time::sleep(self.delay).await;
            self.inner.find(collection, filter).await
        }

        async fn insert_one(&self, collection: Collection, doc: Document) -> StoreResult<DocumentId> {
            self.inner.insert_one(collection, doc).await
        }

        async fn update_one(
            &self,
            collection: Collection,
            filter: &Filter,
            update: &Update,
        ) -> StoreResult<UpdateOutcome> {
            self.inner.update_one(collection, filter, update).await
        }

        async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
            self.inner.delete_one(collection, filter).await
        }

        async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
            self.inner.count(collection, filter).await
        }

        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    fn slow(delay: Duration) -> Repositories {
        let store = SlowStore {
            inner: MemoryStore::new(),
            delay,
        };
        Repositories::new(Arc::new(store), Timeouts::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_times_out_after_write_budget() {
        let repos = slow(Duration::from_secs(6));
        let err = repos.tasks.find(&Filter::All).await.unwrap_err();
        match err {
            StoreError::Timeout { operation, after } => {
                assert_eq!(operation, "find");
                assert_eq!(after, Duration::from_secs(5));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregate_uses_longer_query_budget() {
        let repos = slow(Duration::from_secs(6));
        let docs = repos.tasks.aggregate(&[]).await.unwrap();
        assert_eq!(docs.count(), 0);

        let repos = slow(Duration::from_secs(11));
        assert!(matches!(
            repos.tasks.aggregate(&[]).await,
            Err(StoreError::Timeout { operation: "aggregate", .. })
        ));
        assert!(repos.tasks.dump(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_repositories_target_their_collections() {
        let repos = Repositories::new(Arc::new(MemoryStore::new()), Timeouts::default());
        let doc = json!({"title": "t"}).as_object().cloned().unwrap();
        repos.tasks.insert_one(doc).await.unwrap();

        assert_eq!(repos.tasks.count(&Filter::All).await.unwrap(), 1);
        assert_eq!(repos.projects.count(&Filter::All).await.unwrap(), 0);
        assert_eq!(repos.users.collection(), Collection::Users);
    }
}
