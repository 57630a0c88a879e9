//! The fetch-all-then-write sync loop.
//!
//! A cycle fetches every configured collection in configuration order. If
//! all of them succeed the collections are assembled into one [`Snapshot`]
//! and handed to the store; if any of them fails nothing is written and the
//! previously stored snapshot stays authoritative. Either way the engine
//! then sleeps for the fixed interval and tries again.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::snapshot::{CollectionName, Record, Snapshot};
use crate::source::{RemoteSource, SourceError};
use crate::store::{SnapshotStore, StoreError};

/// What one mirror syncs and how often.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub label: String,
    pub collections: Vec<CollectionName>,
    pub interval: Duration,
}

/// Configuration problems that prevent an engine from being built.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("mirror [{label}] has no collections configured")]
    NoCollections { label: String },

    #[error("mirror [{label}] lists collection {collection} more than once")]
    DuplicateCollection {
        label: String,
        collection: CollectionName,
    },

    #[error("mirror [{label}] has a zero sync interval")]
    ZeroInterval { label: String },
}

/// A collection that could not be fetched during a cycle.
#[derive(Debug)]
pub struct FetchFailure {
    pub collection: CollectionName,
    pub error: SourceError,
}

/// How a single cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Every collection was fetched and the snapshot was written.
    Success { collections: usize, records: usize },
    /// Some collections failed; nothing was written.
    PartialFailure {
        fetched: Vec<CollectionName>,
        failures: Vec<FetchFailure>,
    },
    /// Every collection failed; nothing was written.
    TotalFailure { failures: Vec<FetchFailure> },
    /// Every collection was fetched but the store rejected the snapshot.
    PersistenceFailure(StoreError),
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Collections that failed to fetch, if any.
    pub fn failures(&self) -> &[FetchFailure] {
        match self {
            Self::PartialFailure { failures, .. } | Self::TotalFailure { failures } => failures,
            Self::Success { .. } | Self::PersistenceFailure(_) => &[],
        }
    }
}

/// Periodically mirrors a fixed set of collections into a snapshot store.
///
/// One engine must own a given store; two engines writing the same
/// snapshot path is unsupported.
pub struct SyncEngine {
    config: MirrorConfig,
    source: Arc<dyn RemoteSource>,
    store: Arc<dyn SnapshotStore>,
}

impl SyncEngine {
    pub fn new(
        config: MirrorConfig,
        source: Arc<dyn RemoteSource>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self, EngineError> {
        if config.collections.is_empty() {
            return Err(EngineError::NoCollections {
                label: config.label,
            });
        }

        if config.interval.is_zero() {
            return Err(EngineError::ZeroInterval {
                label: config.label,
            });
        }

        let mut seen = HashSet::new();
        for collection in &config.collections {
            if !seen.insert(collection) {
                return Err(EngineError::DuplicateCollection {
                    label: config.label.clone(),
                    collection: collection.clone(),
                });
            }
        }

        Ok(Self {
            config,
            source,
            store,
        })
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Run one fetch-all-then-write cycle.
    ///
    /// Never panics or propagates on fetch or write failure; the outcome
    /// says what happened and has already been logged.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let label = self.config.label.as_str();
        let started = Instant::now();
        debug!(mirror = label, source = self.source.label(), "cycle_started");

        let mut fetched: BTreeMap<CollectionName, Vec<Record>> = BTreeMap::new();
        let mut failures = Vec::new();

        for collection in &self.config.collections {
            match self.source.fetch(collection).await {
                Ok(records) => {
                    debug!(
                        mirror = label,
                        collection = %collection,
                        records = records.len(),
                        "collection_fetched"
                    );
                    fetched.insert(collection.clone(), records);
                }
                Err(error) => {
                    warn!(
                        mirror = label,
                        collection = %collection,
                        error = %error,
                        "collection_fetch_failed"
                    );
                    failures.push(FetchFailure {
                        collection: collection.clone(),
                        error,
                    });
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !failures.is_empty() {
            let outcome = if fetched.is_empty() {
                CycleOutcome::TotalFailure { failures }
            } else {
                CycleOutcome::PartialFailure {
                    fetched: fetched.into_keys().collect(),
                    failures,
                }
            };
            error!(
                mirror = label,
                failed = outcome.failures().len(),
                total = self.config.collections.len(),
                elapsed_ms,
                "cycle_skipped_snapshot_unchanged"
            );
            return outcome;
        }

        let snapshot = Snapshot::assemble(fetched);
        let collections = snapshot.collections().len();
        let records = snapshot.record_count();

        if let Err(error) = self.persist(snapshot).await {
            error!(
                mirror = label,
                error = %error,
                elapsed_ms,
                "snapshot_write_failed"
            );
            return CycleOutcome::PersistenceFailure(error);
        }

        info!(
            mirror = label,
            collections,
            records,
            elapsed_ms,
            "snapshot_updated"
        );

        CycleOutcome::Success {
            collections,
            records,
        }
    }

    /// Hand the snapshot to the store on the blocking pool; file stores
    /// fsync, which must not stall the async workers.
    async fn persist(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.write(&snapshot))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }

    /// Cycle forever, sleeping the configured interval between cycles.
    ///
    /// Returns only once `shutdown` is cancelled. Cancellation is observed
    /// between cycles (including during the sleep), never in the middle of
    /// a fetch or a write.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            mirror = %self.config.label,
            collections = self.config.collections.len(),
            interval_secs = self.config.interval.as_secs(),
            "mirror_started"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        info!(mirror = %self.config.label, "mirror_stopped");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::test_support::{InMemorySource, MemorySnapshotStore, record};

    use super::*;

    fn config(collections: &[&str]) -> MirrorConfig {
        MirrorConfig {
            label: "test".into(),
            collections: collections.iter().map(|c| CollectionName::new(*c)).collect(),
            interval: Duration::from_millis(10),
        }
    }

    fn engine(
        collections: &[&str],
    ) -> (SyncEngine, Arc<InMemorySource>, Arc<MemorySnapshotStore>) {
        let source = Arc::new(InMemorySource::new("memory"));
        let store = Arc::new(MemorySnapshotStore::new());
        let engine = SyncEngine::new(config(collections), source.clone(), store.clone()).unwrap();
        (engine, source, store)
    }

    #[tokio::test]
    async fn successful_cycle_writes_every_collection() {
        let (engine, source, store) = engine(&["a", "b"]);
        source.set("a", vec![record(json!({"id": 1}))]);
        source.set("b", vec![record(json!({"id": 2}))]);

        let outcome = engine.run_cycle().await;
        assert!(matches!(
            outcome,
            CycleOutcome::Success {
                collections: 2,
                records: 2
            }
        ));

        let snapshot = store.read().unwrap();
        assert_eq!(snapshot.get("a").unwrap(), &[record(json!({"id": 1}))]);
        assert_eq!(snapshot.get("b").unwrap(), &[record(json!({"id": 2}))]);
    }

    #[tokio::test]
    async fn one_failed_fetch_skips_the_write() {
        let (engine, source, store) = engine(&["a", "b"]);
        source.set("a", vec![record(json!({"id": 1}))]);
        source.fail("b", "connection reset");

        let outcome = engine.run_cycle().await;

        match outcome {
            CycleOutcome::PartialFailure { fetched, failures } => {
                assert_eq!(fetched, vec![CollectionName::new("a")]);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].collection.as_str(), "b");
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
        assert!(store.history().is_empty());
    }

    #[tokio::test]
    async fn all_failed_fetches_are_total_failure() {
        let (engine, source, store) = engine(&["a", "b"]);
        source.fail("a", "timeout");
        source.fail("b", "timeout");

        let outcome = engine.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::TotalFailure { ref failures } if failures.len() == 2));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn failed_cycle_keeps_previous_snapshot() {
        let (engine, source, store) = engine(&["a", "b"]);
        source.set("a", vec![record(json!({"id": 1}))]);
        source.set("b", vec![record(json!({"id": 2}))]);
        assert!(engine.run_cycle().await.is_success());
        let before = store.read().unwrap();

        source.set("a", vec![record(json!({"id": 10}))]);
        source.fail("b", "upstream 503");
        assert!(!engine.run_cycle().await.is_success());

        assert_eq!(store.history().len(), 1);
        assert_eq!(store.read().unwrap(), before);
    }

    #[tokio::test]
    async fn write_failure_is_reported_not_propagated() {
        let (engine, source, store) = engine(&["a"]);
        source.set("a", vec![]);
        store.set_failing(true);

        let outcome = engine.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::PersistenceFailure(_)));
        assert!(outcome.failures().is_empty());

        store.set_failing(false);
        assert!(engine.run_cycle().await.is_success());
    }

    #[tokio::test]
    async fn fetches_in_configuration_order() {
        let (engine, source, _store) = engine(&["logs", "agents", "blueprint"]);
        for name in ["logs", "agents", "blueprint"] {
            source.set(name, vec![]);
        }

        engine.run_cycle().await;

        let calls: Vec<_> = source.calls().iter().map(|c| c.to_string()).collect();
        assert_eq!(calls, vec!["logs", "agents", "blueprint"]);
    }

    #[tokio::test]
    async fn remaining_collections_are_still_attempted_after_a_failure() {
        let (engine, source, _store) = engine(&["a", "b", "c"]);
        source.fail("a", "boom");
        source.set("b", vec![]);
        source.set("c", vec![]);

        let outcome = engine.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::PartialFailure { ref fetched, .. } if fetched.len() == 2));
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test]
    async fn snapshot_assembly_time_never_regresses() {
        let (engine, source, store) = engine(&["a"]);
        source.set("a", vec![record(json!({"id": 1}))]);

        for _ in 0..5 {
            assert!(engine.run_cycle().await.is_success());
        }

        let history = store.history();
        assert_eq!(history.len(), 5);
        for pair in history.windows(2) {
            assert!(pair[1].assembled_at() >= pair[0].assembled_at());
        }
    }

    #[tokio::test]
    async fn run_stops_when_cancelled() {
        let (engine, source, store) = engine(&["a"]);
        source.set("a", vec![]);
        let shutdown = CancellationToken::new();

        let token = shutdown.clone();
        let handle = tokio::spawn(async move { engine.run(token).await });

        tokio::time::timeout(Duration::from_secs(5), async {
            while store.history().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("engine should keep cycling");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("engine should stop after cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn run_survives_failing_cycles() {
        let (engine, source, store) = engine(&["a"]);
        source.fail("a", "down");
        let shutdown = CancellationToken::new();

        let token = shutdown.clone();
        let source_for_recovery = source.clone();
        let handle = tokio::spawn(async move { engine.run(token).await });

        tokio::time::timeout(Duration::from_secs(5), async {
            while source_for_recovery.calls().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("engine should retry after failures");
        assert!(!store.exists());

        source.set("a", vec![record(json!({"id": 1}))]);
        tokio::time::timeout(Duration::from_secs(5), async {
            while !store.exists() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("engine should recover once the source does");

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn already_cancelled_token_runs_no_cycle() {
        let (engine, source, _store) = engine(&["a"]);
        source.set("a", vec![]);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        engine.run(shutdown).await;
        assert!(source.calls().is_empty());
    }

    #[test]
    fn rejects_empty_collection_list() {
        let result = SyncEngine::new(
            config(&[]),
            Arc::new(InMemorySource::new("memory")),
            Arc::new(MemorySnapshotStore::new()),
        );
        assert!(matches!(result, Err(EngineError::NoCollections { .. })));
    }

    #[test]
    fn rejects_duplicate_collections() {
        let result = SyncEngine::new(
            config(&["a", "b", "a"]),
            Arc::new(InMemorySource::new("memory")),
            Arc::new(MemorySnapshotStore::new()),
        );
        assert!(matches!(
            result,
            Err(EngineError::DuplicateCollection { ref collection, .. }) if collection.as_str() == "a"
        ));
    }

    #[test]
    fn rejects_zero_interval() {
        let mut cfg = config(&["a"]);
        cfg.interval = Duration::ZERO;
        let result = SyncEngine::new(
            cfg,
            Arc::new(InMemorySource::new("memory")),
            Arc::new(MemorySnapshotStore::new()),
        );
        assert!(matches!(result, Err(EngineError::ZeroInterval { .. })));
    }

    /// Store whose writes block the calling thread for a while.
    struct SlowStore {
        inner: MemorySnapshotStore,
        delay: Duration,
    }

    impl SnapshotStore for SlowStore {
        fn write(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
            std::thread::sleep(self.delay);
            self.inner.write(snapshot)
        }

        fn exists(&self) -> bool {
            self.inner.exists()
        }

        fn read(&self) -> Result<Snapshot, StoreError> {
            self.inner.read()
        }

        fn last_written(&self) -> Result<Option<std::time::SystemTime>, StoreError> {
            self.inner.last_written()
        }
    }

    #[tokio::test]
    async fn slow_write_does_not_block_other_tasks() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let source = Arc::new(InMemorySource::new("memory"));
        source.set("a", vec![record(json!({"id": 1}))]);
        let store = Arc::new(SlowStore {
            inner: MemorySnapshotStore::new(),
            delay: Duration::from_millis(300),
        });
        let engine = SyncEngine::new(config(&["a"]), source, store.clone()).unwrap();

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let outcome = engine.run_cycle().await;
        ticker.abort();

        assert!(outcome.is_success());
        assert!(store.exists());
        assert!(ticks.load(Ordering::SeqCst) >= 5);
    }
}
