use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use crate::{CollectionName, Record, RemoteSource, Snapshot, SnapshotStore, SourceError, StoreError};

/// Build a record from a JSON object literal. Panics on non-objects.
pub fn record(value: serde_json::Value) -> Record {
    match value {
        serde_json::Value::Object(fields) => Record::new(fields),
        other => panic!("record must be a JSON object, got {other}"),
    }
}

enum Canned {
    Records(Vec<Record>),
    Failure(String),
}

/// In-memory source for testing. Each collection either returns canned
/// records or fails; both can be changed between cycles.
pub struct InMemorySource {
    label: String,
    collections: Mutex<HashMap<CollectionName, Canned>>,
    calls: Mutex<Vec<CollectionName>>,
}

impl InMemorySource {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            collections: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, collection: &str, records: Vec<Record>) {
        self.collections
            .lock()
            .unwrap()
            .insert(CollectionName::new(collection), Canned::Records(records));
    }

    pub fn fail(&self, collection: &str, message: impl Into<String>) {
        self.collections
            .lock()
            .unwrap()
            .insert(CollectionName::new(collection), Canned::Failure(message.into()));
    }

    /// Every collection requested so far, in call order.
    pub fn calls(&self) -> Vec<CollectionName> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RemoteSource for InMemorySource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch(&self, collection: &CollectionName) -> Result<Vec<Record>, SourceError> {
        self.calls.lock().unwrap().push(collection.clone());

        match self.collections.lock().unwrap().get(collection) {
            Some(Canned::Records(records)) => Ok(records.clone()),
            Some(Canned::Failure(message)) => Err(SourceError::Network(message.clone())),
            None => Err(SourceError::NotFound(collection.clone())),
        }
    }
}

/// In-memory store that keeps every snapshot it accepted.
#[derive(Default)]
pub struct MemorySnapshotStore {
    history: Mutex<Vec<Snapshot>>,
    failing: AtomicBool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every snapshot successfully written, oldest first.
    pub fn history(&self) -> Vec<Snapshot> {
        self.history.lock().unwrap().clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn write(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("injected write failure")));
        }
        self.history.lock().unwrap().push(snapshot.clone());
        Ok(())
    }

    fn exists(&self) -> bool {
        !self.history.lock().unwrap().is_empty()
    }

    fn read(&self) -> Result<Snapshot, StoreError> {
        self.history.lock().unwrap().last().cloned().ok_or(StoreError::NotFound)
    }

    fn last_written(&self) -> Result<Option<SystemTime>, StoreError> {
        Ok(self.history.lock().unwrap().last().map(Snapshot::assembled_at))
    }
}
