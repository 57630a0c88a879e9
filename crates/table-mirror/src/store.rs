use std::sync::Arc;
use std::time::SystemTime;

use crate::snapshot::Snapshot;

/// Errors that can occur when persisting or loading a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no snapshot has been written yet")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable home for the most recent complete snapshot.
///
/// Implementations must replace the stored snapshot atomically: a reader
/// sees either the previous snapshot or the new one, and a failed `write`
/// leaves the previous snapshot in place. Exactly one writer per store is
/// assumed; nothing here coordinates concurrent writers.
pub trait SnapshotStore: Send + Sync {
    /// Persist `snapshot`, replacing whatever was stored before.
    fn write(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// True once any snapshot has been persisted. Must not read the snapshot.
    fn exists(&self) -> bool;

    /// Load the last persisted snapshot.
    fn read(&self) -> Result<Snapshot, StoreError>;

    /// When the last successful write happened, if ever.
    fn last_written(&self) -> Result<Option<SystemTime>, StoreError>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    fn write(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        (**self).write(snapshot)
    }

    fn exists(&self) -> bool {
        (**self).exists()
    }

    fn read(&self) -> Result<Snapshot, StoreError> {
        (**self).read()
    }

    fn last_written(&self) -> Result<Option<SystemTime>, StoreError> {
        (**self).last_written()
    }
}
