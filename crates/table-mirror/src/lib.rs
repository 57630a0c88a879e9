pub mod engine;
pub mod probe;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod supervisor;

pub use engine::{CycleOutcome, EngineError, FetchFailure, MirrorConfig, SyncEngine};
pub use probe::{Availability, StatusProbe, StatusReport};
pub use snapshot::{CollectionName, Record, Snapshot};
pub use source::{RemoteSource, SourceError};
pub use store::{SnapshotStore, StoreError};
pub use supervisor::MirrorSupervisor;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
