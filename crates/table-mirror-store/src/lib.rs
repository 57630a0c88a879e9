pub mod store;

pub use store::{FileSnapshotStore, SnapshotStatus};
