use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::store::SnapshotStore;

/// Whether a mirror has ever produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    /// Wire value used by the status endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "ok",
            Self::Unavailable => "missing",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body returned by the status endpoint: `{"status": "ok" | "missing"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
}

impl From<Availability> for StatusReport {
    fn from(availability: Availability) -> Self {
        Self {
            status: availability.as_str(),
        }
    }
}

/// Liveness check over a snapshot store.
///
/// Only asks the store whether a snapshot exists, so it stays cheap no
/// matter how large the snapshot is and never touches the remote source.
#[derive(Clone)]
pub struct StatusProbe {
    store: Arc<dyn SnapshotStore>,
}

impl StatusProbe {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    pub fn check(&self) -> Availability {
        if self.store.exists() {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }

    pub fn report(&self) -> StatusReport {
        self.check().into()
    }
}
