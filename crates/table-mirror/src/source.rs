use std::sync::Arc;

use crate::snapshot::{CollectionName, Record};

/// Errors that can occur when fetching a collection from the remote source.
///
/// The sync engine treats every variant the same way: the cycle is abandoned
/// and the next cycle tries again.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("collection not found: {0}")]
    NotFound(CollectionName),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

/// A remote data source that can return the full contents of a named collection.
#[async_trait::async_trait]
pub trait RemoteSource: Send + Sync {
    /// Human-readable label identifying this source.
    fn label(&self) -> &str;

    /// Fetch every record currently in the collection, in the source's order.
    async fn fetch(&self, collection: &CollectionName) -> Result<Vec<Record>, SourceError>;
}

#[async_trait::async_trait]
impl<T: RemoteSource + ?Sized> RemoteSource for Arc<T> {
    fn label(&self) -> &str {
        (**self).label()
    }

    async fn fetch(&self, collection: &CollectionName) -> Result<Vec<Record>, SourceError> {
        (**self).fetch(collection).await
    }
}
