use std::sync::Arc;

use anyhow::{Context, Result};
use table_mirror::{RemoteSource, SnapshotStore, StatusProbe, SyncEngine};
use table_mirror_store::FileSnapshotStore;

use crate::config::{AppConfig, MirrorEntry};

/// A configured mirror paired with its snapshot file.
pub struct Mirror {
    pub entry: MirrorEntry,
    pub store: Arc<FileSnapshotStore>,
}

impl Mirror {
    pub fn label(&self) -> &str {
        &self.entry.label
    }

    pub fn probe(&self) -> StatusProbe {
        let store: Arc<dyn SnapshotStore> = self.store.clone();
        StatusProbe::new(store)
    }

    pub fn engine(&self, source: Arc<dyn RemoteSource>) -> Result<SyncEngine> {
        let store: Arc<dyn SnapshotStore> = self.store.clone();
        SyncEngine::new(self.entry.mirror_config(), source, store)
            .with_context(|| format!("invalid mirror [{}]", self.entry.label))
    }
}

/// Open every enabled mirror, or only `label` when given.
pub fn open(app: &AppConfig, label: Option<&str>) -> Result<Vec<Mirror>> {
    app.select_mirrors(label)?
        .into_iter()
        .map(|entry| -> Result<Mirror> {
            let path = entry.snapshot_path()?;
            Ok(Mirror {
                entry: entry.clone(),
                store: Arc::new(FileSnapshotStore::new(path)),
            })
        })
        .collect()
}
