use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use table_mirror::{Snapshot, SnapshotStore, StoreError};
use tracing::{debug, warn};

/// How fresh the snapshot on disk is.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotStatus {
    Missing,
    Stale { age: Duration },
    Fresh { age: Duration },
}

impl SnapshotStatus {
    /// Classify a snapshot last written at `written_at`.
    pub fn classify(written_at: Option<SystemTime>, stale_after: Duration) -> Self {
        match written_at {
            None => Self::Missing,
            Some(written_at) => {
                let age = SystemTime::now()
                    .duration_since(written_at)
                    .unwrap_or_default();
                if age >= stale_after {
                    Self::Stale { age }
                } else {
                    Self::Fresh { age }
                }
            }
        }
    }
}

/// A snapshot store backed by a single JSON file.
///
/// Writes go to a hidden sibling temp file that is fsynced and then renamed
/// over the target, so the target path only ever holds a complete snapshot.
/// The snapshot's assembly time is the file's modification time.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check how fresh the snapshot on disk is.
    pub fn status(&self, stale_after: Duration) -> Result<SnapshotStatus, StoreError> {
        Ok(SnapshotStatus::classify(self.last_written()?, stale_after))
    }

    /// The snapshot file's bytes exactly as stored.
    pub fn read_raw(&self) -> Result<Vec<u8>, StoreError> {
        fs::read(&self.path).map_err(not_found_or_io)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".into());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    /// Fill a temp file and rename it over the target. On any failure the
    /// temp file is removed and the target is left as it was.
    fn write_atomic(
        &self,
        fill: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        if let Err(err) = replace_with(&temp, &self.path, fill) {
            if let Err(cleanup) = fs::remove_file(&temp)
                && cleanup.kind() != io::ErrorKind::NotFound
            {
                warn!(path = %temp.display(), error = %cleanup, "temp_snapshot_cleanup_failed");
            }
            return Err(StoreError::Io(err));
        }

        // The rename has happened; the write stands even if this fails.
        if let Err(err) = self.sync_parent_dir() {
            warn!(path = %self.path.display(), error = %err, "snapshot_dir_sync_failed");
        }

        Ok(())
    }

    #[cfg(unix)]
    fn sync_parent_dir(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
            _ => Ok(()),
        }
    }

    #[cfg(not(unix))]
    fn sync_parent_dir(&self) -> io::Result<()> {
        Ok(())
    }
}

fn replace_with(
    temp: &Path,
    target: &Path,
    fill: impl FnOnce(&mut File) -> io::Result<()>,
) -> io::Result<()> {
    let mut file = File::create(temp)?;
    fill(&mut file)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp, target)
}

fn not_found_or_io(err: io::Error) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound
    } else {
        StoreError::Io(err)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn write(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        // Serialize before touching the filesystem.
        let bytes = snapshot.to_json_bytes()?;
        self.write_atomic(|file| file.write_all(&bytes))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot_written");
        Ok(())
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn read(&self) -> Result<Snapshot, StoreError> {
        // Content and mtime come from the same open handle, so a concurrent
        // rename cannot pair new bytes with an old timestamp.
        let mut file = File::open(&self.path).map_err(not_found_or_io)?;
        let modified = file.metadata()?.modified()?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        Ok(Snapshot::from_json_slice(&bytes, modified)?)
    }

    fn last_written(&self) -> Result<Option<SystemTime>, StoreError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(meta.modified()?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}
