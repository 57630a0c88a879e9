use std::io::Write;
use std::time::SystemTime;

use anyhow::Result;
use table_mirror::{SnapshotStore, StoreError};

use super::format::format_age;
use crate::mirrors::Mirror;

pub fn run(mirror: &Mirror, raw: bool) -> Result<()> {
    if raw {
        let bytes = mirror.store.read_raw().map_err(|e| not_synced(mirror, e))?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&bytes)?;
        stdout.flush()?;
        return Ok(());
    }

    let snapshot = mirror.store.read().map_err(|e| not_synced(mirror, e))?;
    let age = SystemTime::now()
        .duration_since(snapshot.assembled_at())
        .unwrap_or_default();

    println!("Mirror:      {}", mirror.label());
    println!("Path:        {}", mirror.store.path().display());
    println!("Written:     {} ago", format_age(age));
    println!("Records:     {}", snapshot.record_count());
    println!();

    let width = snapshot
        .collections()
        .keys()
        .map(|name| name.as_str().chars().count())
        .max()
        .unwrap_or(0);

    for (name, records) in snapshot.collections() {
        println!("  {:<width$}  {}", name.as_str(), records.len());
    }

    Ok(())
}

fn not_synced(mirror: &Mirror, err: StoreError) -> anyhow::Error {
    match err {
        StoreError::NotFound => anyhow::anyhow!(
            "no snapshot for [{}] yet. Run `table-mirror sync` first.",
            mirror.label()
        ),
        other => anyhow::Error::new(other)
            .context(format!("failed to read snapshot for [{}]", mirror.label())),
    }
}
