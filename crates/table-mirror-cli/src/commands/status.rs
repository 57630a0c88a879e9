use std::time::Duration;

use anyhow::{Context, Result};

use super::format::{describe_status, format_age};
use crate::mirrors::Mirror;

/// A snapshot older than this many sync intervals is reported as stale.
pub const STALE_AFTER_CYCLES: u32 = 3;

pub fn stale_after(interval: Duration) -> Duration {
    interval.saturating_mul(STALE_AFTER_CYCLES)
}

pub fn run(mirrors: &[Mirror]) -> Result<()> {
    for (i, mirror) in mirrors.iter().enumerate() {
        if i > 0 {
            println!();
        }

        let interval = mirror.entry.interval();
        let status = mirror
            .store
            .status(stale_after(interval))
            .with_context(|| format!("failed to check snapshot for [{}]", mirror.label()))?;

        println!("[{}] {}", mirror.label(), mirror.probe().check());
        println!("  Path:        {}", mirror.store.path().display());
        println!("  Snapshot:    {}", describe_status(&status));
        println!("  Interval:    {}", format_age(interval));
        println!("  Collections: {}", mirror.entry.collections.join(", "));
    }

    Ok(())
}
