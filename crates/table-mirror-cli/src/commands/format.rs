use std::time::Duration;

use table_mirror_store::SnapshotStatus;

/// Compact age such as `42s`, `5m 3s`, `2h 10m` or `3d 4h`.
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    let (days, hours, mins, secs) = (secs / 86_400, secs / 3600 % 24, secs / 60 % 60, secs % 60);

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

pub fn describe_status(status: &SnapshotStatus) -> String {
    match status {
        SnapshotStatus::Missing => "no snapshot yet".to_owned(),
        SnapshotStatus::Fresh { age } => format!("fresh, written {} ago", format_age(*age)),
        SnapshotStatus::Stale { age } => format!("stale, written {} ago", format_age(*age)),
    }
}
