use anyhow::Result;
use table_mirror::{CycleOutcome, SyncEngine};

/// Run a single cycle and print the result. Fetch failures are printed to
/// stderr and turned into an error.
pub async fn run(engine: &SyncEngine) -> Result<()> {
    let total = engine.config().collections.len();
    println!("Syncing [{}] ({total} collections)...", engine.label());

    match engine.run_cycle().await {
        CycleOutcome::Success {
            collections,
            records,
        } => {
            println!("Wrote {records} records from {collections} collections.");
            Ok(())
        }
        outcome @ (CycleOutcome::PartialFailure { .. } | CycleOutcome::TotalFailure { .. }) => {
            let failures = outcome.failures();
            for failure in failures {
                eprintln!("warning: {}: {}", failure.collection, failure.error);
            }
            anyhow::bail!(
                "{} of {total} collections could not be fetched; snapshot left unchanged",
                failures.len()
            )
        }
        CycleOutcome::PersistenceFailure(e) => {
            anyhow::bail!("failed to write snapshot: {e}")
        }
    }
}
