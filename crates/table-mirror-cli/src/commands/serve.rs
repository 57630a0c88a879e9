use std::sync::Arc;

use anyhow::{Context, Result};
use table_mirror::{MirrorSupervisor, RemoteSource};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::mirrors::Mirror;
use crate::server::{self, AppState};

/// Start every mirror in the background and serve status until Ctrl-C.
///
/// The first mirror answers the primary status route.
pub async fn run(app: &AppConfig, mirrors: Vec<Mirror>, source: Arc<dyn RemoteSource>) -> Result<()> {
    let primary = mirrors
        .first()
        .map(|m| m.label().to_owned())
        .context("no mirrors to serve")?;

    let probes = mirrors
        .iter()
        .map(|m| (m.label().to_owned(), m.probe()))
        .collect();

    let engines = mirrors
        .iter()
        .map(|m| m.engine(Arc::clone(&source)).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;

    let shutdown = tokio_util::sync::CancellationToken::new();
    let (addr, server) = server::serve(app.server.bind.clone(), AppState::new(primary, probes), shutdown.clone())
        .await
        .with_context(|| format!("failed to bind status server to {}", app.server.bind))?;
    info!(%addr, "status_server_listening");

    let supervisor = MirrorSupervisor::spawn_all(engines);
    let mut server = tokio::spawn(server);

    let server_result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    info!("shutdown_requested");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "shutdown_signal_unavailable");
                    Some((&mut server).await)
                }
            }
        }
        result = &mut server => Some(result),
    };

    supervisor.shutdown().await;
    shutdown.cancel();

    let result = match server_result {
        Some(result) => result,
        None => server.await,
    };

    result
        .context("status server task panicked")?
        .context("status server failed")?;
    info!("status_server_stopped");
    Ok(())
}
