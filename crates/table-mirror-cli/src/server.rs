//! Status HTTP server

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use table_mirror::StatusProbe;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Probes for every running mirror, keyed by label.
#[derive(Clone)]
pub struct AppState {
    primary: String,
    probes: Arc<BTreeMap<String, StatusProbe>>,
}

impl AppState {
    /// `primary` is the mirror answered by `/api/supabase/status`.
    pub fn new(primary: impl Into<String>, probes: BTreeMap<String, StatusProbe>) -> Self {
        Self {
            primary: primary.into(),
            probes: Arc::new(probes),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/supabase/status", get(primary_status))
        .route("/api/mirrors/:label/status", get(mirror_status))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "status": "running" }))
}

async fn primary_status(State(state): State<AppState>) -> Response {
    let label = state.primary.clone();
    status_for(&state, &label)
}

async fn mirror_status(State(state): State<AppState>, Path(label): Path<String>) -> Response {
    status_for(&state, &label)
}

fn status_for(state: &AppState, label: &str) -> Response {
    match state.probes.get(label) {
        Some(probe) => {
            let report = probe.report();
            debug!(mirror = label, status = report.status, "status_checked");
            Json(report).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown mirror: {label}") })),
        )
            .into_response(),
    }
}

/// Bind the status server. The returned future runs until `shutdown` fires.
pub async fn serve(
    addr: String,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<
    (
        SocketAddr,
        impl std::future::Future<Output = Result<(), std::io::Error>>,
    ),
    std::io::Error,
> {
    let listener = TcpListener::bind(addr.as_str()).await?;
    let bound_addr = listener.local_addr()?;

    let app = router(state);

    let fut = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    };

    Ok((bound_addr, fut))
}
