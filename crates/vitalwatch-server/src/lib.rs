//! Local HTTP status API for a running vitalwatch agent.
//!
//! Read-only apart from `POST /vitals/refresh`, which asks the agent for an
//! immediate telemetry cycle.

use std::sync::Arc;

use axum::{Router, extract::State, http::StatusCode, response::Json, routing::get, routing::post};
use serde::Serialize;
use tokio::net::TcpListener;

use vitalwatch_agent::{AgentControl, AgentStatus, Lifecycle};

type SharedAgent = Arc<dyn AgentControl>;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    lifecycle: Lifecycle,
    push_connected: bool,
    worn: bool,
}

#[derive(Serialize)]
struct RefreshResponse {
    requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn handle_health(State(agent): State<SharedAgent>) -> (StatusCode, Json<HealthResponse>) {
    let status = agent.status();
    let running = status.lifecycle == Lifecycle::Running;
    let code = if running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(HealthResponse {
            status: if running { "running" } else { "stopped" },
            lifecycle: status.lifecycle,
            push_connected: status.push_connected,
            worn: status.worn,
        }),
    )
}

async fn handle_status(State(agent): State<SharedAgent>) -> Json<AgentStatus> {
    Json(agent.status())
}

async fn handle_refresh(State(agent): State<SharedAgent>) -> (StatusCode, Json<RefreshResponse>) {
    if agent.request_fresh_vitals() {
        log::info!("fresh vitals requested over the status API");
        (
            StatusCode::ACCEPTED,
            Json(RefreshResponse {
                requested: true,
                error: None,
            }),
        )
    } else {
        (
            StatusCode::CONFLICT,
            Json(RefreshResponse {
                requested: false,
                error: Some(format!("agent is {}", agent.status().lifecycle)),
            }),
        )
    }
}

async fn handle_index(State(agent): State<SharedAgent>) -> Json<serde_json::Value> {
    let status = agent.status();
    Json(serde_json::json!({
        "name": "vitalwatch agent",
        "version": vitalwatch_core::VERSION,
        "patient_id": status.patient_id,
        "lifecycle": status.lifecycle,
        "endpoints": {
            "/": "This API index",
            "/health": "Lifecycle and push connectivity (503 unless running)",
            "/status": "Full agent status: engine, vitals, telemetry and dispatch counters",
            "/vitals/refresh": {
                "method": "POST",
                "description": "Send a vitals report now, outside the 5-minute schedule",
            },
        },
    }))
}

/// Build the axum router.
pub fn build_router(agent: SharedAgent) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/vitals/refresh", post(handle_refresh))
        .with_state(agent)
}

/// Serve the status API on an already-bound listener.
pub async fn serve(listener: TcpListener, agent: SharedAgent) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("status API listening on http://{addr}");
    }
    axum::serve(listener, build_router(agent)).await
}

/// Bind `host:port` and serve the status API until the task is dropped.
pub async fn run_server(agent: SharedAgent, host: &str, port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    serve(listener, agent).await
}
