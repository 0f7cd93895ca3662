//! The read-only HTTP JSON API (§6): a direct, unpaginated projection of the
//! state store. Carries no auth or rate-limit layers — §1 excludes
//! authentication and transport security from this system's scope.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};
use crate::store::StateStore;

#[derive(Debug, Serialize)]
pub struct AgentView {
    pub id: String,
    pub name: String,
    #[serde(rename = "pingRateMs")]
    pub ping_rate_ms: u64,
    pub resources: Vec<crate::messages::Resource>,
    pub attributes: Vec<crate::messages::Attribute>,
    #[serde(rename = "lastPing")]
    pub last_ping: u64,
}

#[derive(Clone)]
struct ApiState {
    store: StateStore,
}

/// Builds the router; callers choose how to serve it (`run` below binds a
/// TCP listener directly and serves it).
pub fn router(store: StateStore) -> Router {
    let state = ApiState { store };

    Router::new()
        .route("/", get(get_agents))
        .route("/agents", get(get_agents))
        .route("/frameworks", get(get_frameworks))
        .route("/tasks", get(get_tasks))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(host: &str, port: u16, store: StateStore) -> Result<()> {
    let app = router(store);
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}"))
        .await
        .map_err(Error::Io)?;

    tracing::info!(%host, port, "read-only HTTP API listening");
    axum::serve(listener, app).await.map_err(Error::Io)?;
    Ok(())
}

async fn get_agents(State(state): State<ApiState>) -> Json<Vec<AgentView>> {
    let agents = state.store.list_agents().await;
    Json(
        agents
            .into_iter()
            .map(|(info, last_ping)| AgentView {
                id: info.id,
                name: info.name,
                ping_rate_ms: info.ping_rate_ms,
                resources: info.resources,
                attributes: info.attributes,
                last_ping,
            })
            .collect(),
    )
}

async fn get_frameworks(
    State(state): State<ApiState>,
) -> Json<Vec<crate::messages::FrameworkInfo>> {
    Json(state.store.list_frameworks().await)
}

async fn get_tasks(State(state): State<ApiState>) -> Json<Vec<crate::messages::TaskInfo>> {
    Json(state.store.list_tasks().await)
}
