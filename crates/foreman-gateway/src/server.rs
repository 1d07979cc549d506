use crate::handlers;
use axum::{
    routing::{delete, get, post},
    Router,
};
use foreman_orchestrator::Orchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Shared application state.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the router over a shared orchestrator.
    pub fn build(orchestrator: Arc<Orchestrator>) -> Router {
        let state = Arc::new(AppState { orchestrator });

        Router::new()
            .route("/health", get(handlers::health))
            .route("/status", get(handlers::status))
            .route(
                "/agents",
                get(handlers::list_agents).post(handlers::register_agent),
            )
            .route("/agents/health", get(handlers::agent_health))
            .route("/agents/{id}", delete(handlers::deregister_agent))
            .route("/execute", post(handlers::execute))
            .route("/tasks", get(handlers::list_tasks))
            .route("/tasks/{id}", get(handlers::get_task))
            .route("/messages", post(handlers::send_message))
            .route("/messages/{role}", get(handlers::messages_for))
            .route("/handoffs", post(handlers::initiate_handoff))
            .route("/handoffs/{id}", get(handlers::get_handoff))
            .route("/handoffs/{id}/ack", post(handlers::acknowledge_handoff))
            .route("/workflows/{project_id}", get(handlers::workflow))
            .route("/context/{project_id}", get(handlers::context))
            .with_state(state)
    }

    /// Bind `addr` and serve until the process exits.
    pub async fn serve(orchestrator: Arc<Orchestrator>, addr: SocketAddr) -> std::io::Result<()> {
        let app = Self::build(orchestrator);
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Foreman gateway listening");
        axum::serve(listener, app).await
    }
}
