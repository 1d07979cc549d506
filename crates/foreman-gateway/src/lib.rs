//! HTTP gateway for the Foreman orchestrator.
//!
//! Exposes agent registration, task execution, messaging, handoffs and
//! workflow/context queries as a JSON API over a shared
//! [`foreman_orchestrator::Orchestrator`].

/// API error mapping.
pub mod error;
/// Request handlers.
pub mod handlers;
/// Router construction and shared state.
pub mod server;

pub use error::{ApiError, ErrorResponse};
pub use server::{AppState, GatewayServer};
