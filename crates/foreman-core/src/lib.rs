//! Core types and error definitions for the Foreman orchestrator.
//!
//! This crate provides the foundational types shared across all Foreman crates:
//! the unified error enum, the closed set of agent roles, and the message
//! representation exchanged between roles.
//!
//! # Main types
//!
//! - [`ForemanError`]: Unified error enum for all Foreman subsystems.
//! - [`ForemanResult`]: Convenience alias for `Result<T, ForemanError>`.
//! - [`Role`]: Job category an agent is registered under.
//! - [`AgentMessage`]: An immutable message sent from one role to another.
//! - [`MessagePriority`]: Priority attached to messages and tasks.

/// Error types.
pub mod error;
/// Role-addressed messages.
pub mod message;
/// The closed set of agent roles.
pub mod role;

pub use error::{ForemanError, ForemanResult};
pub use message::{AgentMessage, MessagePriority};
pub use role::Role;

/// Identifier of a registered agent.
pub type AgentId = uuid::Uuid;
