use thiserror::Error;

/// A convenience `Result` alias using [`ForemanError`].
pub type ForemanResult<T> = Result<T, ForemanError>;

/// Top-level error type for the Foreman orchestrator.
#[derive(Error, Debug)]
pub enum ForemanError {
    /// An agent with the same explicit id is already registered.
    #[error("Agent {0} is already registered")]
    DuplicateRegistration(uuid::Uuid),

    /// Lookup of an agent, task, handoff, workflow or context entry failed.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up (`agent`, `task`, `handoff`, ...).
        kind: &'static str,
        /// The id that was not found.
        id: String,
    },

    /// Marking the agent busy would push its workload past its capacity.
    #[error("Agent {agent_id} is at capacity ({capacity})")]
    CapacityExceeded {
        /// The saturated agent.
        agent_id: uuid::Uuid,
        /// Its maximum number of concurrent tasks.
        capacity: u32,
    },

    /// No idle agent covers the required capability set.
    #[error("No suitable agent for capabilities [{}]", required.join(", "))]
    NoSuitableAgent {
        /// The capability set nobody could satisfy.
        required: Vec<String>,
        /// Catalog roles whose profile covers `required`; empty when no
        /// role could ever take the task.
        covering_roles: Vec<crate::Role>,
    },

    /// The agent's opaque execution call failed.
    #[error("Agent execution error: {0}")]
    AgentExecution(String),

    /// A lifecycle transition that the current state does not allow.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForemanError {
    /// Shorthand for a [`ForemanError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
