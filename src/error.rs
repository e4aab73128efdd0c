use serde::Serialize;
use thiserror::Error;

use crate::schema::Violation;

/// Represents all possible failures of a contract invocation
#[derive(Error, Debug)]
pub enum ContractError {
    /// A payload does not match the template governing the operation
    #[error("validateStructure: {0}")]
    Structure(#[from] Violation),

    /// The ledger's recomputed post-state disagrees with the caller-supplied figure
    #[error("{0}")]
    Consistency(String),

    /// A record addressed by the call does not exist
    #[error("{0}")]
    NotFound(String),

    /// A record or external id has already been stored
    #[error("{0}")]
    AlreadyExists(String),

    /// A balance or credit line is too small for the requested amount
    #[error("{0}")]
    Insufficient(String),

    /// A required field is empty or malformed
    #[error("{0}")]
    RequiredField(String),

    /// The caller is not authorized for this specific resource
    #[error("{0}")]
    Unauthorized(String),

    /// The contract has not been initialized yet
    #[error("The contract has not been initialized")]
    NotInitialized,

    /// Errors surfaced by the underlying state store
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Anyhow error wrapper for error context
    #[error(transparent)]
    Context(#[from] anyhow::Error),
}

impl ContractError {
    /// Numeric contract code reported in the external error envelope
    pub fn code(&self) -> u32 {
        match self {
            ContractError::Insufficient(_) => 3001,
            ContractError::AlreadyExists(_) => 3002,
            ContractError::RequiredField(_) => 3005,
            ContractError::Structure(_) | ContractError::Consistency(_) => 3006,
            ContractError::Unauthorized(_) => 3007,
            ContractError::NotFound(_) => 3008,
            ContractError::NotInitialized => 4001,
            ContractError::Store(_)
            | ContractError::Serialization(_)
            | ContractError::Context(_) => 5001,
        }
    }
}

impl From<serde_json::Error> for ContractError {
    fn from(err: serde_json::Error) -> Self {
        ContractError::Serialization(err.to_string())
    }
}

/// The uniform failure envelope returned to the host as the call's reason.
///
/// Rendered as a JSON string: `{"contract_code":3006,"contract_msg":"..."}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub contract_code: u32,
    pub contract_msg: String,
}

impl ErrorEnvelope {
    /// Wrap a contract error for the named entrypoint.
    ///
    /// Structural violations already carry their own `validateStructure:`
    /// prefix and are passed through unchanged; every other error is
    /// prefixed with the operation name.
    pub fn wrap(operation: &str, err: ContractError) -> Self {
        let contract_code = err.code();
        let contract_msg = match err {
            ContractError::Structure(_) => err.to_string(),
            _ => format!("{}: {}", operation, err),
        };
        ErrorEnvelope {
            contract_code,
            contract_msg,
        }
    }
}

impl std::fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{\"contract_code\":{},\"contract_msg\":{}}}",
            self.contract_code,
            serde_json::Value::from(self.contract_msg.as_str())
        )
    }
}
