//! Error taxonomy shared by the session service and its transports.
//!
//! Every failure is a kind plus a message. The resolution loop itself never
//! produces these; it only terminates through its own round conditions.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CombatError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    /// Missing or malformed roster, unknown base, broken snapshot invariant.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The session is in the wrong lifecycle state for the request.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// A collaborator or an internal export step failed; the caller's input was fine.
    #[error("{collaborator} unavailable: {message}")]
    DependencyUnavailable {
        collaborator: &'static str,
        message: String,
    },

    /// Narrative generation failed; callers substitute the templated chronicle.
    #[error("best-effort call failed: {0}")]
    BestEffortFailure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    PreconditionFailed,
    NotFound,
    DependencyUnavailable,
    BestEffortFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidInput => "invalid_input",
            Self::PreconditionFailed => "precondition_failed",
            Self::NotFound => "not_found",
            Self::DependencyUnavailable => "dependency_unavailable",
            Self::BestEffortFailure => "best_effort_failure",
        };
        write!(f, "{label}")
    }
}

impl CombatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DependencyUnavailable { .. } => ErrorKind::DependencyUnavailable,
            Self::BestEffortFailure(_) => ErrorKind::BestEffortFailure,
        }
    }

    pub fn session_not_found(id: &str) -> Self {
        Self::NotFound {
            what: "session",
            id: id.to_string(),
        }
    }
}

impl Serialize for CombatError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("CombatError", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Failure reported by an external collaborator (storage, ledger, narrative, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("record not found: {0}")]
    Missing(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}
