//! The error taxonomy shared by command handlers, the message buses and
//! their callers.

use crate::aggregate::repository;
use crate::version::ConflictError;

/// A typed failure surfaced by the write path of the system.
///
/// Every command handler resolves its internal errors into one of these
/// variants, so callers (and the [CommandBus][crate::command::CommandBus])
/// can tell recoverable conflicts apart from domain refusals and
/// infrastructure failures.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    /// An optimistic concurrency check failed. Recoverable: reload the
    /// Aggregate and retry the command.
    #[error("concurrent modification detected: {0}")]
    Conflict(#[from] ConflictError),

    /// The referenced entity does not exist.
    #[error("{0} was not found")]
    NotFound(String),

    /// A domain invariant refused the operation. No state was changed.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The authorization hook refused the command.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No handler is registered for the message type. Configuration bug.
    #[error("no handler registered for {0}")]
    NoHandler(&'static str),

    /// More than one handler is registered for a command type.
    /// Configuration bug.
    #[error("multiple handlers registered for command {0}")]
    Misconfigured(&'static str),

    /// The underlying storage failed. Fatal to the current operation.
    #[error(transparent)]
    Storage(anyhow::Error),
}

impl Fault {
    /// Shorthand for a [Fault::NotFound] naming the missing entity.
    pub fn not_found(entity: impl Into<String>) -> Self {
        Fault::NotFound(entity.into())
    }

    /// Shorthand for a [Fault::InvalidOperation] with the given reason.
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Fault::InvalidOperation(reason.into())
    }
}

impl From<repository::Error> for Fault {
    fn from(err: repository::Error) -> Self {
        match err {
            repository::Error::NotFound => Fault::NotFound("aggregate".to_owned()),
            repository::Error::Conflict(conflict) => Fault::Conflict(conflict),
            repository::Error::Rehydrate(inner) | repository::Error::Store(inner) => {
                Fault::Storage(inner)
            }
        }
    }
}
