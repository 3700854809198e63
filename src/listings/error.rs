use serde::Serialize;

use super::domain::{ActorId, ApplicationId, ApplicationStatus, PropertyId};
use super::gateway::GatewayError;
use super::session::{OperationKind, Role};

/// Coarse classification surfaced alongside every error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    Remote,
}

/// Local precondition failures. None of these reach the gateway.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("price must be greater than zero (got {0})")]
    NonPositivePrice(f64),
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("application {0} is no longer pending")]
    NotPending(ApplicationId),
    #[error("property {0} is not open for this buyer")]
    PropertyNotOpen(PropertyId),
    #[error("property {0} is not in the store")]
    UnknownProperty(PropertyId),
    #[error("application {0} is not in the store")]
    UnknownApplication(ApplicationId),
    #[error("no application on property {0} to act on")]
    NoApplicationFor(PropertyId),
    #[error("deletion of property {0} was not confirmed")]
    NotConfirmed(PropertyId),
}

/// Failure of a coordinator operation. The store is left as it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{operation} rejected: {reason}")]
    Validation {
        operation: OperationKind,
        reason: ValidationFailure,
    },
    #[error("{operation} is not permitted for {role} {actor}")]
    Authorization {
        operation: OperationKind,
        role: Role,
        actor: ActorId,
    },
    #[error("{operation} failed remotely: {source}")]
    Remote {
        operation: OperationKind,
        #[source]
        source: GatewayError,
    },
}

impl SyncError {
    pub(crate) fn validation(operation: OperationKind, reason: ValidationFailure) -> Self {
        Self::Validation { operation, reason }
    }

    pub(crate) fn remote(operation: OperationKind) -> impl FnOnce(GatewayError) -> Self {
        move |source| Self::Remote { operation, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation { .. } => ErrorKind::Validation,
            SyncError::Authorization { .. } => ErrorKind::Authorization,
            SyncError::Remote { .. } => ErrorKind::Remote,
        }
    }

    pub fn operation(&self) -> OperationKind {
        match self {
            SyncError::Validation { operation, .. }
            | SyncError::Authorization { operation, .. }
            | SyncError::Remote { operation, .. } => *operation,
        }
    }

    pub fn validation_failure(&self) -> Option<&ValidationFailure> {
        match self {
            SyncError::Validation { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self.validation_failure(),
            Some(ValidationFailure::InvalidTransition { .. })
        )
    }
}
