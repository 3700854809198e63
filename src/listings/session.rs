use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{ActorId, Application, Property};
use super::error::SyncError;

/// The two kinds of actor the client serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Buyer,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Buyer => "buyer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "agent" => Some(Self::Agent),
            "buyer" => Some(Self::Buyer),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Every user-intended change the coordinator can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateProperty,
    UpdateProperty,
    DeleteProperty,
    Apply,
    CancelApplication,
    ApproveApplication,
    RejectApplication,
    AddToWishlist,
    RemoveFromWishlist,
    Refresh,
}

impl OperationKind {
    pub const fn label(self) -> &'static str {
        match self {
            OperationKind::CreateProperty => "create property",
            OperationKind::UpdateProperty => "update property",
            OperationKind::DeleteProperty => "delete property",
            OperationKind::Apply => "apply to property",
            OperationKind::CancelApplication => "cancel application",
            OperationKind::ApproveApplication => "approve application",
            OperationKind::RejectApplication => "reject application",
            OperationKind::AddToWishlist => "add to wishlist",
            OperationKind::RemoveFromWishlist => "remove from wishlist",
            OperationKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a mutation acts on, as far as the local store knows.
#[derive(Debug, Clone, Copy)]
pub enum MutationTarget<'a> {
    None,
    Property(&'a Property),
    /// An application and, when present in the store, the listing it references.
    Application {
        application: &'a Application,
        property: Option<&'a Property>,
    },
}

/// Opaque bearer credential. Storage and retrieval belong to the caller.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Credential bundle attached to every gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub role: Role,
    pub token: BearerToken,
}

/// The current actor. Passed explicitly to the coordinator and views.
#[derive(Debug, Clone)]
pub struct RoleSession {
    actor: ActorId,
    role: Role,
    token: BearerToken,
}

impl RoleSession {
    pub fn new(actor: ActorId, role: Role, token: BearerToken) -> Self {
        Self { actor, role, token }
    }

    pub fn agent(actor: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(ActorId::new(actor), Role::Agent, BearerToken::new(token))
    }

    pub fn buyer(actor: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(ActorId::new(actor), Role::Buyer, BearerToken::new(token))
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn auth(&self) -> AuthContext {
        AuthContext {
            role: self.role,
            token: self.token.clone(),
        }
    }

    /// Advisory local check; the server still has the final say.
    pub fn can_mutate(&self, operation: OperationKind, target: MutationTarget<'_>) -> bool {
        use OperationKind::*;

        match (self.role, operation) {
            (_, Refresh) => true,
            (Role::Agent, CreateProperty) => true,
            (Role::Agent, UpdateProperty | DeleteProperty) => match target {
                MutationTarget::Property(property) => property.is_owned_by(&self.actor),
                _ => false,
            },
            (Role::Agent, ApproveApplication | RejectApplication) => match target {
                MutationTarget::Application {
                    property: Some(property),
                    ..
                } => property.is_owned_by(&self.actor),
                _ => false,
            },
            (Role::Buyer, Apply) => matches!(target, MutationTarget::Property(_)),
            (Role::Buyer, CancelApplication) => match target {
                MutationTarget::Application { application, .. } => {
                    application.applicant == self.actor
                }
                _ => false,
            },
            (Role::Buyer, AddToWishlist | RemoveFromWishlist) => true,
            _ => false,
        }
    }

    /// [`Self::can_mutate`] as a `Result` for use with `?`.
    pub fn authorize(
        &self,
        operation: OperationKind,
        target: MutationTarget<'_>,
    ) -> Result<(), SyncError> {
        if self.can_mutate(operation, target) {
            Ok(())
        } else {
            Err(SyncError::Authorization {
                operation,
                role: self.role,
                actor: self.actor.clone(),
            })
        }
    }
}
