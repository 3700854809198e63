//! Remote API boundary. Everything behind this trait (transport, authentication, server-side
//! persistence) is owned by an external collaborator.

pub mod http;
pub mod memory;

use async_trait::async_trait;

use super::domain::{
    Application, ApplicationId, Decision, Property, PropertyDraft, PropertyId, WishlistEntry,
};
use super::session::AuthContext;

pub use http::HttpGateway;
pub use memory::InMemoryGateway;

/// Authenticated CRUD over listings, applications and wishlist entries.
///
/// Implementations report failure only as [`GatewayError`]; the coordinator does not look
/// at transport-specific codes beyond success or failure.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn list_properties(&self, auth: &AuthContext) -> Result<Vec<Property>, GatewayError>;

    async fn create_property(
        &self,
        draft: &PropertyDraft,
        auth: &AuthContext,
    ) -> Result<Property, GatewayError>;

    async fn update_property(
        &self,
        id: &PropertyId,
        draft: &PropertyDraft,
        auth: &AuthContext,
    ) -> Result<Property, GatewayError>;

    async fn delete_property(&self, id: &PropertyId, auth: &AuthContext)
        -> Result<(), GatewayError>;

    /// Applications visible to the caller; scope is filtered server-side by role.
    async fn list_applications(
        &self,
        auth: &AuthContext,
    ) -> Result<Vec<Application>, GatewayError>;

    async fn submit_application(
        &self,
        property_id: &PropertyId,
        auth: &AuthContext,
    ) -> Result<Application, GatewayError>;

    async fn cancel_application(
        &self,
        id: &ApplicationId,
        auth: &AuthContext,
    ) -> Result<(), GatewayError>;

    async fn decide_application(
        &self,
        id: &ApplicationId,
        decision: Decision,
        auth: &AuthContext,
    ) -> Result<Application, GatewayError>;

    async fn list_wishlist(&self, auth: &AuthContext) -> Result<Vec<WishlistEntry>, GatewayError>;

    async fn add_to_wishlist(
        &self,
        property_id: &PropertyId,
        auth: &AuthContext,
    ) -> Result<WishlistEntry, GatewayError>;

    async fn remove_from_wishlist(
        &self,
        property_id: &PropertyId,
        auth: &AuthContext,
    ) -> Result<(), GatewayError>;
}

/// Failure signal from the remote side.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected response payload: {0}")]
    Payload(String),
}
