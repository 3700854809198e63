//! Listing, application, and wishlist state for agent and buyer sessions.
//!
//! The [`MutationCoordinator`] is the only writer of a session's [`EntityStore`]; the
//! [`ViewDeriver`] and [`SessionView`] read from it. Server access goes through the
//! [`RemoteGateway`] trait.

pub mod coordinator;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod views;

#[cfg(test)]
mod tests;

pub use coordinator::{Confirmation, MutationCoordinator, ReconcileMode, WishlistChange};
pub use domain::{
    ActorId, Application, ApplicationId, ApplicationStatus, Decision, Property, PropertyDraft,
    PropertyId, PropertyType, WishlistEntry, WishlistEntryId,
};
pub use error::{ErrorKind, SyncError, ValidationFailure};
pub use gateway::{GatewayError, HttpGateway, InMemoryGateway, RemoteGateway};
pub use session::{AuthContext, BearerToken, MutationTarget, OperationKind, Role, RoleSession};
pub use store::{CollectionKind, DirtySet, EntityStore, Revisions, SharedStore};
pub use views::{ListingCard, SessionSnapshot, SessionView, StatusBuckets, ViewDeriver};
