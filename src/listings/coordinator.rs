use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Decision, Property, PropertyDraft, PropertyId,
    WishlistEntry,
};
use super::error::{SyncError, ValidationFailure};
use super::gateway::RemoteGateway;
use super::reconcile::{self, MergeOutcome};
use super::session::{MutationTarget, OperationKind, Role, RoleSession};
use super::store::{CollectionKind, EntityStore, SharedStore};
use super::views::ViewDeriver;

/// How the store is brought back in line with the server after a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// Apply the server-confirmed delta directly.
    #[default]
    Patch,
    /// Reload every affected collection from the gateway.
    Refetch,
}

impl ReconcileMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "patch" => Some(Self::Patch),
            "refetch" => Some(Self::Refetch),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ReconcileMode::Patch => "patch",
            ReconcileMode::Refetch => "refetch",
        }
    }
}

impl fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Explicit user confirmation for destructive operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

/// Result of a wishlist toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WishlistChange {
    Added(WishlistEntry),
    Removed,
    /// Membership already matched the request; nothing was sent.
    Unchanged,
}

/// One async lock per collection, always taken in properties, applications, wishlist order.
#[derive(Debug, Default)]
struct CollectionLocks {
    properties: Mutex<()>,
    applications: Mutex<()>,
    wishlist: Mutex<()>,
}

impl CollectionLocks {
    async fn acquire(&self, kinds: &[CollectionKind]) -> Vec<MutexGuard<'_, ()>> {
        let mut guards = Vec::with_capacity(3);
        for (kind, lock) in [
            (CollectionKind::Properties, &self.properties),
            (CollectionKind::Applications, &self.applications),
            (CollectionKind::Wishlist, &self.wishlist),
        ] {
            if kinds.contains(&kind) {
                guards.push(lock.lock().await);
            }
        }
        guards
    }
}

/// Freshly fetched collections waiting to be applied in one write.
#[derive(Debug, Default)]
struct Fetched {
    properties: Option<Vec<Property>>,
    applications: Option<Vec<Application>>,
    wishlist: Option<Vec<WishlistEntry>>,
}

impl Fetched {
    fn apply(self, store: &mut EntityStore) {
        if let Some(properties) = self.properties {
            store.load(properties);
        }
        if let Some(applications) = self.applications {
            reconcile::load_applications(store, applications);
        }
        if let Some(wishlist) = self.wishlist {
            store.load(wishlist);
        }
    }
}

/// Executes mutations against the gateway and reconciles the session store.
///
/// Every operation checks its preconditions against the store, asks the session whether
/// the actor may perform it, calls the gateway, and only then touches the store. A failed
/// operation leaves the store exactly as it was.
pub struct MutationCoordinator<G> {
    gateway: Arc<G>,
    session: RoleSession,
    store: SharedStore,
    mode: ReconcileMode,
    locks: CollectionLocks,
}

impl<G> MutationCoordinator<G>
where
    G: RemoteGateway + 'static,
{
    pub fn new(gateway: Arc<G>, session: RoleSession, mode: ReconcileMode) -> Self {
        Self::with_store(gateway, session, mode, SharedStore::default())
    }

    pub fn with_store(
        gateway: Arc<G>,
        session: RoleSession,
        mode: ReconcileMode,
        store: SharedStore,
    ) -> Self {
        Self {
            gateway,
            session,
            store,
            mode,
            locks: CollectionLocks::default(),
        }
    }

    pub fn session(&self) -> &RoleSession {
        &self.session
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    /// Initial (or forced) full load of every collection the role works with.
    pub async fn refresh_all(&self) -> Result<(), SyncError> {
        let operation = OperationKind::Refresh;
        let kinds: &[CollectionKind] = match self.session.role() {
            Role::Agent => &[CollectionKind::Properties, CollectionKind::Applications],
            Role::Buyer => &[
                CollectionKind::Properties,
                CollectionKind::Applications,
                CollectionKind::Wishlist,
            ],
        };

        let outcome: Result<(), SyncError> = async {
            let _locks = self.locks.acquire(kinds).await;
            let fetched = self.fetch(kinds, operation).await?;
            fetched.apply(&mut self.store.write());
            Ok(())
        }
        .await;

        if outcome.is_ok() {
            let store = self.store.read();
            info!(
                actor = %self.session.actor(),
                role = %self.session.role(),
                properties = store.properties().len(),
                applications = store.applications().len(),
                wishlist = store.wishlist().len(),
                "session store refreshed"
            );
        }
        self.finish(operation, outcome)
    }

    pub async fn create_property(&self, draft: PropertyDraft) -> Result<Property, SyncError> {
        let operation = OperationKind::CreateProperty;
        let outcome: Result<Property, SyncError> = async {
            self.session.authorize(operation, MutationTarget::None)?;
            ensure_price(operation, &draft)?;

            let _locks = self.locks.acquire(&[CollectionKind::Properties]).await;
            let created = self
                .gateway
                .create_property(&draft, &self.session.auth())
                .await
                .map_err(SyncError::remote(operation))?;

            match self.mode {
                ReconcileMode::Patch => {
                    self.store.write().upsert(created.clone());
                }
                ReconcileMode::Refetch => {
                    self.reload(&[CollectionKind::Properties], operation).await?
                }
            }

            info!(property_id = %created.id, mode = %self.mode, "property created");
            Ok(created)
        }
        .await;
        self.finish(operation, outcome)
    }

    pub async fn update_property(
        &self,
        property_id: &PropertyId,
        draft: PropertyDraft,
    ) -> Result<Property, SyncError> {
        let operation = OperationKind::UpdateProperty;
        let outcome: Result<Property, SyncError> = async {
            let _locks = self.locks.acquire(&[CollectionKind::Properties]).await;
            {
                let store = self.store.read();
                let current = lookup_property(&store, operation, property_id)?;
                self.session
                    .authorize(operation, MutationTarget::Property(current))?;
            }
            ensure_price(operation, &draft)?;

            let updated = self
                .gateway
                .update_property(property_id, &draft, &self.session.auth())
                .await
                .map_err(SyncError::remote(operation))?;

            match self.mode {
                ReconcileMode::Patch => {
                    self.store.write().upsert(updated.clone());
                }
                ReconcileMode::Refetch => {
                    self.reload(&[CollectionKind::Properties], operation).await?
                }
            }

            info!(property_id = %updated.id, mode = %self.mode, "property updated");
            Ok(updated)
        }
        .await;
        self.finish(operation, outcome)
    }

    /// Delete a listing; its applications leave the store with it.
    pub async fn delete_property(
        &self,
        property_id: &PropertyId,
        confirmation: Confirmation,
    ) -> Result<(), SyncError> {
        let operation = OperationKind::DeleteProperty;
        let kinds = [CollectionKind::Properties, CollectionKind::Applications];
        let outcome: Result<(), SyncError> = async {
            let _locks = self.locks.acquire(&kinds).await;
            {
                let store = self.store.read();
                let current = lookup_property(&store, operation, property_id)?;
                self.session
                    .authorize(operation, MutationTarget::Property(current))?;
            }
            if confirmation != Confirmation::Confirmed {
                return Err(SyncError::validation(
                    operation,
                    ValidationFailure::NotConfirmed(property_id.clone()),
                ));
            }

            self.gateway
                .delete_property(property_id, &self.session.auth())
                .await
                .map_err(SyncError::remote(operation))?;

            let cascaded = match self.mode {
                ReconcileMode::Patch => {
                    let mut store = self.store.write();
                    reconcile::remove_property(&mut store, property_id)
                }
                ReconcileMode::Refetch => {
                    let before = self.store.read().applications().len();
                    self.reload(&kinds, operation).await?;
                    before.saturating_sub(self.store.read().applications().len())
                }
            };

            info!(%property_id, cascaded, mode = %self.mode, "property deleted");
            Ok(())
        }
        .await;
        self.finish(operation, outcome)
    }

    /// Submit a pending application on a property that is still open for this buyer.
    pub async fn apply(&self, property_id: &PropertyId) -> Result<Application, SyncError> {
        let operation = OperationKind::Apply;
        let outcome: Result<Application, SyncError> = async {
            let _locks = self
                .locks
                .acquire(&[CollectionKind::Properties, CollectionKind::Applications])
                .await;
            {
                let store = self.store.read();
                let property = lookup_property(&store, operation, property_id)?;
                self.session
                    .authorize(operation, MutationTarget::Property(property))?;
                if !ViewDeriver::new(&store).is_open_for(self.session.actor(), property_id) {
                    return Err(SyncError::validation(
                        operation,
                        ValidationFailure::PropertyNotOpen(property_id.clone()),
                    ));
                }
            }

            let submitted = self
                .gateway
                .submit_application(property_id, &self.session.auth())
                .await
                .map_err(SyncError::remote(operation))?;

            match self.mode {
                ReconcileMode::Patch => {
                    reconcile::merge_application(&mut self.store.write(), submitted.clone());
                }
                ReconcileMode::Refetch => {
                    self.reload(&[CollectionKind::Applications], operation)
                        .await?
                }
            }

            info!(
                application_id = %submitted.id,
                %property_id,
                mode = %self.mode,
                "application submitted"
            );
            Ok(submitted)
        }
        .await;
        self.finish(operation, outcome)
    }

    /// Withdraw a pending application. Cancelling deletes the record.
    pub async fn cancel_application(&self, application_id: &ApplicationId) -> Result<(), SyncError> {
        let operation = OperationKind::CancelApplication;
        let outcome: Result<(), SyncError> = async {
            let _locks = self.locks.acquire(&[CollectionKind::Applications]).await;
            {
                let store = self.store.read();
                let application = lookup_application(&store, operation, application_id)?;
                let property = store.get::<Property>(&application.property_id);
                self.session.authorize(
                    operation,
                    MutationTarget::Application {
                        application,
                        property,
                    },
                )?;
                if application.status != ApplicationStatus::Pending {
                    return Err(SyncError::validation(
                        operation,
                        ValidationFailure::NotPending(application_id.clone()),
                    ));
                }
            }

            self.gateway
                .cancel_application(application_id, &self.session.auth())
                .await
                .map_err(SyncError::remote(operation))?;

            match self.mode {
                ReconcileMode::Patch => {
                    self.store.write().remove::<Application>(application_id);
                }
                ReconcileMode::Refetch => {
                    self.reload(&[CollectionKind::Applications], operation)
                        .await?
                }
            }

            info!(%application_id, mode = %self.mode, "application cancelled");
            Ok(())
        }
        .await;
        self.finish(operation, outcome)
    }

    /// Cancel whichever application this buyer holds on `property_id`.
    pub async fn cancel_application_for(&self, property_id: &PropertyId) -> Result<(), SyncError> {
        let target = {
            let store = self.store.read();
            let views = ViewDeriver::new(&store);
            let target = views
                .application_for(self.session.actor(), property_id)
                .map(|application| application.id.clone());
            target
        };
        match target {
            Some(application_id) => self.cancel_application(&application_id).await,
            None => self.finish(
                OperationKind::CancelApplication,
                Err(SyncError::validation(
                    OperationKind::CancelApplication,
                    ValidationFailure::NoApplicationFor(property_id.clone()),
                )),
            ),
        }
    }

    pub async fn approve(&self, application_id: &ApplicationId) -> Result<Application, SyncError> {
        self.decide(application_id, Decision::Approve).await
    }

    pub async fn reject(&self, application_id: &ApplicationId) -> Result<Application, SyncError> {
        self.decide(application_id, Decision::Reject).await
    }

    /// Move a pending application to a terminal status.
    ///
    /// Deciding an already decided application fails with an invalid transition, including
    /// when a competing decision lands first.
    pub async fn decide(
        &self,
        application_id: &ApplicationId,
        decision: Decision,
    ) -> Result<Application, SyncError> {
        let operation = match decision {
            Decision::Approve => OperationKind::ApproveApplication,
            Decision::Reject => OperationKind::RejectApplication,
        };
        let target_status = decision.status();
        let outcome: Result<Application, SyncError> = async {
            let _locks = self
                .locks
                .acquire(&[CollectionKind::Properties, CollectionKind::Applications])
                .await;
            {
                let store = self.store.read();
                let application = lookup_application(&store, operation, application_id)?;
                let property = store.get::<Property>(&application.property_id);
                self.session.authorize(
                    operation,
                    MutationTarget::Application {
                        application,
                        property,
                    },
                )?;
                if !application.status.can_transition_to(target_status) {
                    return Err(invalid_transition(
                        operation,
                        application.status,
                        target_status,
                    ));
                }
            }

            let decided = self
                .gateway
                .decide_application(application_id, decision, &self.session.auth())
                .await
                .map_err(SyncError::remote(operation))?;

            let fetched = match self.mode {
                ReconcileMode::Patch => None,
                ReconcileMode::Refetch => {
                    Some(self.fetch(&[CollectionKind::Applications], operation).await?)
                }
            };

            let mut store = self.store.write();
            if let MergeOutcome::Conflict { local, incoming } =
                reconcile::terminal_conflict(&store, &decided)
            {
                return Err(invalid_transition(operation, local, incoming));
            }
            match fetched {
                Some(fetched) => fetched.apply(&mut store),
                None => {
                    reconcile::merge_application(&mut store, decided.clone());
                }
            }
            drop(store);

            info!(
                %application_id,
                status = %decided.status,
                mode = %self.mode,
                "application decided"
            );
            Ok(decided)
        }
        .await;
        self.finish(operation, outcome)
    }

    /// Bookmark a property. Already-present entries are left alone without a gateway call.
    pub async fn add_to_wishlist(&self, property_id: &PropertyId) -> Result<WishlistChange, SyncError> {
        let operation = OperationKind::AddToWishlist;
        let outcome: Result<WishlistChange, SyncError> = async {
            self.session.authorize(operation, MutationTarget::None)?;
            let _locks = self.locks.acquire(&[CollectionKind::Wishlist]).await;
            if self.is_wishlisted(property_id) {
                return Ok(WishlistChange::Unchanged);
            }

            let entry = self
                .gateway
                .add_to_wishlist(property_id, &self.session.auth())
                .await
                .map_err(SyncError::remote(operation))?;

            match self.mode {
                ReconcileMode::Patch => {
                    reconcile::insert_wishlist_entry(&mut self.store.write(), entry.clone());
                }
                ReconcileMode::Refetch => {
                    self.reload(&[CollectionKind::Wishlist], operation).await?
                }
            }

            info!(%property_id, entry_id = %entry.id, mode = %self.mode, "wishlist entry added");
            Ok(WishlistChange::Added(entry))
        }
        .await;
        self.finish(operation, outcome)
    }

    /// Drop a bookmark. Absent entries are a no-op without a gateway call.
    pub async fn remove_from_wishlist(
        &self,
        property_id: &PropertyId,
    ) -> Result<WishlistChange, SyncError> {
        let operation = OperationKind::RemoveFromWishlist;
        let outcome: Result<WishlistChange, SyncError> = async {
            self.session.authorize(operation, MutationTarget::None)?;
            let _locks = self.locks.acquire(&[CollectionKind::Wishlist]).await;
            if !self.is_wishlisted(property_id) {
                return Ok(WishlistChange::Unchanged);
            }

            self.gateway
                .remove_from_wishlist(property_id, &self.session.auth())
                .await
                .map_err(SyncError::remote(operation))?;

            match self.mode {
                ReconcileMode::Patch => {
                    reconcile::remove_wishlist_entry(
                        &mut self.store.write(),
                        self.session.actor(),
                        property_id,
                    );
                }
                ReconcileMode::Refetch => {
                    self.reload(&[CollectionKind::Wishlist], operation).await?
                }
            }

            info!(%property_id, mode = %self.mode, "wishlist entry removed");
            Ok(WishlistChange::Removed)
        }
        .await;
        self.finish(operation, outcome)
    }

    fn is_wishlisted(&self, property_id: &PropertyId) -> bool {
        let store = self.store.read();
        let wishlisted = ViewDeriver::new(&store).is_wishlisted(self.session.actor(), property_id);
        wishlisted
    }

    async fn fetch(
        &self,
        kinds: &[CollectionKind],
        operation: OperationKind,
    ) -> Result<Fetched, SyncError> {
        let auth = self.session.auth();
        let mut fetched = Fetched::default();
        for kind in kinds {
            match kind {
                CollectionKind::Properties => {
                    fetched.properties = Some(
                        self.gateway
                            .list_properties(&auth)
                            .await
                            .map_err(SyncError::remote(operation))?,
                    );
                }
                CollectionKind::Applications => {
                    fetched.applications = Some(
                        self.gateway
                            .list_applications(&auth)
                            .await
                            .map_err(SyncError::remote(operation))?,
                    );
                }
                CollectionKind::Wishlist => {
                    fetched.wishlist = Some(
                        self.gateway
                            .list_wishlist(&auth)
                            .await
                            .map_err(SyncError::remote(operation))?,
                    );
                }
            }
        }
        Ok(fetched)
    }

    /// Refetch `kinds` and apply them in a single write. Callers already hold the locks.
    async fn reload(&self, kinds: &[CollectionKind], operation: OperationKind) -> Result<(), SyncError> {
        let fetched = self.fetch(kinds, operation).await?;
        fetched.apply(&mut self.store.write());
        Ok(())
    }

    fn finish<T>(
        &self,
        operation: OperationKind,
        outcome: Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        if let Err(err) = &outcome {
            warn!(
                %operation,
                kind = ?err.kind(),
                actor = %self.session.actor(),
                error = %err,
                "operation failed"
            );
        }
        outcome
    }
}

fn ensure_price(operation: OperationKind, draft: &PropertyDraft) -> Result<(), SyncError> {
    if draft.has_valid_price() {
        Ok(())
    } else {
        Err(SyncError::validation(
            operation,
            ValidationFailure::NonPositivePrice(draft.price),
        ))
    }
}

fn invalid_transition(
    operation: OperationKind,
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> SyncError {
    SyncError::validation(operation, ValidationFailure::InvalidTransition { from, to })
}

fn lookup_property<'a>(
    store: &'a EntityStore,
    operation: OperationKind,
    property_id: &PropertyId,
) -> Result<&'a Property, SyncError> {
    store.get::<Property>(property_id).ok_or_else(|| {
        SyncError::validation(
            operation,
            ValidationFailure::UnknownProperty(property_id.clone()),
        )
    })
}

fn lookup_application<'a>(
    store: &'a EntityStore,
    operation: OperationKind,
    application_id: &ApplicationId,
) -> Result<&'a Application, SyncError> {
    store.get::<Application>(application_id).ok_or_else(|| {
        SyncError::validation(
            operation,
            ValidationFailure::UnknownApplication(application_id.clone()),
        )
    })
}
