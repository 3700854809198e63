//! Read-only projections over a store snapshot.
//!
//! Every query is recomputed from the collections on demand; cost is linear in the
//! collection sizes, which are bounded by what one session has fetched.

use std::collections::HashSet;

use serde::Serialize;

use super::domain::{
    ActorId, Application, ApplicationStatus, Property, PropertyId, PropertyType,
};
use super::session::{Role, RoleSession};
use super::store::{EntityStore, Revisions};

/// Role-parameterized queries borrowed from one store snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ViewDeriver<'a> {
    store: &'a EntityStore,
}

impl<'a> ViewDeriver<'a> {
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    /// A property stays open for a buyer until one of their applications on it is decided.
    pub fn is_open_for(&self, buyer: &ActorId, property_id: &PropertyId) -> bool {
        !self.store.applications().iter().any(|application| {
            &application.applicant == buyer
                && &application.property_id == property_id
                && application.is_decided()
        })
    }

    /// Properties still open for `buyer`, in store order.
    pub fn open_properties(
        &self,
        buyer: &ActorId,
        type_filter: Option<PropertyType>,
    ) -> Vec<&'a Property> {
        let decided: HashSet<&PropertyId> = self
            .store
            .applications()
            .iter()
            .filter(|application| &application.applicant == buyer && application.is_decided())
            .map(|application| &application.property_id)
            .collect();

        self.store
            .properties()
            .iter()
            .filter(|property| !decided.contains(&property.id))
            .filter(|property| type_filter.map_or(true, |kind| property.property_type == kind))
            .collect()
    }

    /// Applications in `status` that `actor` may see under `role`.
    pub fn applications_by_status(
        &self,
        role: Role,
        actor: &ActorId,
        status: ApplicationStatus,
    ) -> Vec<&'a Application> {
        self.visible_applications(role, actor)
            .into_iter()
            .filter(|application| application.status == status)
            .collect()
    }

    /// All visible applications partitioned by status in a single pass.
    pub fn status_buckets(&self, role: Role, actor: &ActorId) -> StatusBuckets<'a> {
        let mut buckets = StatusBuckets::default();
        for application in self.visible_applications(role, actor) {
            match application.status {
                ApplicationStatus::Pending => buckets.pending.push(application),
                ApplicationStatus::Approved => buckets.approved.push(application),
                ApplicationStatus::Rejected => buckets.rejected.push(application),
            }
        }
        buckets
    }

    pub fn is_wishlisted(&self, buyer: &ActorId, property_id: &PropertyId) -> bool {
        self.store
            .wishlist()
            .iter()
            .any(|entry| entry.matches(buyer, property_id))
    }

    /// The application a buyer holds on a property. A pending one wins over decided ones so
    /// a cancel always targets something cancellable; otherwise the latest submission.
    pub fn application_for(
        &self,
        buyer: &ActorId,
        property_id: &PropertyId,
    ) -> Option<&'a Application> {
        self.store
            .applications()
            .iter()
            .filter(|application| {
                &application.applicant == buyer && &application.property_id == property_id
            })
            .max_by_key(|application| {
                (
                    application.status == ApplicationStatus::Pending,
                    application.date_submitted,
                )
            })
    }

    /// Wishlisted properties in wishlist order. Entries whose property is not loaded are
    /// skipped.
    pub fn wishlisted_properties(&self, buyer: &ActorId) -> Vec<&'a Property> {
        self.store
            .wishlist()
            .iter()
            .filter(|entry| &entry.owner == buyer)
            .filter_map(|entry| self.store.get::<Property>(&entry.property_id))
            .collect()
    }

    /// Agent scope: applications on listings the agent owns. Buyer scope: own applications.
    fn visible_applications(&self, role: Role, actor: &ActorId) -> Vec<&'a Application> {
        let applications = self.store.applications().iter();
        match role {
            Role::Buyer => applications
                .filter(|application| &application.applicant == actor)
                .collect(),
            Role::Agent => {
                let owned: HashSet<&PropertyId> = self
                    .store
                    .properties()
                    .iter()
                    .filter(|property| property.is_owned_by(actor))
                    .map(|property| &property.id)
                    .collect();
                applications
                    .filter(|application| owned.contains(&application.property_id))
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusBuckets<'a> {
    pub pending: Vec<&'a Application>,
    pub approved: Vec<&'a Application>,
    pub rejected: Vec<&'a Application>,
}

impl<'a> StatusBuckets<'a> {
    pub fn get(&self, status: ApplicationStatus) -> &[&'a Application] {
        match status {
            ApplicationStatus::Pending => &self.pending,
            ApplicationStatus::Approved => &self.approved,
            ApplicationStatus::Rejected => &self.rejected,
        }
    }

    pub fn total(&self) -> usize {
        self.pending.len() + self.approved.len() + self.rejected.len()
    }
}

/// One row of the listings page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingCard {
    pub property: Property,
    pub wishlisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_status: Option<ApplicationStatus>,
    pub application_count: usize,
}

/// Everything the presentation layer renders for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub role: Role,
    pub actor: ActorId,
    pub listings: Vec<ListingCard>,
    pub pending: Vec<Application>,
    pub approved: Vec<Application>,
    pub rejected: Vec<Application>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wishlist: Vec<Property>,
}

impl SessionSnapshot {
    fn empty(role: Role, actor: ActorId) -> Self {
        Self {
            role,
            actor,
            listings: Vec::new(),
            pending: Vec::new(),
            approved: Vec::new(),
            rejected: Vec::new(),
            wishlist: Vec::new(),
        }
    }

    fn derive(
        role: Role,
        actor: &ActorId,
        type_filter: Option<PropertyType>,
        store: &EntityStore,
    ) -> Self {
        let views = ViewDeriver::new(store);
        let buckets = views.status_buckets(role, actor);

        let listings = match role {
            Role::Buyer => views
                .open_properties(actor, type_filter)
                .into_iter()
                .map(|property| ListingCard {
                    property: property.clone(),
                    wishlisted: views.is_wishlisted(actor, &property.id),
                    application_status: views
                        .application_for(actor, &property.id)
                        .map(|application| application.status),
                    application_count: 0,
                })
                .collect(),
            Role::Agent => store
                .properties()
                .iter()
                .filter(|property| property.is_owned_by(actor))
                .filter(|property| type_filter.map_or(true, |kind| property.property_type == kind))
                .map(|property| ListingCard {
                    property: property.clone(),
                    wishlisted: false,
                    application_status: None,
                    application_count: store
                        .applications()
                        .iter()
                        .filter(|application| application.property_id == property.id)
                        .count(),
                })
                .collect(),
        };

        let wishlist = match role {
            Role::Buyer => views
                .wishlisted_properties(actor)
                .into_iter()
                .cloned()
                .collect(),
            Role::Agent => Vec::new(),
        };

        Self {
            role,
            actor: actor.clone(),
            listings,
            pending: cloned(&buckets.pending),
            approved: cloned(&buckets.approved),
            rejected: cloned(&buckets.rejected),
            wishlist,
        }
    }
}

fn cloned(applications: &[&Application]) -> Vec<Application> {
    applications
        .iter()
        .map(|application| (*application).clone())
        .collect()
}

/// Lazily refreshed projection for one session.
///
/// Recomputes only when a collection was written since the previous read.
#[derive(Debug, Clone)]
pub struct SessionView {
    role: Role,
    actor: ActorId,
    type_filter: Option<PropertyType>,
    seen: Option<Revisions>,
    current: SessionSnapshot,
    recomputations: usize,
}

impl SessionView {
    pub fn new(session: &RoleSession) -> Self {
        Self {
            role: session.role(),
            actor: session.actor().clone(),
            type_filter: None,
            seen: None,
            current: SessionSnapshot::empty(session.role(), session.actor().clone()),
            recomputations: 0,
        }
    }

    pub fn with_type_filter(mut self, type_filter: Option<PropertyType>) -> Self {
        self.set_type_filter(type_filter);
        self
    }

    pub fn set_type_filter(&mut self, type_filter: Option<PropertyType>) {
        if self.type_filter != type_filter {
            self.type_filter = type_filter;
            self.seen = None;
        }
    }

    pub fn read(&mut self, store: &EntityStore) -> &SessionSnapshot {
        let stale = match &self.seen {
            Some(seen) => store.changed_since(seen).any(),
            None => true,
        };
        if stale {
            self.current = SessionSnapshot::derive(self.role, &self.actor, self.type_filter, store);
            self.seen = Some(store.revisions());
            self.recomputations += 1;
        }
        &self.current
    }

    /// How many times the snapshot was rebuilt.
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }
}
