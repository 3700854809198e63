use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::listings::coordinator::{MutationCoordinator, ReconcileMode};
use crate::listings::domain::{
    ActorId, Application, ApplicationId, ApplicationStatus, Property, PropertyDraft, PropertyId,
    PropertyType, WishlistEntry, WishlistEntryId,
};
use crate::listings::gateway::InMemoryGateway;
use crate::listings::session::{Role, RoleSession};
use crate::listings::store::EntityStore;

pub(super) const AGENT: &str = "agent-1";
pub(super) const OTHER_AGENT: &str = "agent-2";
pub(super) const BUYER: &str = "buyer-1";
pub(super) const OTHER_BUYER: &str = "buyer-2";

pub(super) fn token(actor: &str) -> String {
    format!("{actor}-token")
}

fn submitted_at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub(super) fn property(id: &str, agent: &str, property_type: PropertyType) -> Property {
    Property {
        id: PropertyId::new(id),
        title: format!("Listing {id}"),
        description: "Bright unit close to transit".to_string(),
        price: 1350.0,
        location: "Des Moines, IA".to_string(),
        property_type,
        agent: ActorId::new(agent),
    }
}

pub(super) fn application(
    id: &str,
    property_id: &str,
    applicant: &str,
    status: ApplicationStatus,
) -> Application {
    application_at(id, property_id, applicant, status, 0)
}

pub(super) fn application_at(
    id: &str,
    property_id: &str,
    applicant: &str,
    status: ApplicationStatus,
    minutes: i64,
) -> Application {
    Application {
        id: ApplicationId::new(id),
        property_id: PropertyId::new(property_id),
        applicant: ActorId::new(applicant),
        status,
        date_submitted: submitted_at(minutes),
    }
}

pub(super) fn wishlist_entry(id: &str, property_id: &str, owner: &str) -> WishlistEntry {
    WishlistEntry {
        id: WishlistEntryId::new(id),
        property_id: PropertyId::new(property_id),
        owner: ActorId::new(owner),
    }
}

pub(super) fn draft(title: &str, price: f64, property_type: PropertyType) -> PropertyDraft {
    PropertyDraft {
        title: title.to_string(),
        description: "Freshly painted".to_string(),
        price,
        location: "Ames, IA".to_string(),
        property_type,
    }
}

pub(super) fn store_with(
    properties: Vec<Property>,
    applications: Vec<Application>,
    wishlist: Vec<WishlistEntry>,
) -> EntityStore {
    let mut store = EntityStore::new();
    store.load(properties);
    store.load(applications);
    store.load(wishlist);
    store
}

/// Backend with two agents and two buyers registered and three listings:
/// `p1` (apartment) and `p2` (house) owned by `agent-1`, `p3` (room) owned by `agent-2`.
pub(super) fn seeded_gateway() -> Arc<InMemoryGateway> {
    let gateway = InMemoryGateway::new();
    gateway.register(token(AGENT), ActorId::new(AGENT), Role::Agent);
    gateway.register(token(OTHER_AGENT), ActorId::new(OTHER_AGENT), Role::Agent);
    gateway.register(token(BUYER), ActorId::new(BUYER), Role::Buyer);
    gateway.register(token(OTHER_BUYER), ActorId::new(OTHER_BUYER), Role::Buyer);
    gateway.seed_property(property("p1", AGENT, PropertyType::Apartment));
    gateway.seed_property(property("p2", AGENT, PropertyType::House));
    gateway.seed_property(property("p3", OTHER_AGENT, PropertyType::Room));
    Arc::new(gateway)
}

pub(super) fn agent_session(actor: &str) -> RoleSession {
    RoleSession::agent(actor, token(actor))
}

pub(super) fn buyer_session(actor: &str) -> RoleSession {
    RoleSession::buyer(actor, token(actor))
}

pub(super) fn agent(
    gateway: &Arc<InMemoryGateway>,
    mode: ReconcileMode,
) -> MutationCoordinator<InMemoryGateway> {
    MutationCoordinator::new(gateway.clone(), agent_session(AGENT), mode)
}

pub(super) fn buyer(
    gateway: &Arc<InMemoryGateway>,
    mode: ReconcileMode,
) -> MutationCoordinator<InMemoryGateway> {
    MutationCoordinator::new(gateway.clone(), buyer_session(BUYER), mode)
}

pub(super) fn count_calls(gateway: &InMemoryGateway, name: &str) -> usize {
    gateway.calls().iter().filter(|call| **call == name).count()
}
