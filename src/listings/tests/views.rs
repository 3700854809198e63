use super::common::*;
use crate::listings::domain::{ActorId, ApplicationStatus, Property, PropertyId, PropertyType};
use crate::listings::session::Role;
use crate::listings::views::{SessionView, ViewDeriver};

fn ids<'a>(properties: impl IntoIterator<Item = &'a Property>) -> Vec<&'a str> {
    properties.into_iter().map(|property| property.id.as_str()).collect()
}

#[test]
fn open_properties_hide_only_decided_listings() {
    let store = store_with(
        vec![
            property("p1", AGENT, PropertyType::Apartment),
            property("p2", AGENT, PropertyType::House),
            property("p3", OTHER_AGENT, PropertyType::Room),
            property("p4", OTHER_AGENT, PropertyType::Apartment),
        ],
        vec![
            application("a1", "p1", BUYER, ApplicationStatus::Pending),
            application("a2", "p2", BUYER, ApplicationStatus::Approved),
            application("a3", "p3", BUYER, ApplicationStatus::Rejected),
            application("a4", "p4", OTHER_BUYER, ApplicationStatus::Approved),
        ],
        Vec::new(),
    );
    let views = ViewDeriver::new(&store);
    let buyer = ActorId::new(BUYER);

    assert_eq!(ids(views.open_properties(&buyer, None)), vec!["p1", "p4"]);
    assert_eq!(
        ids(views.open_properties(&ActorId::new(OTHER_BUYER), None)),
        vec!["p1", "p2", "p3"]
    );
    assert!(views.is_open_for(&buyer, &PropertyId::new("p1")));
    assert!(!views.is_open_for(&buyer, &PropertyId::new("p3")));
}

#[test]
fn type_filter_narrows_open_properties() {
    let store = store_with(
        vec![
            property("p1", AGENT, PropertyType::Apartment),
            property("p2", AGENT, PropertyType::House),
            property("p3", OTHER_AGENT, PropertyType::Apartment),
        ],
        vec![application("a1", "p3", BUYER, ApplicationStatus::Rejected)],
        Vec::new(),
    );
    let views = ViewDeriver::new(&store);
    let buyer = ActorId::new(BUYER);

    assert_eq!(
        ids(views.open_properties(&buyer, Some(PropertyType::Apartment))),
        vec!["p1"]
    );
    assert!(views
        .open_properties(&buyer, Some(PropertyType::Room))
        .is_empty());
}

#[test]
fn application_buckets_follow_role_scope() {
    let store = store_with(
        vec![
            property("p1", AGENT, PropertyType::Apartment),
            property("p3", OTHER_AGENT, PropertyType::Room),
        ],
        vec![
            application("a1", "p1", BUYER, ApplicationStatus::Pending),
            application("a2", "p1", OTHER_BUYER, ApplicationStatus::Approved),
            application("a3", "p3", BUYER, ApplicationStatus::Rejected),
        ],
        Vec::new(),
    );
    let views = ViewDeriver::new(&store);

    let agent = ActorId::new(AGENT);
    let pending = views.applications_by_status(Role::Agent, &agent, ApplicationStatus::Pending);
    assert_eq!(pending.len(), 1);
    let agent_buckets = views.status_buckets(Role::Agent, &agent);
    assert_eq!(agent_buckets.total(), 2);
    assert!(agent_buckets.get(ApplicationStatus::Rejected).is_empty());

    let buyer = ActorId::new(BUYER);
    let buyer_buckets = views.status_buckets(Role::Buyer, &buyer);
    assert_eq!(buyer_buckets.pending.len(), 1);
    assert!(buyer_buckets.approved.is_empty());
    assert_eq!(buyer_buckets.rejected[0].id.as_str(), "a3");
}

#[test]
fn application_for_prefers_pending_then_latest() {
    let store = store_with(
        vec![property("p1", AGENT, PropertyType::House)],
        vec![
            application_at("a1", "p1", BUYER, ApplicationStatus::Rejected, 60),
            application_at("a2", "p1", BUYER, ApplicationStatus::Pending, 10),
            application_at("a3", "p1", OTHER_BUYER, ApplicationStatus::Pending, 90),
        ],
        Vec::new(),
    );
    let views = ViewDeriver::new(&store);
    let buyer = ActorId::new(BUYER);
    let p1 = PropertyId::new("p1");

    let found = views.application_for(&buyer, &p1).expect("buyer applied");
    assert_eq!(found.id.as_str(), "a2");
    assert!(views
        .application_for(&buyer, &PropertyId::new("p2"))
        .is_none());

    let decided_only = store_with(
        Vec::new(),
        vec![
            application_at("a1", "p1", BUYER, ApplicationStatus::Rejected, 5),
            application_at("a4", "p1", BUYER, ApplicationStatus::Approved, 50),
        ],
        Vec::new(),
    );
    let latest = ViewDeriver::new(&decided_only)
        .application_for(&buyer, &p1)
        .expect("buyer applied");
    assert_eq!(latest.id.as_str(), "a4");
}

#[test]
fn wishlist_views_skip_entries_without_a_loaded_listing() {
    let store = store_with(
        vec![
            property("p1", AGENT, PropertyType::Apartment),
            property("p2", AGENT, PropertyType::House),
        ],
        Vec::new(),
        vec![
            wishlist_entry("w1", "p2", BUYER),
            wishlist_entry("w2", "p9", BUYER),
            wishlist_entry("w3", "p1", OTHER_BUYER),
        ],
    );
    let views = ViewDeriver::new(&store);
    let buyer = ActorId::new(BUYER);

    assert_eq!(ids(views.wishlisted_properties(&buyer)), vec!["p2"]);
    assert!(views.is_wishlisted(&buyer, &PropertyId::new("p9")));
    assert!(!views.is_wishlisted(&buyer, &PropertyId::new("p1")));
}

#[test]
fn session_view_recomputes_only_after_writes() {
    let mut store = store_with(
        vec![
            property("p1", AGENT, PropertyType::Apartment),
            property("p2", AGENT, PropertyType::House),
        ],
        Vec::new(),
        Vec::new(),
    );
    let mut view = SessionView::new(&buyer_session(BUYER));

    assert_eq!(view.read(&store).listings.len(), 2);
    assert_eq!(view.read(&store).listings.len(), 2);
    assert_eq!(view.recomputations(), 1);

    store.upsert(wishlist_entry("w1", "p2", BUYER));
    let snapshot = view.read(&store);
    assert!(snapshot.listings[1].wishlisted);
    assert_eq!(snapshot.wishlist.len(), 1);
    assert_eq!(view.recomputations(), 2);

    view.set_type_filter(None);
    view.read(&store);
    assert_eq!(view.recomputations(), 2);

    view.set_type_filter(Some(PropertyType::House));
    let ids: Vec<_> = view
        .read(&store)
        .listings
        .iter()
        .map(|card| card.property.id.as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["p2"]);
    assert_eq!(view.recomputations(), 3);
}

#[test]
fn agent_snapshot_counts_applications_per_listing() {
    let store = store_with(
        vec![
            property("p1", AGENT, PropertyType::Apartment),
            property("p2", AGENT, PropertyType::House),
            property("p3", OTHER_AGENT, PropertyType::Room),
        ],
        vec![
            application("a1", "p1", BUYER, ApplicationStatus::Pending),
            application("a2", "p1", OTHER_BUYER, ApplicationStatus::Rejected),
            application("a3", "p3", BUYER, ApplicationStatus::Pending),
        ],
        Vec::new(),
    );
    let mut view = SessionView::new(&agent_session(AGENT));
    let snapshot = view.read(&store);

    let counts: Vec<_> = snapshot
        .listings
        .iter()
        .map(|card| (card.property.id.as_str(), card.application_count))
        .collect();
    assert_eq!(counts, vec![("p1", 2), ("p2", 0)]);
    assert_eq!(snapshot.pending.len(), 1);
    assert_eq!(snapshot.rejected.len(), 1);
    assert!(snapshot.wishlist.is_empty());
}
