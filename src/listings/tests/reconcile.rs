use std::sync::Arc;

use super::common::*;
use crate::listings::coordinator::{Confirmation, MutationCoordinator, ReconcileMode};
use crate::listings::domain::{
    ActorId, Application, ApplicationId, ApplicationStatus, PropertyDraft, PropertyId,
    PropertyType,
};
use crate::listings::gateway::InMemoryGateway;
use crate::listings::reconcile::load_applications;
use crate::listings::session::{Role, RoleSession};
use crate::listings::store::EntityStore;
use crate::listings::views::ViewDeriver;

/// What a session can observe through the view layer, keyed by ids only.
#[derive(Debug, PartialEq, Eq)]
struct Observed {
    open: Vec<String>,
    pending: Vec<String>,
    approved: Vec<String>,
    rejected: Vec<String>,
    wishlisted: Vec<String>,
}

fn observe(store: &EntityStore, role: Role, actor: &str) -> Observed {
    let views = ViewDeriver::new(store);
    let actor = ActorId::new(actor);
    let buckets = views.status_buckets(role, &actor);
    fn names(applications: &[&Application]) -> Vec<String> {
        applications
            .iter()
            .map(|application| application.id.to_string())
            .collect()
    }
    Observed {
        open: views
            .open_properties(&actor, None)
            .into_iter()
            .map(|property| property.id.to_string())
            .collect(),
        pending: names(&buckets.pending),
        approved: names(&buckets.approved),
        rejected: names(&buckets.rejected),
        wishlisted: store
            .properties()
            .iter()
            .filter(|property| views.is_wishlisted(&actor, &property.id))
            .map(|property| property.id.to_string())
            .collect(),
    }
}

async fn reloaded(gateway: &Arc<InMemoryGateway>, session: RoleSession) -> EntityStore {
    let fresh = MutationCoordinator::new(gateway.clone(), session, ReconcileMode::Refetch);
    fresh.refresh_all().await.expect("fresh load");
    fresh.store().snapshot()
}

struct ScriptResult {
    buyer: Observed,
    agent: Observed,
}

/// Drive one agent and one buyer through the same mutations, checking after each phase
/// that the session store matches what a fresh load of the server would give.
async fn run_script(mode: ReconcileMode) -> ScriptResult {
    let gateway = seeded_gateway();
    gateway.seed_application(application("a1", "p1", BUYER, ApplicationStatus::Pending));
    gateway.seed_application(application("a2", "p2", OTHER_BUYER, ApplicationStatus::Pending));

    let agent = agent(&gateway, mode);
    let buyer = buyer(&gateway, mode);
    agent.refresh_all().await.expect("agent load");

    let created = agent
        .create_property(draft("Lakeside duplex", 1900.0, PropertyType::House))
        .await
        .expect("create");
    let p1 = PropertyId::new("p1");
    let mut changes = PropertyDraft::from(&property("p1", AGENT, PropertyType::Apartment));
    changes.price = 1425.0;
    agent.update_property(&p1, changes).await.expect("update");
    agent
        .delete_property(&PropertyId::new("p2"), Confirmation::Confirmed)
        .await
        .expect("delete");
    assert!(
        agent
            .store()
            .snapshot()
            .same_contents(&reloaded(&gateway, agent_session(AGENT)).await),
        "agent listings diverged in {mode} mode"
    );

    buyer.refresh_all().await.expect("buyer load");
    let submitted = buyer.apply(&created.id).await.expect("apply");
    buyer.add_to_wishlist(&p1).await.expect("wishlist p1");
    buyer.add_to_wishlist(&created.id).await.expect("wishlist new");
    buyer.remove_from_wishlist(&p1).await.expect("unwishlist p1");
    buyer.cancel_application_for(&p1).await.expect("cancel");
    let buyer_store = buyer.store().snapshot();
    assert!(
        buyer_store.same_contents(&reloaded(&gateway, buyer_session(BUYER)).await),
        "buyer store diverged in {mode} mode"
    );

    agent.refresh_all().await.expect("agent reload");
    agent.approve(&submitted.id).await.expect("approve");
    let agent_store = agent.store().snapshot();
    assert!(
        agent_store.same_contents(&reloaded(&gateway, agent_session(AGENT)).await),
        "agent applications diverged in {mode} mode"
    );

    ScriptResult {
        buyer: observe(&buyer_store, Role::Buyer, BUYER),
        agent: observe(&agent_store, Role::Agent, AGENT),
    }
}

#[tokio::test]
async fn patch_and_refetch_converge_on_the_same_views() {
    let patched = run_script(ReconcileMode::Patch).await;
    let refetched = run_script(ReconcileMode::Refetch).await;

    assert_eq!(patched.buyer, refetched.buyer);
    assert_eq!(patched.agent, refetched.agent);

    assert_eq!(patched.buyer.open, vec!["p1", "p3", "prop-000001"]);
    assert_eq!(patched.buyer.pending, vec!["app-000002"]);
    assert_eq!(patched.buyer.wishlisted, vec!["prop-000001"]);
    assert_eq!(patched.agent.approved, vec!["app-000002"]);
    assert!(patched.agent.pending.is_empty());
}

#[tokio::test]
async fn stale_refetch_keeps_the_local_decision() {
    let gateway = seeded_gateway();
    gateway.seed_application(application("a1", "p1", BUYER, ApplicationStatus::Pending));
    let agent = agent(&gateway, ReconcileMode::Refetch);
    agent.refresh_all().await.expect("initial load");

    agent
        .reject(&ApplicationId::new("a1"))
        .await
        .expect("reject");

    // A lagging replica still reports the application as pending.
    let stale = vec![application("a1", "p1", BUYER, ApplicationStatus::Pending)];
    load_applications(&mut agent.store().write(), stale);

    let observed = observe(&agent.store().snapshot(), Role::Agent, AGENT);
    assert_eq!(observed.rejected, vec!["a1"]);
    assert!(observed.pending.is_empty());
}
