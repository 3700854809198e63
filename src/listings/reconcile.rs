//! Store-side half of reconciliation: how server-confirmed data is folded into the store.
//!
//! Both the patch path and the refetch path go through these helpers so the two converge
//! on the same state for the same server truth.

use tracing::debug;

use super::domain::{
    ActorId, Application, ApplicationStatus, Property, PropertyId, WishlistEntry,
};
use super::store::EntityStore;

/// Result of folding one application into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    /// The incoming record was a stale `pending` for a locally decided application.
    KeptLocal,
    /// Incoming and local records carry different terminal statuses.
    Conflict {
        local: ApplicationStatus,
        incoming: ApplicationStatus,
    },
}

/// Decided applications never move again, so a terminal status cannot be overwritten.
pub fn terminal_conflict(store: &EntityStore, incoming: &Application) -> MergeOutcome {
    match store.get::<Application>(&incoming.id) {
        Some(local) if local.status.is_terminal() && !incoming.status.is_terminal() => {
            MergeOutcome::KeptLocal
        }
        Some(local) if local.status.is_terminal() && local.status != incoming.status => {
            MergeOutcome::Conflict {
                local: local.status,
                incoming: incoming.status,
            }
        }
        _ => MergeOutcome::Applied,
    }
}

/// Upsert an application unless it would regress a decided record.
pub fn merge_application(store: &mut EntityStore, incoming: Application) -> MergeOutcome {
    let outcome = terminal_conflict(store, &incoming);
    match outcome {
        MergeOutcome::Applied => store.upsert(incoming),
        MergeOutcome::KeptLocal | MergeOutcome::Conflict { .. } => {
            debug!(application_id = %incoming.id, ?outcome, "kept local application status");
        }
    }
    outcome
}

/// Replace the applications collection with a refetched list, keeping decided local
/// statuses over stale pending copies.
pub fn load_applications(store: &mut EntityStore, incoming: Vec<Application>) {
    let merged: Vec<Application> = incoming
        .into_iter()
        .map(|application| match store.get::<Application>(&application.id) {
            Some(local) if local.status.is_terminal() && !application.status.is_terminal() => {
                local.clone()
            }
            _ => application,
        })
        .collect();
    store.load::<Application>(merged);
}

/// Remove a listing together with every application that references it.
pub fn remove_property(store: &mut EntityStore, property_id: &PropertyId) -> usize {
    store.remove::<Property>(property_id);
    store.remove_where::<Application>(|application| &application.property_id == property_id)
}

/// Insert a confirmed wishlist entry, dropping any other entry for the same pair.
pub fn insert_wishlist_entry(store: &mut EntityStore, entry: WishlistEntry) {
    let owner = entry.owner.clone();
    let property_id = entry.property_id.clone();
    let id = entry.id.clone();
    store.remove_where::<WishlistEntry>(|existing| {
        existing.matches(&owner, &property_id) && existing.id != id
    });
    store.upsert(entry);
}

/// Remove the entry for an (owner, property) pair, if any.
pub fn remove_wishlist_entry(
    store: &mut EntityStore,
    owner: &ActorId,
    property_id: &PropertyId,
) -> usize {
    store.remove_where::<WishlistEntry>(|entry| entry.matches(owner, property_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listings::domain::{ApplicationId, WishlistEntryId};
    use chrono::{TimeZone, Utc};

    fn application(id: &str, status: ApplicationStatus) -> Application {
        Application {
            id: ApplicationId::new(id),
            property_id: PropertyId::new("p1"),
            applicant: ActorId::new("buyer-1"),
            status,
            date_submitted: Utc.with_ymd_and_hms(2025, 4, 2, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn stale_pending_never_overwrites_a_decision() {
        let mut store = EntityStore::new();
        store.upsert(application("a1", ApplicationStatus::Approved));

        let outcome = merge_application(&mut store, application("a1", ApplicationStatus::Pending));

        assert_eq!(outcome, MergeOutcome::KeptLocal);
        assert_eq!(
            store.get::<Application>(&ApplicationId::new("a1")).map(|a| a.status),
            Some(ApplicationStatus::Approved)
        );
    }

    #[test]
    fn opposite_terminal_status_is_a_conflict() {
        let mut store = EntityStore::new();
        store.upsert(application("a1", ApplicationStatus::Approved));

        let outcome =
            merge_application(&mut store, application("a1", ApplicationStatus::Rejected));

        assert_eq!(
            outcome,
            MergeOutcome::Conflict {
                local: ApplicationStatus::Approved,
                incoming: ApplicationStatus::Rejected,
            }
        );
        assert_eq!(
            store.get::<Application>(&ApplicationId::new("a1")).map(|a| a.status),
            Some(ApplicationStatus::Approved)
        );
    }

    #[test]
    fn refetched_list_keeps_local_decisions_over_stale_pending() {
        let mut store = EntityStore::new();
        store.upsert(application("a1", ApplicationStatus::Rejected));
        store.upsert(application("a2", ApplicationStatus::Pending));

        load_applications(
            &mut store,
            vec![
                application("a1", ApplicationStatus::Pending),
                application("a3", ApplicationStatus::Pending),
            ],
        );

        let statuses: Vec<_> = store
            .applications()
            .iter()
            .map(|a| (a.id.as_str(), a.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("a1", ApplicationStatus::Rejected),
                ("a3", ApplicationStatus::Pending)
            ]
        );
    }

    #[test]
    fn wishlist_insert_keeps_one_entry_per_pair() {
        let mut store = EntityStore::new();
        let owner = ActorId::new("buyer-1");
        store.upsert(WishlistEntry {
            id: WishlistEntryId::new("w1"),
            property_id: PropertyId::new("p5"),
            owner: owner.clone(),
        });

        insert_wishlist_entry(
            &mut store,
            WishlistEntry {
                id: WishlistEntryId::new("w2"),
                property_id: PropertyId::new("p5"),
                owner: owner.clone(),
            },
        );

        assert_eq!(store.wishlist().len(), 1);
        assert_eq!(store.wishlist()[0].id, WishlistEntryId::new("w2"));
        assert_eq!(
            remove_wishlist_entry(&mut store, &owner, &PropertyId::new("p5")),
            1
        );
        assert!(store.wishlist().is_empty());
    }
}
