//! Session-scoped holder for the three entity collections.
//!
//! The store never validates business rules. It only keeps insertion order, replaces by id,
//! and bumps a per-collection revision on every write so derived views can tell which
//! collections went dirty since they last looked.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use super::domain::{
    Application, ApplicationId, Property, PropertyId, WishlistEntry, WishlistEntryId,
};

/// Names one of the store's collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Properties,
    Applications,
    Wishlist,
}

impl CollectionKind {
    pub const fn label(self) -> &'static str {
        match self {
            CollectionKind::Properties => "properties",
            CollectionKind::Applications => "applications",
            CollectionKind::Wishlist => "wishlist",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Binds an entity type to its id and its slot in the [`EntityStore`].
pub trait Entity: Clone {
    type Id: PartialEq + fmt::Debug + Clone;

    const KIND: CollectionKind;

    fn id(&self) -> &Self::Id;
    fn collection(store: &EntityStore) -> &Collection<Self>;
    fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self>;
}

impl Entity for Property {
    type Id = PropertyId;
    const KIND: CollectionKind = CollectionKind::Properties;

    fn id(&self) -> &PropertyId {
        &self.id
    }

    fn collection(store: &EntityStore) -> &Collection<Self> {
        &store.properties
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self> {
        &mut store.properties
    }
}

impl Entity for Application {
    type Id = ApplicationId;
    const KIND: CollectionKind = CollectionKind::Applications;

    fn id(&self) -> &ApplicationId {
        &self.id
    }

    fn collection(store: &EntityStore) -> &Collection<Self> {
        &store.applications
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self> {
        &mut store.applications
    }
}

impl Entity for WishlistEntry {
    type Id = WishlistEntryId;
    const KIND: CollectionKind = CollectionKind::Wishlist;

    fn id(&self) -> &WishlistEntryId {
        &self.id
    }

    fn collection(store: &EntityStore) -> &Collection<Self> {
        &store.wishlist
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self> {
        &mut store.wishlist
    }
}

/// Insertion-ordered items plus change tracking.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
    revision: u64,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            revision: 0,
        }
    }
}

impl<T: Entity> Collection<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Revision counters of all three collections at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revisions {
    pub properties: u64,
    pub applications: u64,
    pub wishlist: u64,
}

/// Collections written since some earlier [`Revisions`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtySet {
    pub properties: bool,
    pub applications: bool,
    pub wishlist: bool,
}

impl DirtySet {
    pub fn any(&self) -> bool {
        self.properties || self.applications || self.wishlist
    }

    pub fn contains(&self, kind: CollectionKind) -> bool {
        match kind {
            CollectionKind::Properties => self.properties,
            CollectionKind::Applications => self.applications,
            CollectionKind::Wishlist => self.wishlist,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    properties: Collection<Property>,
    applications: Collection<Application>,
    wishlist: Collection<WishlistEntry>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a collection wholesale, typically after a full refetch.
    pub fn load<T: Entity>(&mut self, items: Vec<T>) {
        let collection = T::collection_mut(self);
        collection.items = items;
        collection.touch();
    }

    /// Replace the item with the same id in place, or append it.
    pub fn upsert<T: Entity>(&mut self, item: T) {
        let collection = T::collection_mut(self);
        match collection
            .items
            .iter()
            .position(|existing| existing.id() == item.id())
        {
            Some(index) => collection.items[index] = item,
            None => collection.items.push(item),
        }
        collection.touch();
    }

    /// Delete by id, returning the removed item if it was present.
    pub fn remove<T: Entity>(&mut self, id: &T::Id) -> Option<T> {
        let collection = T::collection_mut(self);
        let position = collection.items.iter().position(|item| item.id() == id);
        let removed = position.map(|index| collection.items.remove(index));
        collection.touch();
        removed
    }

    /// Drop every item matching `predicate`, returning how many were removed.
    pub fn remove_where<T: Entity>(&mut self, predicate: impl Fn(&T) -> bool) -> usize {
        let collection = T::collection_mut(self);
        let before = collection.items.len();
        collection.items.retain(|item| !predicate(item));
        collection.touch();
        before - collection.items.len()
    }

    pub fn get<T: Entity>(&self, id: &T::Id) -> Option<&T> {
        T::collection(self).get(id)
    }

    pub fn collection<T: Entity>(&self) -> &Collection<T> {
        T::collection(self)
    }

    pub fn properties(&self) -> &[Property] {
        self.properties.items()
    }

    pub fn applications(&self) -> &[Application] {
        self.applications.items()
    }

    pub fn wishlist(&self) -> &[WishlistEntry] {
        self.wishlist.items()
    }

    pub fn revision(&self, kind: CollectionKind) -> u64 {
        match kind {
            CollectionKind::Properties => self.properties.revision,
            CollectionKind::Applications => self.applications.revision,
            CollectionKind::Wishlist => self.wishlist.revision,
        }
    }

    pub fn revisions(&self) -> Revisions {
        Revisions {
            properties: self.properties.revision,
            applications: self.applications.revision,
            wishlist: self.wishlist.revision,
        }
    }

    pub fn changed_since(&self, seen: &Revisions) -> DirtySet {
        let now = self.revisions();
        DirtySet {
            properties: now.properties != seen.properties,
            applications: now.applications != seen.applications,
            wishlist: now.wishlist != seen.wishlist,
        }
    }

    /// Entity-set equality, ignoring revisions.
    pub fn same_contents(&self, other: &EntityStore) -> bool {
        self.properties.items == other.properties.items
            && self.applications.items == other.applications.items
            && self.wishlist.items == other.wishlist.items
    }
}

/// Cloneable handle to a session's store.
///
/// Writers apply a whole reconciliation under one guard; guards must not be held across
/// an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<RwLock<EntityStore>>,
}

impl SharedStore {
    pub fn new(store: EntityStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, EntityStore> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, EntityStore> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> EntityStore {
        self.read().clone()
    }
}
