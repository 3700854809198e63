use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::{GatewayError, RemoteGateway};
use crate::listings::domain::{
    ActorId, Application, ApplicationId, ApplicationStatus, Decision, Property, PropertyDraft,
    PropertyId, WishlistEntry, WishlistEntryId,
};
use crate::listings::session::{AuthContext, Role};

/// Server stand-in holding the authoritative collections in memory.
///
/// Identity is resolved from the bearer token, listings are scoped per role the way the
/// backend scopes them, and deleting a listing drops its applications. Used by the demo
/// command and the test suites.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<Mutex<ServerState>>,
}

#[derive(Debug, Default)]
struct ServerState {
    accounts: HashMap<String, (ActorId, Role)>,
    properties: Vec<Property>,
    applications: Vec<Application>,
    wishlist: Vec<WishlistEntry>,
    sequence: u64,
    injected_failures: VecDeque<(Option<&'static str>, GatewayError)>,
    calls: Vec<&'static str>,
}

impl ServerState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{prefix}-{:06}", self.sequence)
    }

    fn begin(
        &mut self,
        call: &'static str,
        auth: &AuthContext,
    ) -> Result<(ActorId, Role), GatewayError> {
        self.calls.push(call);
        let injected = self
            .injected_failures
            .iter()
            .position(|(target, _)| target.map_or(true, |name| name == call));
        if let Some((_, error)) = injected.and_then(|index| self.injected_failures.remove(index)) {
            return Err(error);
        }
        self.accounts
            .get(auth.token.expose())
            .cloned()
            .ok_or_else(|| rejected(401, "invalid or expired token"))
    }

    fn owned_property(&self, id: &PropertyId, agent: &ActorId) -> Result<usize, GatewayError> {
        let index = self
            .properties
            .iter()
            .position(|property| &property.id == id)
            .ok_or_else(|| rejected(404, "property not found"))?;
        if !self.properties[index].is_owned_by(agent) {
            return Err(rejected(403, "property belongs to another agent"));
        }
        Ok(index)
    }

    fn property_owner(&self, id: &PropertyId) -> Option<&ActorId> {
        self.properties
            .iter()
            .find(|property| &property.id == id)
            .map(|property| &property.agent)
    }
}

fn rejected(status: u16, message: &str) -> GatewayError {
    GatewayError::Rejected {
        status,
        message: message.to_string(),
    }
}

fn require(role: Role, expected: Role) -> Result<(), GatewayError> {
    if role == expected {
        Ok(())
    } else {
        Err(rejected(403, "operation not allowed for this role"))
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Map a bearer token to an identity, as a login would.
    pub fn register(&self, token: impl Into<String>, actor: ActorId, role: Role) {
        self.lock().accounts.insert(token.into(), (actor, role));
    }

    /// Insert a listing directly into server state.
    pub fn seed_property(&self, property: Property) {
        self.lock().properties.push(property);
    }

    /// Insert an application directly into server state.
    pub fn seed_application(&self, application: Application) {
        self.lock().applications.push(application);
    }

    /// Make the next gateway call fail with `error`.
    pub fn fail_next(&self, error: GatewayError) {
        self.lock().injected_failures.push_back((None, error));
    }

    /// Make the next call named `call` (e.g. `"list_properties"`) fail with `error`.
    pub fn fail_on(&self, call: &'static str, error: GatewayError) {
        self.lock().injected_failures.push_back((Some(call), error));
    }

    /// Names of the calls received so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn properties(&self) -> Vec<Property> {
        self.lock().properties.clone()
    }

    pub fn applications(&self) -> Vec<Application> {
        self.lock().applications.clone()
    }

    pub fn wishlist(&self) -> Vec<WishlistEntry> {
        self.lock().wishlist.clone()
    }
}

#[async_trait]
impl RemoteGateway for InMemoryGateway {
    async fn list_properties(&self, auth: &AuthContext) -> Result<Vec<Property>, GatewayError> {
        let mut state = self.lock();
        let (actor, role) = state.begin("list_properties", auth)?;
        Ok(match role {
            Role::Agent => state
                .properties
                .iter()
                .filter(|property| property.is_owned_by(&actor))
                .cloned()
                .collect(),
            Role::Buyer => state.properties.clone(),
        })
    }

    async fn create_property(
        &self,
        draft: &PropertyDraft,
        auth: &AuthContext,
    ) -> Result<Property, GatewayError> {
        let mut state = self.lock();
        let (actor, role) = state.begin("create_property", auth)?;
        require(role, Role::Agent)?;

        let property = Property {
            id: PropertyId::new(state.next_id("prop")),
            title: draft.title.clone(),
            description: draft.description.clone(),
            price: draft.price,
            location: draft.location.clone(),
            property_type: draft.property_type,
            agent: actor,
        };
        state.properties.push(property.clone());
        Ok(property)
    }

    async fn update_property(
        &self,
        id: &PropertyId,
        draft: &PropertyDraft,
        auth: &AuthContext,
    ) -> Result<Property, GatewayError> {
        let mut state = self.lock();
        let (actor, role) = state.begin("update_property", auth)?;
        require(role, Role::Agent)?;

        let index = state.owned_property(id, &actor)?;
        let property = &mut state.properties[index];
        property.title = draft.title.clone();
        property.description = draft.description.clone();
        property.price = draft.price;
        property.location = draft.location.clone();
        property.property_type = draft.property_type;
        Ok(property.clone())
    }

    async fn delete_property(
        &self,
        id: &PropertyId,
        auth: &AuthContext,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let (actor, role) = state.begin("delete_property", auth)?;
        require(role, Role::Agent)?;

        let index = state.owned_property(id, &actor)?;
        state.properties.remove(index);
        state
            .applications
            .retain(|application| &application.property_id != id);
        Ok(())
    }

    async fn list_applications(
        &self,
        auth: &AuthContext,
    ) -> Result<Vec<Application>, GatewayError> {
        let mut state = self.lock();
        let (actor, role) = state.begin("list_applications", auth)?;
        Ok(state
            .applications
            .iter()
            .filter(|application| match role {
                Role::Agent => state.property_owner(&application.property_id) == Some(&actor),
                Role::Buyer => application.applicant == actor,
            })
            .cloned()
            .collect())
    }

    async fn submit_application(
        &self,
        property_id: &PropertyId,
        auth: &AuthContext,
    ) -> Result<Application, GatewayError> {
        let mut state = self.lock();
        let (actor, role) = state.begin("submit_application", auth)?;
        require(role, Role::Buyer)?;
        if state.property_owner(property_id).is_none() {
            return Err(rejected(404, "property not found"));
        }

        let application = Application {
            id: ApplicationId::new(state.next_id("app")),
            property_id: property_id.clone(),
            applicant: actor,
            status: ApplicationStatus::Pending,
            date_submitted: Utc::now(),
        };
        state.applications.push(application.clone());
        Ok(application)
    }

    async fn cancel_application(
        &self,
        id: &ApplicationId,
        auth: &AuthContext,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let (actor, _) = state.begin("cancel_application", auth)?;

        let index = state
            .applications
            .iter()
            .position(|application| &application.id == id)
            .ok_or_else(|| rejected(404, "application not found"))?;
        if state.applications[index].applicant != actor {
            return Err(rejected(403, "application belongs to another buyer"));
        }
        state.applications.remove(index);
        Ok(())
    }

    async fn decide_application(
        &self,
        id: &ApplicationId,
        decision: Decision,
        auth: &AuthContext,
    ) -> Result<Application, GatewayError> {
        let mut state = self.lock();
        let (actor, role) = state.begin("decide_application", auth)?;
        require(role, Role::Agent)?;

        let index = state
            .applications
            .iter()
            .position(|application| &application.id == id)
            .ok_or_else(|| rejected(404, "application not found"))?;
        let property_id = state.applications[index].property_id.clone();
        if state.property_owner(&property_id) != Some(&actor) {
            return Err(rejected(403, "application targets another agent's property"));
        }

        let application = &mut state.applications[index];
        application.status = decision.status();
        Ok(application.clone())
    }

    async fn list_wishlist(&self, auth: &AuthContext) -> Result<Vec<WishlistEntry>, GatewayError> {
        let mut state = self.lock();
        let (actor, _) = state.begin("list_wishlist", auth)?;
        Ok(state
            .wishlist
            .iter()
            .filter(|entry| entry.owner == actor)
            .cloned()
            .collect())
    }

    async fn add_to_wishlist(
        &self,
        property_id: &PropertyId,
        auth: &AuthContext,
    ) -> Result<WishlistEntry, GatewayError> {
        let mut state = self.lock();
        let (actor, _) = state.begin("add_to_wishlist", auth)?;
        if state.property_owner(property_id).is_none() {
            return Err(rejected(404, "property not found"));
        }
        if let Some(existing) = state
            .wishlist
            .iter()
            .find(|entry| entry.matches(&actor, property_id))
        {
            return Ok(existing.clone());
        }

        let entry = WishlistEntry {
            id: WishlistEntryId::new(state.next_id("wish")),
            property_id: property_id.clone(),
            owner: actor,
        };
        state.wishlist.push(entry.clone());
        Ok(entry)
    }

    async fn remove_from_wishlist(
        &self,
        property_id: &PropertyId,
        auth: &AuthContext,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let (actor, _) = state.begin("remove_from_wishlist", auth)?;
        let index = state
            .wishlist
            .iter()
            .position(|entry| entry.matches(&actor, property_id))
            .ok_or_else(|| rejected(404, "wishlist item not found"))?;
        state.wishlist.remove(index);
        Ok(())
    }
}
