use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Server-assigned listing identifier.
    PropertyId
);
string_id!(
    /// Server-assigned application identifier.
    ApplicationId
);
string_id!(
    /// Server-assigned wishlist entry identifier.
    WishlistEntryId
);
string_id!(
    /// Identity of the acting user (agent or buyer) as known to the server.
    ActorId
);

/// Kind of unit being listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Apartment,
    House,
    Room,
}

impl PropertyType {
    pub const fn label(self) -> &'static str {
        match self {
            PropertyType::Apartment => "apartment",
            PropertyType::House => "house",
            PropertyType::Room => "room",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "apartment" => Some(Self::Apartment),
            "house" => Some(Self::House),
            "room" => Some(Self::Room),
            _ => None,
        }
    }
}

/// A listed unit owned by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: String,
    pub property_type: PropertyType,
    #[serde(rename = "listed_by")]
    pub agent: ActorId,
}

impl Property {
    pub fn is_owned_by(&self, agent: &ActorId) -> bool {
        &self.agent == agent
    }
}

/// Agent-supplied listing fields for create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDraft {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: String,
    pub property_type: PropertyType,
}

impl PropertyDraft {
    /// Prices must be finite and strictly positive.
    pub fn has_valid_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

impl From<&Property> for PropertyDraft {
    fn from(property: &Property) -> Self {
        Self {
            title: property.title.clone(),
            description: property.description.clone(),
            price: property.price,
            location: property.location.clone(),
            property_type: property.property_type,
        }
    }
}

/// Lifecycle of an application. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }

    /// Only `pending -> approved` and `pending -> rejected` are legal.
    pub const fn can_transition_to(self, next: ApplicationStatus) -> bool {
        matches!(
            (self, next),
            (ApplicationStatus::Pending, ApplicationStatus::Approved)
                | (ApplicationStatus::Pending, ApplicationStatus::Rejected)
        )
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The agent's verdict on a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub const fn status(self) -> ApplicationStatus {
        match self {
            Decision::Approve => ApplicationStatus::Approved,
            Decision::Reject => ApplicationStatus::Rejected,
        }
    }

    /// Path segment used by the REST API.
    pub const fn path_segment(self) -> &'static str {
        match self {
            Decision::Approve => "accept",
            Decision::Reject => "reject",
        }
    }
}

/// A buyer's request against a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub property_id: PropertyId,
    #[serde(alias = "user_id")]
    pub applicant: ActorId,
    pub status: ApplicationStatus,
    pub date_submitted: DateTime<Utc>,
}

impl Application {
    pub fn is_decided(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A buyer's bookmark of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub id: WishlistEntryId,
    pub property_id: PropertyId,
    #[serde(alias = "user_id")]
    pub owner: ActorId,
}

impl WishlistEntry {
    pub fn matches(&self, owner: &ActorId, property_id: &PropertyId) -> bool {
        &self.owner == owner && &self.property_id == property_id
    }
}
