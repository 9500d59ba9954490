use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    datatype::{
        geo::{BoundingBox, GeoPoint},
        security::PasswordHash,
    },
    entity::{
        auth::TokenBlacklist,
        iam::User,
        place::{Place, PlaceStatus, PlaceType},
    },
    query::{ListInput, ListOutput},
};
use crate::error::persistence::PersistenceError;

// ### Users

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub uuid: Option<Uuid>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSearchField {
    Username,
    Email,
    FirstName,
    LastName,
}

impl UserSearchField {
    pub const ALL: [UserSearchField; 4] = [
        UserSearchField::Username,
        UserSearchField::Email,
        UserSearchField::FirstName,
        UserSearchField::LastName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserSearchField::Username => "username",
            UserSearchField::Email => "email",
            UserSearchField::FirstName => "first_name",
            UserSearchField::LastName => "last_name",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UserPredicate {
    #[default]
    All,
    Equal(UserFilter),
    Contains {
        field: UserSearchField,
        query: String,
    },
}

/// Lookup keys combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserLookup {
    pub id: Option<i64>,
    pub uuid: Option<Uuid>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UserLookup {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.uuid.is_none() && self.username.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Fields merged into a stored user, `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list(&self, input: &ListInput<UserPredicate>)
        -> Result<ListOutput<User>, PersistenceError>;

    async fn find_one(&self, lookup: &UserLookup) -> Result<Option<User>, PersistenceError>;

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, PersistenceError>;

    async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, PersistenceError>;

    async fn username_exists(
        &self,
        username: &str,
        except: Option<i64>,
    ) -> Result<bool, PersistenceError>;

    async fn email_exists(&self, email: &str, except: Option<i64>)
        -> Result<bool, PersistenceError>;

    async fn create_one(&self, user: NewUser) -> Result<User, PersistenceError>;

    /// Inserts every user in one transaction, none of them when any insert fails.
    async fn create_all(&self, users: Vec<NewUser>) -> Result<Vec<User>, PersistenceError>;

    async fn update_one(&self, id: i64, patch: UserPatch) -> Result<Option<User>, PersistenceError>;

    async fn set_password(&self, id: i64, hash: &PasswordHash) -> Result<bool, PersistenceError>;

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<(), PersistenceError>;

    async fn remove_one(&self, id: i64) -> Result<bool, PersistenceError>;

    async fn remove_many(&self, ids: &[i64]) -> Result<Vec<i64>, PersistenceError>;
}

// ### Places

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceFilter {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub place_type: Option<PlaceType>,
    pub status: Option<PlaceStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceSearchField {
    Name,
    Description,
    Address,
    City,
    State,
    Country,
    PostalCode,
}

impl PlaceSearchField {
    pub const ALL: [PlaceSearchField; 7] = [
        PlaceSearchField::Name,
        PlaceSearchField::Description,
        PlaceSearchField::Address,
        PlaceSearchField::City,
        PlaceSearchField::State,
        PlaceSearchField::Country,
        PlaceSearchField::PostalCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceSearchField::Name => "name",
            PlaceSearchField::Description => "description",
            PlaceSearchField::Address => "address",
            PlaceSearchField::City => "city",
            PlaceSearchField::State => "state",
            PlaceSearchField::Country => "country",
            PlaceSearchField::PostalCode => "postal_code",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PlacePredicate {
    #[default]
    All,
    Equal(PlaceFilter),
    Contains {
        field: PlaceSearchField,
        query: String,
    },
    /// Great-circle distance to `origin` at most `radius` meters.
    Near {
        origin: GeoPoint,
        radius: f64,
    },
    WithinBox(BoundingBox),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceLookup {
    pub id: Option<i64>,
    pub uuid: Option<Uuid>,
    pub slug: Option<String>,
    pub name: Option<String>,
}

impl PlaceLookup {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.uuid.is_none() && self.slug.is_none() && self.name.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlace {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub location: GeoPoint,
    pub place_type: PlaceType,
    pub status: PlaceStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacePatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub location: Option<GeoPoint>,
    pub place_type: Option<PlaceType>,
    pub status: Option<PlaceStatus>,
}

/// A place annotated with its distance in meters when the query computed one.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceMatch {
    pub place: Place,
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceCluster {
    pub center: GeoPoint,
    pub count: i64,
}

#[async_trait]
pub trait PlaceRepository: Send + Sync {
    async fn list(
        &self,
        input: &ListInput<PlacePredicate>,
    ) -> Result<ListOutput<PlaceMatch>, PersistenceError>;

    async fn find_one(&self, lookup: &PlaceLookup) -> Result<Option<Place>, PersistenceError>;

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Place>, PersistenceError>;

    async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, PersistenceError>;

    async fn slug_exists(&self, slug: &str, except: Option<i64>) -> Result<bool, PersistenceError>;

    /// The `k` places closest to `origin`, nearest first.
    async fn k_nearest(&self, origin: GeoPoint, k: i64)
        -> Result<Vec<PlaceMatch>, PersistenceError>;

    /// Places grouped by snapping their location to a grid of `grid_size` degrees.
    async fn cluster(&self, grid_size: f64) -> Result<Vec<PlaceCluster>, PersistenceError>;

    async fn create_one(&self, place: NewPlace) -> Result<Place, PersistenceError>;

    async fn update_one(
        &self,
        id: i64,
        patch: PlacePatch,
    ) -> Result<Option<Place>, PersistenceError>;

    async fn remove_one(&self, id: i64) -> Result<bool, PersistenceError>;

    async fn remove_many(&self, ids: &[i64]) -> Result<Vec<i64>, PersistenceError>;
}

// ### Token blacklist

#[async_trait]
pub trait TokenBlacklistRepository: Send + Sync {
    async fn insert(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<TokenBlacklist, PersistenceError>;

    /// Whether `token` has a blacklist entry still active at `now`.
    async fn is_blacklisted(&self, token: &str, now: DateTime<Utc>)
        -> Result<bool, PersistenceError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, PersistenceError>;
}
