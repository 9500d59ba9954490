//! In-memory repositories and services backing the use case tests.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    app::use_case::iam::{EMAIL_CONSTRAINT, USERNAME_CONSTRAINT},
    domain::{
        datatype::{
            geo::GeoPoint,
            security::{PasswordHash, PasswordHashError},
        },
        entity::{
            auth::TokenBlacklist,
            iam::{User, UserState},
            place::{Place, PlaceState},
            Entity, EntityData,
        },
        query::{ListInput, ListOutput, SortDir},
        repository::{
            NewPlace, NewUser, PlaceCluster, PlaceLookup, PlaceMatch, PlacePatch, PlacePredicate,
            PlaceRepository, PlaceSearchField, TokenBlacklistRepository, UserLookup, UserPatch,
            UserPredicate, UserRepository, UserSearchField,
        },
        service::{MailMessage, MailService, PasswordHashService},
    },
    error::{persistence::PersistenceError, UnknownError},
    infra::{
        database::{place::PLACE_SORT_FIELDS, user::USER_SORT_FIELDS},
        service::security::Argon2HashService,
    },
};

#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum SortKey {
    Int(i64),
    Float(f64),
    Text(String),
    OptText(Option<String>),
    Time(Option<DateTime<Utc>>),
    Bool(bool),
    Uuid(Uuid),
}

fn contains_ci(value: &str, query: &str) -> bool {
    value.to_lowercase().contains(&query.to_lowercase())
}

fn entity_data(id: i64) -> EntityData {
    let now = Utc::now();
    EntityData::restore(id, Uuid::new_v4(), now, now)
}

/// Orders, counts and slices rows the way the SQL repositories do.
fn paginate<T, F>(
    mut rows: Vec<(SortKey, i64, T)>,
    input: &ListInput<F>,
) -> ListOutput<T> {
    rows.sort_by(|(a, a_id, _), (b, b_id, _)| {
        let ord = a.partial_cmp(b).unwrap_or(Ordering::Equal);
        let ord = match input.sort_dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        };
        ord.then(a_id.cmp(b_id))
    });

    let total = rows.len() as i64;
    let items = if input.is_empty_window() {
        Vec::new()
    } else {
        rows.into_iter()
            .skip(input.offset() as usize)
            .take(input.per_page as usize)
            .map(|(_, _, item)| item)
            .collect()
    };
    ListOutput::new(items, total, input)
}

fn check_sort(sort: &str, allowed: &[&str]) -> Result<(), PersistenceError> {
    if allowed.contains(&sort) {
        Ok(())
    } else {
        Err(PersistenceError::UnknownField(sort.into()))
    }
}

// ### Users

#[derive(Default)]
pub struct MemoryUserRepository {
    users: Mutex<BTreeMap<i64, User>>,
    fail_next_insert: Mutex<Option<String>>,
}

impl MemoryUserRepository {
    /// Makes the next insert fail with a unique violation on `constraint`.
    pub fn fail_next_insert_with(&self, constraint: &str) {
        *self.fail_next_insert.lock().unwrap() = Some(constraint.into());
    }

    fn insert(users: &mut BTreeMap<i64, User>, user: NewUser) -> User {
        let id = users.keys().next_back().map_or(1, |id| id + 1);
        let user = User::restore(
            entity_data(id),
            UserState {
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                first_name: user.first_name,
                last_name: user.last_name,
                is_staff: user.is_staff,
                is_superuser: user.is_superuser,
                is_active: true,
                last_login: None,
            },
        );
        users.insert(id, user.clone());
        user
    }

    fn sort_key(user: &User, field: &str) -> SortKey {
        match field {
            "uuid" => SortKey::Uuid(user.uuid()),
            "username" => SortKey::Text(user.username().clone()),
            "email" => SortKey::Text(user.email().clone()),
            "first_name" => SortKey::Text(user.first_name().clone()),
            "last_name" => SortKey::Text(user.last_name().clone()),
            "is_active" => SortKey::Bool(user.is_active()),
            "is_staff" => SortKey::Bool(user.is_staff()),
            "last_login" => SortKey::Time(user.last_login()),
            "date_joined" | "created_at" => SortKey::Time(Some(user.created())),
            "updated_at" => SortKey::Time(Some(user.updated())),
            _ => SortKey::Int(user.id()),
        }
    }

    fn matches(user: &User, predicate: &UserPredicate) -> bool {
        match predicate {
            UserPredicate::All => true,
            UserPredicate::Equal(filter) => {
                filter.uuid.map_or(true, |v| user.uuid() == v)
                    && filter.username.as_ref().map_or(true, |v| user.username() == v)
                    && filter.email.as_ref().map_or(true, |v| user.email() == v)
                    && filter.first_name.as_ref().map_or(true, |v| user.first_name() == v)
                    && filter.last_name.as_ref().map_or(true, |v| user.last_name() == v)
                    && filter.is_active.map_or(true, |v| user.is_active() == v)
                    && filter.is_staff.map_or(true, |v| user.is_staff() == v)
            }
            UserPredicate::Contains { field, query } => {
                let value = match field {
                    UserSearchField::Username => user.username(),
                    UserSearchField::Email => user.email(),
                    UserSearchField::FirstName => user.first_name(),
                    UserSearchField::LastName => user.last_name(),
                };
                contains_ci(value, query)
            }
        }
    }

    fn taken(&self, except: Option<i64>, same: impl Fn(&User) -> bool) -> bool {
        self.users
            .lock()
            .unwrap()
            .values()
            .any(|user| Some(user.id()) != except && same(user))
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn list(
        &self,
        input: &ListInput<UserPredicate>,
    ) -> Result<ListOutput<User>, PersistenceError> {
        check_sort(&input.sort, &USER_SORT_FIELDS)?;
        let rows = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|user| Self::matches(user, &input.filter))
            .map(|user| (Self::sort_key(user, &input.sort), user.id(), user.clone()))
            .collect();
        Ok(paginate(rows, input))
    }

    async fn find_one(&self, lookup: &UserLookup) -> Result<Option<User>, PersistenceError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|user| {
                lookup.id.map_or(true, |v| user.id() == v)
                    && lookup.uuid.map_or(true, |v| user.uuid() == v)
                    && lookup.username.as_ref().map_or(true, |v| user.username() == v)
                    && lookup.email.as_ref().map_or(true, |v| user.email() == v)
            })
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, PersistenceError> {
        let users = self.users.lock().unwrap();
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, PersistenceError> {
        let users = self.users.lock().unwrap();
        Ok(ids.iter().copied().filter(|id| users.contains_key(id)).collect())
    }

    async fn username_exists(
        &self,
        username: &str,
        except: Option<i64>,
    ) -> Result<bool, PersistenceError> {
        Ok(self.taken(except, |user| user.username() == username))
    }

    async fn email_exists(
        &self,
        email: &str,
        except: Option<i64>,
    ) -> Result<bool, PersistenceError> {
        Ok(self.taken(except, |user| user.email() == email))
    }

    async fn create_one(&self, user: NewUser) -> Result<User, PersistenceError> {
        if let Some(constraint) = self.fail_next_insert.lock().unwrap().take() {
            return Err(PersistenceError::UniqueViolation(Some(constraint)));
        }

        let mut users = self.users.lock().unwrap();
        Ok(Self::insert(&mut users, user))
    }

    async fn create_all(&self, batch: Vec<NewUser>) -> Result<Vec<User>, PersistenceError> {
        if let Some(constraint) = self.fail_next_insert.lock().unwrap().take() {
            return Err(PersistenceError::UniqueViolation(Some(constraint)));
        }

        let mut users = self.users.lock().unwrap();
        let mut staged = users.clone();
        let mut created = Vec::with_capacity(batch.len());
        for user in batch {
            let constraint = staged.values().find_map(|stored| {
                if stored.username() == &user.username {
                    Some(USERNAME_CONSTRAINT)
                } else if stored.email() == &user.email {
                    Some(EMAIL_CONSTRAINT)
                } else {
                    None
                }
            });
            if let Some(constraint) = constraint {
                return Err(PersistenceError::UniqueViolation(Some(constraint.into())));
            }
            created.push(Self::insert(&mut staged, user));
        }
        *users = staged;
        Ok(created)
    }

    async fn update_one(&self, id: i64, patch: UserPatch) -> Result<Option<User>, PersistenceError> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        let state = &mut user.state;
        if let Some(username) = patch.username {
            state.username = username;
        }
        if let Some(email) = patch.email {
            state.email = email;
        }
        if let Some(first_name) = patch.first_name {
            state.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            state.last_name = last_name;
        }
        if let Some(is_active) = patch.is_active {
            state.is_active = is_active;
        }
        if let Some(is_staff) = patch.is_staff {
            state.is_staff = is_staff;
        }
        user.data.updated = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_password(&self, id: i64, hash: &PasswordHash) -> Result<bool, PersistenceError> {
        let mut users = self.users.lock().unwrap();
        Ok(users
            .get_mut(&id)
            .map(|user| user.state.password_hash = hash.clone())
            .is_some())
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<(), PersistenceError> {
        if let Some(user) = self.users.lock().unwrap().get_mut(&id) {
            user.state.last_login = Some(at);
        }
        Ok(())
    }

    async fn remove_one(&self, id: i64) -> Result<bool, PersistenceError> {
        Ok(self.users.lock().unwrap().remove(&id).is_some())
    }

    async fn remove_many(&self, ids: &[i64]) -> Result<Vec<i64>, PersistenceError> {
        let mut users = self.users.lock().unwrap();
        Ok(ids
            .iter()
            .copied()
            .filter(|id| users.remove(id).is_some())
            .collect())
    }
}

// ### Places

#[derive(Default)]
pub struct MemoryPlaceRepository {
    places: Mutex<BTreeMap<i64, Place>>,
}

impl MemoryPlaceRepository {
    fn sort_key(place: &Place, field: &str, distance: Option<f64>) -> SortKey {
        match field {
            "uuid" => SortKey::Uuid(place.uuid()),
            "name" => SortKey::Text(place.name().clone()),
            "slug" => SortKey::Text(place.slug().clone()),
            "city" => SortKey::OptText(place.city().clone()),
            "state" => SortKey::OptText(place.region().clone()),
            "country" => SortKey::OptText(place.country().clone()),
            "postal_code" => SortKey::OptText(place.postal_code().clone()),
            "type" => SortKey::Int(i16::from(place.place_type()).into()),
            "status" => SortKey::Int(i16::from(place.status()).into()),
            "created_at" => SortKey::Time(Some(place.created())),
            "updated_at" => SortKey::Time(Some(place.updated())),
            "distance" => SortKey::Float(distance.unwrap_or_default()),
            _ => SortKey::Int(place.id()),
        }
    }

    /// Whether the place satisfies the predicate, with its distance when one applies.
    fn matches(place: &Place, predicate: &PlacePredicate) -> Option<Option<f64>> {
        let keep = match predicate {
            PlacePredicate::All => true,
            PlacePredicate::Equal(filter) => {
                filter.name.as_ref().map_or(true, |v| place.name() == v)
                    && filter.slug.as_ref().map_or(true, |v| place.slug() == v)
                    && filter.city.as_ref().map_or(true, |v| place.city().as_ref() == Some(v))
                    && filter.state.as_ref().map_or(true, |v| place.region().as_ref() == Some(v))
                    && filter.country.as_ref().map_or(true, |v| place.country().as_ref() == Some(v))
                    && filter
                        .postal_code
                        .as_ref()
                        .map_or(true, |v| place.postal_code().as_ref() == Some(v))
                    && filter.place_type.map_or(true, |v| place.place_type() == v)
                    && filter.status.map_or(true, |v| place.status() == v)
            }
            PlacePredicate::Contains { field, query } => {
                let value = match field {
                    PlaceSearchField::Name => Some(place.name()),
                    PlaceSearchField::Description => place.description().as_ref(),
                    PlaceSearchField::Address => place.address().as_ref(),
                    PlaceSearchField::City => place.city().as_ref(),
                    PlaceSearchField::State => place.region().as_ref(),
                    PlaceSearchField::Country => place.country().as_ref(),
                    PlaceSearchField::PostalCode => place.postal_code().as_ref(),
                };
                value.map_or(false, |value| contains_ci(value, query))
            }
            PlacePredicate::Near { origin, radius } => {
                let distance = origin.distance_to(&place.location());
                return (distance <= *radius).then_some(Some(distance));
            }
            PlacePredicate::WithinBox(bbox) => bbox.contains(&place.location()),
        };
        keep.then_some(None)
    }

    fn apply(place: &mut Place, patch: PlacePatch) {
        let state = &mut place.state;
        if let Some(name) = patch.name {
            state.name = name;
        }
        if let Some(slug) = patch.slug {
            state.slug = slug;
        }
        for (field, value) in [
            (&mut state.description, patch.description),
            (&mut state.address, patch.address),
            (&mut state.city, patch.city),
            (&mut state.state, patch.state),
            (&mut state.country, patch.country),
            (&mut state.postal_code, patch.postal_code),
            (&mut state.website, patch.website),
            (&mut state.phone, patch.phone),
            (&mut state.email, patch.email),
        ] {
            if value.is_some() {
                *field = value;
            }
        }
        if let Some(location) = patch.location {
            state.location = location;
        }
        if let Some(place_type) = patch.place_type {
            state.place_type = place_type;
        }
        if let Some(status) = patch.status {
            state.status = status;
        }
        place.data.updated = Utc::now();
    }

    fn slug_taken(&self, slug: &str, except: Option<i64>) -> bool {
        self.places
            .lock()
            .unwrap()
            .values()
            .any(|place| Some(place.id()) != except && place.slug() == slug)
    }
}

#[async_trait]
impl PlaceRepository for MemoryPlaceRepository {
    async fn list(
        &self,
        input: &ListInput<PlacePredicate>,
    ) -> Result<ListOutput<PlaceMatch>, PersistenceError> {
        let near = matches!(input.filter, PlacePredicate::Near { .. });
        let sort = if near && input.has_default_sort() {
            "distance"
        } else {
            input.sort.as_str()
        };
        if sort != "distance" || !near {
            check_sort(sort, &PLACE_SORT_FIELDS)?;
        }

        let rows = self
            .places
            .lock()
            .unwrap()
            .values()
            .filter_map(|place| {
                let distance = Self::matches(place, &input.filter)?;
                Some((
                    Self::sort_key(place, sort, distance),
                    place.id(),
                    PlaceMatch {
                        place: place.clone(),
                        distance,
                    },
                ))
            })
            .collect();

        let mut input = input.clone();
        if near && input.has_default_sort() {
            input.sort_dir = SortDir::Asc;
        }
        Ok(paginate(rows, &input))
    }

    async fn find_one(&self, lookup: &PlaceLookup) -> Result<Option<Place>, PersistenceError> {
        Ok(self
            .places
            .lock()
            .unwrap()
            .values()
            .find(|place| {
                lookup.id.map_or(true, |v| place.id() == v)
                    && lookup.uuid.map_or(true, |v| place.uuid() == v)
                    && lookup.slug.as_ref().map_or(true, |v| place.slug() == v)
                    && lookup.name.as_ref().map_or(true, |v| place.name() == v)
            })
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Place>, PersistenceError> {
        let places = self.places.lock().unwrap();
        Ok(ids.iter().filter_map(|id| places.get(id).cloned()).collect())
    }

    async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, PersistenceError> {
        let places = self.places.lock().unwrap();
        Ok(ids.iter().copied().filter(|id| places.contains_key(id)).collect())
    }

    async fn slug_exists(&self, slug: &str, except: Option<i64>) -> Result<bool, PersistenceError> {
        Ok(self.slug_taken(slug, except))
    }

    async fn k_nearest(
        &self,
        origin: GeoPoint,
        k: i64,
    ) -> Result<Vec<PlaceMatch>, PersistenceError> {
        let mut matches: Vec<_> = self
            .places
            .lock()
            .unwrap()
            .values()
            .map(|place| PlaceMatch {
                distance: Some(origin.distance_to(&place.location())),
                place: place.clone(),
            })
            .collect();
        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then(a.place.id().cmp(&b.place.id()))
        });
        matches.truncate(k.max(0) as usize);
        Ok(matches)
    }

    async fn cluster(&self, grid_size: f64) -> Result<Vec<PlaceCluster>, PersistenceError> {
        let mut cells: BTreeMap<(i64, i64), i64> = BTreeMap::new();
        for place in self.places.lock().unwrap().values() {
            let location = place.location();
            let cell = (
                (location.latitude() / grid_size).round() as i64,
                (location.longitude() / grid_size).round() as i64,
            );
            *cells.entry(cell).or_default() += 1;
        }

        let mut clusters: Vec<_> = cells
            .into_iter()
            .map(|((lat, lng), count)| PlaceCluster {
                center: GeoPoint::clamped(lat as f64 * grid_size, lng as f64 * grid_size),
                count,
            })
            .collect();
        clusters.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(clusters)
    }

    async fn create_one(&self, place: NewPlace) -> Result<Place, PersistenceError> {
        if self.slug_taken(&place.slug, None) {
            return Err(PersistenceError::UniqueViolation(Some(
                crate::app::use_case::place::SLUG_CONSTRAINT.into(),
            )));
        }

        let mut places = self.places.lock().unwrap();
        let id = places.keys().next_back().map_or(1, |id| id + 1);
        let place = Place::restore(
            entity_data(id),
            PlaceState {
                name: place.name,
                slug: place.slug,
                description: place.description,
                address: place.address,
                city: place.city,
                state: place.state,
                country: place.country,
                postal_code: place.postal_code,
                website: place.website,
                phone: place.phone,
                email: place.email,
                location: place.location,
                place_type: place.place_type,
                status: place.status,
            },
        );
        places.insert(id, place.clone());
        Ok(place)
    }

    async fn update_one(
        &self,
        id: i64,
        patch: PlacePatch,
    ) -> Result<Option<Place>, PersistenceError> {
        let mut places = self.places.lock().unwrap();
        Ok(places.get_mut(&id).map(|place| {
            Self::apply(place, patch);
            place.clone()
        }))
    }

    async fn remove_one(&self, id: i64) -> Result<bool, PersistenceError> {
        Ok(self.places.lock().unwrap().remove(&id).is_some())
    }

    async fn remove_many(&self, ids: &[i64]) -> Result<Vec<i64>, PersistenceError> {
        let mut places = self.places.lock().unwrap();
        Ok(ids
            .iter()
            .copied()
            .filter(|id| places.remove(id).is_some())
            .collect())
    }
}

// ### Token blacklist

#[derive(Default)]
pub struct MemoryTokenBlacklistRepository {
    entries: Mutex<Vec<TokenBlacklist>>,
}

#[async_trait]
impl TokenBlacklistRepository for MemoryTokenBlacklistRepository {
    async fn insert(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<TokenBlacklist, PersistenceError> {
        let mut entries = self.entries.lock().unwrap();
        let entry = TokenBlacklist {
            id: entries.len() as i64 + 1,
            token: token.into(),
            blacklisted_at: Utc::now(),
            expires_at,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn is_blacklisted(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .any(|entry| entry.token == token && entry.is_active(now)))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|entry| entry.is_active(now));
        Ok((before - entries.len()) as u64)
    }
}

// ### Services

/// Argon2id with minimal cost parameters.
pub struct FakeHashService;

impl FakeHashService {
    fn hasher() -> Argon2HashService {
        Argon2HashService::with_cost(8, 1, 1)
    }
}

impl PasswordHashService for FakeHashService {
    fn hash_password(&self, pwd: &str) -> Result<PasswordHash, PasswordHashError> {
        Self::hasher().hash_password(pwd)
    }

    fn verify_password(&self, pwd: &str, hash: &PasswordHash) -> Result<(), PasswordHashError> {
        Self::hasher().verify_password(pwd, hash)
    }
}

#[derive(Default)]
pub struct CapturedMail {
    sent: Mutex<Vec<MailMessage>>,
}

impl CapturedMail {
    pub fn last(&self) -> Option<MailMessage> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl MailService for CapturedMail {
    async fn send(&self, message: MailMessage) -> Result<(), UnknownError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn blacklist_ignores_and_purges_expired_entries() {
        let repo = MemoryTokenBlacklistRepository::default();
        let now = Utc::now();
        repo.insert("old", now - Duration::minutes(1)).await.unwrap();
        repo.insert("fresh", now + Duration::hours(1)).await.unwrap();

        assert!(!repo.is_blacklisted("old", now).await.unwrap());
        assert!(repo.is_blacklisted("fresh", now).await.unwrap());
        assert_eq!(repo.purge_expired(now).await.unwrap(), 1);
        assert!(repo.is_blacklisted("fresh", now).await.unwrap());
    }

    #[test]
    fn fake_hasher_round_trips() {
        let hash = FakeHashService.hash_password("correct-horse").unwrap();
        FakeHashService.verify_password("correct-horse", &hash).unwrap();
        assert_eq!(
            FakeHashService.verify_password("wrong-horse", &hash),
            Err(PasswordHashError::InvalidPassword)
        );
    }
}
