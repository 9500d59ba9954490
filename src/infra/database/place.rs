use std::collections::HashSet;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::sql;
use crate::{
    domain::{
        datatype::geo::{GeoPoint, SRID},
        entity::{
            place::{Place, PlaceState, PlaceStatus, PlaceType},
            EntityData,
        },
        query::{ListInput, ListOutput, SortDir},
        repository::{
            NewPlace, PlaceCluster, PlaceLookup, PlaceMatch, PlacePatch, PlacePredicate,
            PlaceRepository,
        },
    },
    error::persistence::PersistenceError,
};

pub const PLACE_SORT_FIELDS: [&str; 12] = [
    "id",
    "uuid",
    "name",
    "slug",
    "city",
    "state",
    "country",
    "postal_code",
    "type",
    "status",
    "created_at",
    "updated_at",
];

const PLACE_COLUMNS: &str = "id, uuid, name, slug, description, address, city, state, country, \
    postal_code, website, phone, email, ST_Y(location::geometry) AS latitude, \
    ST_X(location::geometry) AS longitude, type, status, created_at, updated_at";

/// Ordering of a listing, `distance` only exists when the predicate computes it.
fn order_by(input: &ListInput<PlacePredicate>) -> Result<(&'static str, SortDir), PersistenceError> {
    let near = matches!(input.filter, PlacePredicate::Near { .. });
    if near && input.has_default_sort() {
        return Ok(("distance", SortDir::Asc));
    }
    if near && input.sort == "distance" {
        return Ok(("distance", input.sort_dir));
    }
    PLACE_SORT_FIELDS
        .iter()
        .find(|field| **field == input.sort)
        .map(|field| (*field, input.sort_dir))
        .ok_or_else(|| PersistenceError::UnknownField(input.sort.clone()))
}

fn place_from_row(row: &PgRow) -> Result<Place, PersistenceError> {
    let location = GeoPoint::new(row.try_get("latitude")?, row.try_get("longitude")?)
        .map_err(|err| {
            tracing::error!("stored place location out of range: {err}");
            PersistenceError::DecodeData
        })?;
    let place_type = PlaceType::try_from(row.try_get::<i16, _>("type")?)
        .map_err(|_| PersistenceError::DecodeData)?;
    let status = PlaceStatus::try_from(row.try_get::<i16, _>("status")?)
        .map_err(|_| PersistenceError::DecodeData)?;

    Ok(Place::restore(
        EntityData::restore(
            row.try_get("id")?,
            row.try_get("uuid")?,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ),
        PlaceState {
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            address: row.try_get("address")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            country: row.try_get("country")?,
            postal_code: row.try_get("postal_code")?,
            website: row.try_get("website")?,
            phone: row.try_get("phone")?,
            email: row.try_get("email")?,
            location,
            place_type,
            status,
        },
    ))
}

fn match_from_row(row: &PgRow, with_distance: bool) -> Result<PlaceMatch, PersistenceError> {
    let distance = if with_distance {
        Some(row.try_get("distance")?)
    } else {
        None
    };
    Ok(PlaceMatch {
        place: place_from_row(row)?,
        distance,
    })
}

fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &PlacePredicate) {
    qb.push(" WHERE TRUE");
    match predicate {
        PlacePredicate::All => {}
        PlacePredicate::Equal(filter) => {
            for (column, value) in [
                ("name", &filter.name),
                ("slug", &filter.slug),
                ("city", &filter.city),
                ("state", &filter.state),
                ("country", &filter.country),
                ("postal_code", &filter.postal_code),
            ] {
                if let Some(value) = value {
                    qb.push(format!(" AND {column} = ")).push_bind(value.clone());
                }
            }
            if let Some(place_type) = filter.place_type {
                qb.push(" AND type = ").push_bind(i16::from(place_type));
            }
            if let Some(status) = filter.status {
                qb.push(" AND status = ").push_bind(i16::from(status));
            }
        }
        PlacePredicate::Contains { field, query } => {
            qb.push(format!(" AND {} ILIKE ", field.as_str()))
                .push_bind(sql::contains_pattern(query))
                .push(" ESCAPE '\\'");
        }
        PlacePredicate::Near { origin, radius } => {
            qb.push(" AND ST_DWithin(location, ");
            sql::push_point(qb, origin);
            qb.push(", ").push_bind(*radius).push(")");
        }
        PlacePredicate::WithinBox(bbox) => {
            let (min, max) = (bbox.min(), bbox.max());
            qb.push(" AND ST_Covers(ST_MakeEnvelope(")
                .push_bind(min.longitude())
                .push(", ")
                .push_bind(min.latitude())
                .push(", ")
                .push_bind(max.longitude())
                .push(", ")
                .push_bind(max.latitude())
                .push(format!(", {SRID}), location::geometry)"));
        }
    }
}

fn push_select(qb: &mut QueryBuilder<'_, Postgres>, origin: Option<&GeoPoint>) {
    qb.push(format!("SELECT {PLACE_COLUMNS}"));
    if let Some(origin) = origin {
        qb.push(", ST_Distance(location, ");
        sql::push_point(qb, origin);
        qb.push(") AS distance");
    }
    qb.push(" FROM places");
}

async fn fetch_matches(
    pool: &PgPool,
    mut qb: QueryBuilder<'_, Postgres>,
    with_distance: bool,
) -> Result<Vec<PlaceMatch>, PersistenceError> {
    let mut rows = qb.build().fetch(pool);
    let mut places = Vec::new();
    while let Some(row) = rows.try_next().await? {
        places.push(match_from_row(&row, with_distance)?);
    }
    Ok(places)
}

fn push_patch(qb: &mut QueryBuilder<'_, Postgres>, patch: PlacePatch) {
    for (column, value) in [
        ("name", patch.name),
        ("slug", patch.slug),
        ("description", patch.description),
        ("address", patch.address),
        ("city", patch.city),
        ("state", patch.state),
        ("country", patch.country),
        ("postal_code", patch.postal_code),
        ("website", patch.website),
        ("phone", patch.phone),
        ("email", patch.email),
    ] {
        if let Some(value) = value {
            qb.push(format!(", {column} = ")).push_bind(value);
        }
    }
    if let Some(location) = patch.location {
        qb.push(", location = ");
        sql::push_point(qb, &location);
    }
    if let Some(place_type) = patch.place_type {
        qb.push(", type = ").push_bind(i16::from(place_type));
    }
    if let Some(status) = patch.status {
        qb.push(", status = ").push_bind(i16::from(status));
    }
}

pub struct PgPlaceRepository {
    pool: PgPool,
}

impl PgPlaceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaceRepository for PgPlaceRepository {
    async fn list(
        &self,
        input: &ListInput<PlacePredicate>,
    ) -> Result<ListOutput<PlaceMatch>, PersistenceError> {
        let (column, dir) = order_by(input)?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM places");
        push_predicate(&mut count, &input.filter);
        let total: i64 = count.build().fetch_one(&self.pool).await?.try_get(0)?;

        if input.is_empty_window() {
            return Ok(ListOutput::new(Vec::new(), total, input));
        }

        let origin = match &input.filter {
            PlacePredicate::Near { origin, .. } => Some(origin),
            _ => None,
        };

        let mut qb = QueryBuilder::new("");
        push_select(&mut qb, origin);
        push_predicate(&mut qb, &input.filter);
        sql::push_order(&mut qb, column, dir);
        sql::push_window(&mut qb, input);

        let places = fetch_matches(&self.pool, qb, origin.is_some()).await?;
        Ok(ListOutput::new(places, total, input))
    }

    async fn find_one(&self, lookup: &PlaceLookup) -> Result<Option<Place>, PersistenceError> {
        let mut qb = QueryBuilder::new(format!("SELECT {PLACE_COLUMNS} FROM places WHERE TRUE"));
        if let Some(id) = lookup.id {
            qb.push(" AND id = ").push_bind(id);
        }
        if let Some(uuid) = lookup.uuid {
            qb.push(" AND uuid = ").push_bind(uuid);
        }
        if let Some(slug) = &lookup.slug {
            qb.push(" AND slug = ").push_bind(slug.clone());
        }
        if let Some(name) = &lookup.name {
            qb.push(" AND name = ").push_bind(name.clone());
        }
        qb.push(" ORDER BY id LIMIT 1");

        let row = qb.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(place_from_row).transpose()
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Place>, PersistenceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::new(format!("SELECT {PLACE_COLUMNS} FROM places WHERE id IN "));
        sql::push_list(&mut qb, ids.iter().copied());
        qb.push(" ORDER BY id");

        let matches = fetch_matches(&self.pool, qb, false).await?;
        Ok(matches.into_iter().map(|found| found.place).collect())
    }

    async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, PersistenceError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let mut qb = QueryBuilder::new("SELECT id FROM places WHERE id IN ");
        sql::push_list(&mut qb, ids.iter().copied());

        let mut rows = qb.build().fetch(&self.pool);
        let mut set = HashSet::new();
        while let Some(row) = rows.try_next().await? {
            set.insert(row.try_get(0)?);
        }
        Ok(set)
    }

    async fn slug_exists(&self, slug: &str, except: Option<i64>) -> Result<bool, PersistenceError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM places WHERE slug = $1 \
             AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn k_nearest(
        &self,
        origin: GeoPoint,
        k: i64,
    ) -> Result<Vec<PlaceMatch>, PersistenceError> {
        let mut qb = QueryBuilder::new("");
        push_select(&mut qb, Some(&origin));
        qb.push(" ORDER BY location <-> ");
        sql::push_point(&mut qb, &origin);
        qb.push(", id LIMIT ").push_bind(k);

        fetch_matches(&self.pool, qb, true).await
    }

    async fn cluster(&self, grid_size: f64) -> Result<Vec<PlaceCluster>, PersistenceError> {
        let mut rows = sqlx::query(
            "SELECT ST_Y(cell) AS latitude, ST_X(cell) AS longitude, COUNT(*) AS count \
             FROM (SELECT ST_SnapToGrid(location::geometry, $1) AS cell FROM places) AS snapped \
             GROUP BY cell ORDER BY count DESC, latitude, longitude",
        )
        .bind(grid_size)
        .fetch(&self.pool);

        let mut clusters = Vec::new();
        while let Some(row) = rows.try_next().await? {
            clusters.push(PlaceCluster {
                center: GeoPoint::clamped(row.try_get("latitude")?, row.try_get("longitude")?),
                count: row.try_get("count")?,
            });
        }
        Ok(clusters)
    }

    async fn create_one(&self, place: NewPlace) -> Result<Place, PersistenceError> {
        let mut qb = QueryBuilder::new(
            "INSERT INTO places (uuid, name, slug, description, address, city, state, country, \
             postal_code, website, phone, email, type, status, location) VALUES (",
        );
        let mut values = qb.separated(", ");
        values
            .push_bind(Uuid::new_v4())
            .push_bind(place.name)
            .push_bind(place.slug)
            .push_bind(place.description)
            .push_bind(place.address)
            .push_bind(place.city)
            .push_bind(place.state)
            .push_bind(place.country)
            .push_bind(place.postal_code)
            .push_bind(place.website)
            .push_bind(place.phone)
            .push_bind(place.email)
            .push_bind(i16::from(place.place_type))
            .push_bind(i16::from(place.status));
        qb.push(", ");
        sql::push_point(&mut qb, &place.location);
        qb.push(format!(") RETURNING {PLACE_COLUMNS}"));

        let row = qb.build().fetch_one(&self.pool).await?;
        place_from_row(&row)
    }

    async fn update_one(
        &self,
        id: i64,
        patch: PlacePatch,
    ) -> Result<Option<Place>, PersistenceError> {
        let mut qb = QueryBuilder::new("UPDATE places SET updated_at = now()");
        push_patch(&mut qb, patch);
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {PLACE_COLUMNS}"));

        let row = qb.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(place_from_row).transpose()
    }

    async fn remove_one(&self, id: i64) -> Result<bool, PersistenceError> {
        let result = sqlx::query("DELETE FROM places WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_many(&self, ids: &[i64]) -> Result<Vec<i64>, PersistenceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::new("DELETE FROM places WHERE id IN ");
        sql::push_list(&mut qb, ids.iter().copied());
        qb.push(" RETURNING id");

        let mut rows = qb.build().fetch(&self.pool);
        let mut removed = Vec::new();
        while let Some(row) = rows.try_next().await? {
            removed.push(row.try_get(0)?);
        }
        Ok(removed)
    }
}
