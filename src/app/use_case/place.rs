use std::collections::BTreeMap;

use super::{bulk_outcome, iam::require_items, validation as common};
use crate::{
    app::resource::{
        base::{
            BulkItem, ExistsManyResponse, ExistsResponse, IdQuery, IdsQuery, RemoveMany,
            RemoveOne, RemovedResponse,
        },
        place::{
            ClusterQuery, CreatePlace, KNearestQuery, NearbyQuery, PlaceClusterResponse,
            PlaceFindOneQuery, PlaceListQuery, PlaceResponse, PlaceSearchQuery, UpdatePlace,
            WithinBoxQuery,
        },
    },
    domain::{
        datatype::slug,
        entity::Entity,
        query::ListOutput,
        repository::{NewPlace, PlaceLookup, PlacePatch, PlacePredicate, PlaceRepository},
    },
    error::{
        app::ApplicationError,
        persistence::PersistenceError,
        resource::{NotFoundError, ValidationError, ValidationErrorKind},
    },
};

pub const SLUG_CONSTRAINT: &str = "places_slug_key";
/// Attempts to derive a free slug when concurrent inserts keep colliding.
const SLUG_ATTEMPTS: usize = 3;

pub(crate) mod validation {
    use lazy_static::lazy_static;
    use regex::Regex;

    use super::*;
    use crate::{
        app::resource::place::PlaceFields,
        domain::{
            datatype::geo::{BoundingBox, GeoError, GeoPoint},
            entity::place::{PlaceStatus, PlaceType},
            query::ListInput,
            repository::{PlaceFilter, PlaceSearchField},
        },
        error::resource::ValidationFieldError,
    };

    pub const DEFAULT_RADIUS: f64 = 5000.0;
    pub const DEFAULT_K: i64 = 5;
    pub const MAX_K: i64 = 100;
    pub const DEFAULT_GRID_SIZE: f64 = 0.01;

    lazy_static! {
        static ref SLUG_PATTERN: Regex =
            Regex::new(r"^[-a-zA-Z0-9_]+$").expect("Expect a valid slug regex");
    }

    fn geo_field_error(err: GeoError, lat_path: &str, lng_path: &str) -> ValidationFieldError {
        match err {
            GeoError::Latitude(value) => common::field_error(
                "base::latitude",
                value,
                lat_path,
                vec![ValidationErrorKind::Range("[-90, 90]".into())],
            ),
            GeoError::Longitude(value) => common::field_error(
                "base::longitude",
                value,
                lng_path,
                vec![ValidationErrorKind::Range("[-180, 180]".into())],
            ),
            GeoError::LatitudeOrder(min, max) => common::field_error(
                "base::latitude",
                min,
                lat_path,
                vec![ValidationErrorKind::LessThan(max.to_string())],
            ),
            GeoError::LongitudeOrder(min, max) => common::field_error(
                "base::longitude",
                min,
                lng_path,
                vec![ValidationErrorKind::LessThan(max.to_string())],
            ),
        }
    }

    fn point(
        latitude: Option<f64>,
        longitude: Option<f64>,
        (lat_path, lng_path): (&str, &str),
        errors: &mut Vec<ValidationFieldError>,
    ) -> Option<GeoPoint> {
        let (latitude, longitude) = (latitude?, longitude?);
        match GeoPoint::new(latitude, longitude) {
            Ok(point) => Some(point),
            Err(err) => {
                errors.push(geo_field_error(err, lat_path, lng_path));
                None
            }
        }
    }

    fn required_point(
        latitude: Option<&str>,
        longitude: Option<&str>,
        paths: (&str, &str),
        errors: &mut Vec<ValidationFieldError>,
    ) -> Option<GeoPoint> {
        let lat = common::parse_required(latitude, "base::latitude", paths.0, errors);
        let lng = common::parse_required(longitude, "base::longitude", paths.1, errors);
        point(lat, lng, paths, errors)
    }

    fn positive(
        raw: Option<&str>,
        default: f64,
        type_id: &'static str,
        path: &str,
        errors: &mut Vec<ValidationFieldError>,
    ) -> f64 {
        let value = common::parse_opt(raw, type_id, path, errors).unwrap_or(default);
        if !(value > 0.0 && value.is_finite()) {
            errors.push(common::field_error(
                type_id,
                value,
                path,
                vec![ValidationErrorKind::Positive],
            ));
        }
        value
    }

    fn choice<T: Copy>(
        raw: Option<i16>,
        parse: fn(i16) -> Result<T, String>,
        type_id: &'static str,
        path: &str,
        errors: &mut Vec<ValidationFieldError>,
    ) -> Option<T> {
        let raw = raw?;
        match parse(raw) {
            Ok(value) => Some(value),
            Err(_) => {
                errors.push(common::field_error(
                    type_id,
                    raw,
                    path,
                    vec![ValidationErrorKind::UnknownVariant],
                ));
                None
            }
        }
    }

    pub fn list_places(
        query: &PlaceListQuery,
    ) -> Result<ListInput<PlacePredicate>, Vec<ValidationFieldError>> {
        let mut errors = Vec::new();
        let input = common::list_input(query, &mut errors);

        let place_type = common::parse_opt(query.place_type.as_deref(), "place::type", "/type", &mut errors);
        let status = common::parse_opt(query.status.as_deref(), "place::status", "/status", &mut errors);

        let filter = PlaceFilter {
            name: query.name.clone(),
            slug: query.slug.clone(),
            city: query.city.clone(),
            state: query.state.clone(),
            country: query.country.clone(),
            postal_code: query.postal_code.clone(),
            place_type: choice(place_type, PlaceType::try_from, "place::type", "/type", &mut errors),
            status: choice(status, PlaceStatus::try_from, "place::status", "/status", &mut errors),
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let predicate = if filter == PlaceFilter::default() {
            PlacePredicate::All
        } else {
            PlacePredicate::Equal(filter)
        };
        Ok(input.with_filter(predicate))
    }

    pub fn search_places(
        query: &PlaceSearchQuery,
    ) -> Result<ListInput<PlacePredicate>, Vec<ValidationFieldError>> {
        let mut errors = Vec::new();
        let input = common::list_input(query, &mut errors);

        let text = match query.query.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Some(text.to_string()),
            _ => {
                errors.push(common::required("base::string", "/query"));
                None
            }
        };

        let field = match query.field.as_deref() {
            None => {
                errors.push(common::required("place::PlaceSearchField", "/field"));
                None
            }
            Some(raw) => {
                let field = PlaceSearchField::ALL.into_iter().find(|f| f.as_str() == raw);
                if field.is_none() {
                    errors.push(common::field_error(
                        "place::PlaceSearchField",
                        raw,
                        "/field",
                        vec![ValidationErrorKind::UnknownVariant],
                    ));
                }
                field
            }
        };

        match (text, field) {
            (Some(query), Some(field)) if errors.is_empty() => {
                Ok(input.with_filter(PlacePredicate::Contains { field, query }))
            }
            _ => Err(errors),
        }
    }

    pub fn nearby(query: &NearbyQuery) -> Result<ListInput<PlacePredicate>, Vec<ValidationFieldError>> {
        let mut errors = Vec::new();
        let input = common::list_input(query, &mut errors);

        let origin = required_point(
            query.latitude.as_deref(),
            query.longitude.as_deref(),
            ("/latitude", "/longitude"),
            &mut errors,
        );
        let radius = positive(
            query.radius.as_deref(),
            DEFAULT_RADIUS,
            "base::meters",
            "/radius",
            &mut errors,
        );

        match origin {
            Some(origin) if errors.is_empty() => {
                Ok(input.with_filter(PlacePredicate::Near { origin, radius }))
            }
            _ => Err(errors),
        }
    }

    pub fn within_box(
        query: &WithinBoxQuery,
    ) -> Result<ListInput<PlacePredicate>, Vec<ValidationFieldError>> {
        let mut errors = Vec::new();
        let input = common::list_input(query, &mut errors);

        let min = required_point(
            query.min_lat.as_deref(),
            query.min_lng.as_deref(),
            ("/min_lat", "/min_lng"),
            &mut errors,
        );
        let max = required_point(
            query.max_lat.as_deref(),
            query.max_lng.as_deref(),
            ("/max_lat", "/max_lng"),
            &mut errors,
        );

        let (min, max) = match (min, max) {
            (Some(min), Some(max)) if errors.is_empty() => (min, max),
            _ => return Err(errors),
        };

        match BoundingBox::new(min, max) {
            Ok(bbox) => Ok(input.with_filter(PlacePredicate::WithinBox(bbox))),
            Err(err) => Err(vec![geo_field_error(err, "/min_lat", "/min_lng")]),
        }
    }

    pub fn k_nearest(query: &KNearestQuery) -> Result<(GeoPoint, i64), Vec<ValidationFieldError>> {
        let mut errors = Vec::new();
        let origin = required_point(
            query.latitude.as_deref(),
            query.longitude.as_deref(),
            ("/latitude", "/longitude"),
            &mut errors,
        );

        let k = common::parse_opt(query.k.as_deref(), "base::i64", "/k", &mut errors).unwrap_or(DEFAULT_K);
        if !(1..=MAX_K).contains(&k) {
            errors.push(common::field_error(
                "base::i64",
                k,
                "/k",
                vec![ValidationErrorKind::Range(format!("[1, {MAX_K}]"))],
            ));
        }

        match origin {
            Some(origin) if errors.is_empty() => Ok((origin, k)),
            _ => Err(errors),
        }
    }

    pub fn cluster(query: &ClusterQuery) -> Result<f64, Vec<ValidationFieldError>> {
        let mut errors = Vec::new();
        let grid_size = positive(
            query.grid_size.as_deref(),
            DEFAULT_GRID_SIZE,
            "base::degrees",
            "/grid_size",
            &mut errors,
        );
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(grid_size)
    }

    pub fn find_one(query: &PlaceFindOneQuery) -> Result<PlaceLookup, Vec<ValidationFieldError>> {
        let mut errors = Vec::new();
        let lookup = PlaceLookup {
            id: common::parse_opt(query.id.as_deref(), "base::i64", "/id", &mut errors),
            uuid: common::parse_opt(query.uuid.as_deref(), "base::uuid", "/uuid", &mut errors),
            slug: query.slug.clone(),
            name: query.name.clone(),
        };

        if errors.is_empty() && lookup.is_empty() {
            errors.push(common::field_error(
                "place::PlaceFindOneQuery",
                "",
                "",
                vec![ValidationErrorKind::MinItems(1)],
            ));
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(lookup)
    }

    /// Validated place fields, shared by create and update.
    pub fn place_fields(
        fields: &PlaceFields,
        errors: &mut Vec<ValidationFieldError>,
    ) -> PlacePatch {
        let limits: [(&Option<String>, usize, &str); 8] = [
            (&fields.name, 255, "/name"),
            (&fields.slug, slug::SLUG_MAX_LENGTH, "/slug"),
            (&fields.address, 255, "/address"),
            (&fields.city, 100, "/city"),
            (&fields.state, 100, "/state"),
            (&fields.country, 100, "/country"),
            (&fields.postal_code, 20, "/postal_code"),
            (&fields.phone, 50, "/phone"),
        ];
        for (value, max, path) in limits {
            if let Some(value) = value {
                common::check_max_length(value, max, "base::string", path, errors);
            }
        }

        if let Some(name) = &fields.name {
            if name.trim().is_empty() {
                errors.push(common::required("base::string", "/name"));
            }
        }
        // A blank slug means "derive it" on create and "keep it" on update.
        let slug = fields.slug.clone().filter(|slug| !slug.trim().is_empty());
        if let Some(slug) = &slug {
            if !SLUG_PATTERN.is_match(slug) {
                errors.push(common::field_error(
                    "place::slug",
                    slug,
                    "/slug",
                    vec![ValidationErrorKind::Pattern(SLUG_PATTERN.as_str().into())],
                ));
            }
        }
        if let Some(email) = &fields.email {
            if !common::is_email(email) {
                errors.push(common::field_error(
                    "base::email",
                    email,
                    "/email",
                    vec![ValidationErrorKind::Invalid],
                ));
            }
        }
        if let Some(website) = &fields.website {
            let valid = url::Url::parse(website)
                .map(|url| matches!(url.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !valid {
                errors.push(common::field_error(
                    "base::url",
                    website,
                    "/website",
                    vec![ValidationErrorKind::Invalid],
                ));
            } else {
                common::check_max_length(website, 255, "base::url", "/website", errors);
            }
        }

        let location = match (fields.latitude, fields.longitude) {
            (Some(_), None) | (None, Some(_)) => {
                let path = if fields.latitude.is_none() {
                    "/latitude"
                } else {
                    "/longitude"
                };
                errors.push(common::required("base::coordinate", path));
                None
            }
            (latitude, longitude) => point(latitude, longitude, ("/latitude", "/longitude"), errors),
        };

        PlacePatch {
            name: fields.name.as_ref().map(|name| name.trim().to_string()),
            slug,
            description: fields.description.clone(),
            address: fields.address.clone(),
            city: fields.city.clone(),
            state: fields.state.clone(),
            country: fields.country.clone(),
            postal_code: fields.postal_code.clone(),
            website: fields.website.clone(),
            phone: fields.phone.clone(),
            email: fields.email.clone(),
            location,
            place_type: choice(fields.place_type, PlaceType::try_from, "place::type", "/type", errors),
            status: choice(fields.status, PlaceStatus::try_from, "place::status", "/status", errors),
        }
    }

    /// Place ready to insert, except for the final slug.
    pub fn create_place(dto: &CreatePlace) -> Result<NewPlace, Vec<ValidationFieldError>> {
        let mut errors = Vec::new();
        let patch = place_fields(dto, &mut errors);

        if dto.name.is_none() {
            errors.push(common::required("base::string", "/name"));
        }
        if dto.latitude.is_none() && dto.longitude.is_none() {
            errors.push(common::required("base::latitude", "/latitude"));
            errors.push(common::required("base::longitude", "/longitude"));
        }

        match (patch.name, patch.location) {
            (Some(name), Some(location)) if errors.is_empty() => Ok(NewPlace {
                slug: patch.slug.unwrap_or_default(),
                name,
                description: patch.description,
                address: patch.address,
                city: patch.city,
                state: patch.state,
                country: patch.country,
                postal_code: patch.postal_code,
                website: patch.website,
                phone: patch.phone,
                email: patch.email,
                location,
                place_type: patch.place_type.unwrap_or_default(),
                status: patch.status.unwrap_or_default(),
            }),
            _ => Err(errors),
        }
    }

    pub fn slug_taken(slug: &str) -> ValidationFieldError {
        common::field_error("place::slug", slug, "/slug", vec![ValidationErrorKind::AlreadyExists])
    }
}

fn not_found(key: impl ToString) -> NotFoundError {
    NotFoundError::of::<PlaceResponse>(key)
}

fn is_slug_violation(err: &PersistenceError) -> bool {
    err.violated_constraint() == Some(SLUG_CONSTRAINT)
}

/// Slug derived from `name`, suffixed until no stored place uses it.
async fn derive_slug<PR: PlaceRepository>(
    repo: &PR,
    name: &str,
) -> Result<String, PersistenceError> {
    let base = slug::slugify(name);
    let mut candidate = if base.is_empty() {
        slug::with_random_suffix(&base)
    } else {
        base.clone()
    };
    while repo.slug_exists(&candidate, None).await? {
        candidate = slug::with_random_suffix(&base);
    }
    Ok(candidate)
}

pub async fn find_all<PR: PlaceRepository>(
    repo: &PR,
    query: PlaceListQuery,
) -> Result<ListOutput<PlaceResponse>, ApplicationError<PlaceListQuery>> {
    let input = validation::list_places(&query)
        .map_err(|errors| ValidationError::from_resource(query.clone(), errors))?;

    let places = repo.list(&input).await?;
    Ok(places.map(PlaceResponse::from))
}

pub async fn search<PR: PlaceRepository>(
    repo: &PR,
    query: PlaceSearchQuery,
) -> Result<ListOutput<PlaceResponse>, ApplicationError<PlaceSearchQuery>> {
    let input = validation::search_places(&query)
        .map_err(|errors| ValidationError::from_resource(query.clone(), errors))?;

    let places = repo.list(&input).await?;
    Ok(places.map(PlaceResponse::from))
}

pub async fn nearby<PR: PlaceRepository>(
    repo: &PR,
    query: NearbyQuery,
) -> Result<ListOutput<PlaceResponse>, ApplicationError<NearbyQuery>> {
    let input = validation::nearby(&query)
        .map_err(|errors| ValidationError::from_resource(query.clone(), errors))?;

    let places = repo.list(&input).await?;
    Ok(places.map(PlaceResponse::from))
}

pub async fn within_box<PR: PlaceRepository>(
    repo: &PR,
    query: WithinBoxQuery,
) -> Result<ListOutput<PlaceResponse>, ApplicationError<WithinBoxQuery>> {
    let input = validation::within_box(&query)
        .map_err(|errors| ValidationError::from_resource(query.clone(), errors))?;

    let places = repo.list(&input).await?;
    Ok(places.map(PlaceResponse::from))
}

pub async fn k_nearest<PR: PlaceRepository>(
    repo: &PR,
    query: KNearestQuery,
) -> Result<Vec<PlaceResponse>, ApplicationError<KNearestQuery>> {
    let (origin, k) = validation::k_nearest(&query)
        .map_err(|errors| ValidationError::from_resource(query.clone(), errors))?;

    let places = repo.k_nearest(origin, k).await?;
    Ok(places.into_iter().map(PlaceResponse::from).collect())
}

pub async fn cluster<PR: PlaceRepository>(
    repo: &PR,
    query: ClusterQuery,
) -> Result<Vec<PlaceClusterResponse>, ApplicationError<ClusterQuery>> {
    let grid_size = validation::cluster(&query)
        .map_err(|errors| ValidationError::from_resource(query.clone(), errors))?;

    let clusters = repo.cluster(grid_size).await?;
    Ok(clusters.into_iter().map(PlaceClusterResponse::from).collect())
}

pub async fn find_one<PR: PlaceRepository>(
    repo: &PR,
    query: PlaceFindOneQuery,
) -> Result<PlaceResponse, ApplicationError<PlaceFindOneQuery>> {
    let lookup = validation::find_one(&query)
        .map_err(|errors| ValidationError::from_resource(query.clone(), errors))?;

    let place = repo
        .find_one(&lookup)
        .await?
        .ok_or_else(|| not_found(format!("{lookup:?}")))?;
    Ok(place.into())
}

pub async fn find_by_id<PR: PlaceRepository>(
    repo: &PR,
    query: IdQuery,
) -> Result<PlaceResponse, ApplicationError<IdQuery>> {
    let mut errors = Vec::new();
    let id: Option<i64> = common::parse_required(query.id.as_deref(), "base::i64", "/id", &mut errors);
    let id = match id {
        Some(id) if errors.is_empty() => id,
        _ => return Err(ValidationError::from_resource(query, errors).into()),
    };

    let place = repo
        .find_one(&PlaceLookup::by_id(id))
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(place.into())
}

pub async fn find_by_ids<PR: PlaceRepository>(
    repo: &PR,
    query: IdsQuery,
) -> Result<Vec<PlaceResponse>, ApplicationError<IdsQuery>> {
    let mut errors = Vec::new();
    let ids = common::parse_ids(query.ids.as_deref(), "/ids", &mut errors);
    if !errors.is_empty() {
        return Err(ValidationError::from_resource(query, errors).into());
    }

    let places = repo.find_by_ids(&ids).await?;
    Ok(places.into_iter().map(PlaceResponse::from).collect())
}

pub async fn exists_by_id<PR: PlaceRepository>(
    repo: &PR,
    query: IdQuery,
) -> Result<ExistsResponse, ApplicationError<IdQuery>> {
    let mut errors = Vec::new();
    let id: Option<i64> = common::parse_required(query.id.as_deref(), "base::i64", "/id", &mut errors);
    let id = match id {
        Some(id) if errors.is_empty() => id,
        _ => return Err(ValidationError::from_resource(query, errors).into()),
    };

    let existing = repo.existing_ids(&[id]).await?;
    Ok(ExistsResponse {
        id,
        exists: existing.contains(&id),
    })
}

pub async fn exists_by_ids<PR: PlaceRepository>(
    repo: &PR,
    query: IdsQuery,
) -> Result<ExistsManyResponse, ApplicationError<IdsQuery>> {
    let mut errors = Vec::new();
    let ids = common::parse_ids(query.ids.as_deref(), "/ids", &mut errors);
    if !errors.is_empty() {
        return Err(ValidationError::from_resource(query, errors).into());
    }

    let existing = repo.existing_ids(&ids).await?;
    Ok(ids
        .into_iter()
        .map(|id| (id, existing.contains(&id)))
        .collect::<BTreeMap<_, _>>())
}

pub async fn create_one<PR: PlaceRepository>(
    repo: &PR,
    dto: CreatePlace,
) -> Result<PlaceResponse, ApplicationError<CreatePlace>> {
    let mut new_place = validation::create_place(&dto)
        .map_err(|errors| ValidationError::from_resource(dto.clone(), errors))?;

    let given_slug = !new_place.slug.is_empty();
    if given_slug && repo.slug_exists(&new_place.slug, None).await? {
        let field = validation::slug_taken(&new_place.slug);
        return Err(ValidationError::from_resource(dto, vec![field]).into());
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        if !given_slug {
            new_place.slug = derive_slug(repo, &new_place.name).await?;
        }

        match repo.create_one(new_place.clone()).await {
            Ok(place) => {
                tracing::info!(place_id = place.id(), slug = place.slug().as_str(), "place created");
                return Ok(place.into());
            }
            Err(err) if is_slug_violation(&err) && !given_slug && attempt < SLUG_ATTEMPTS => {
                tracing::debug!(slug = new_place.slug.as_str(), "derived slug taken, retrying");
            }
            Err(err) if is_slug_violation(&err) => {
                let field = validation::slug_taken(&new_place.slug);
                return Err(ValidationError::from_resource(dto, vec![field]).into());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

pub async fn create_many<PR: PlaceRepository>(
    repo: &PR,
    dtos: Vec<CreatePlace>,
) -> Result<Vec<BulkItem<PlaceResponse>>, ApplicationError<()>> {
    require_items(dtos.len())?;

    let mut report = Vec::with_capacity(dtos.len());
    for (index, dto) in dtos.into_iter().enumerate() {
        let result = create_one(repo, dto).await;
        report.push(bulk_outcome(index, result)?);
    }
    Ok(report)
}

pub async fn update_one<PR: PlaceRepository>(
    repo: &PR,
    dto: UpdatePlace,
) -> Result<PlaceResponse, ApplicationError<UpdatePlace>> {
    let mut errors = Vec::new();
    let patch = validation::place_fields(&dto.fields, &mut errors);
    if dto.id.is_none() {
        errors.push(common::required("base::i64", "/id"));
    }
    let id = match dto.id {
        Some(id) if errors.is_empty() => id,
        _ => return Err(ValidationError::from_resource(dto, errors).into()),
    };

    if let Some(slug) = &patch.slug {
        if repo.slug_exists(slug, Some(id)).await? {
            let field = validation::slug_taken(slug);
            return Err(ValidationError::from_resource(dto, vec![field]).into());
        }
    }

    let slug = patch.slug.clone();
    let place = match repo.update_one(id, patch).await {
        Ok(place) => place.ok_or_else(|| not_found(id))?,
        Err(err) if is_slug_violation(&err) => {
            let field = validation::slug_taken(slug.as_deref().unwrap_or_default());
            return Err(ValidationError::from_resource(dto, vec![field]).into());
        }
        Err(err) => return Err(err.into()),
    };
    Ok(place.into())
}

pub async fn update_many<PR: PlaceRepository>(
    repo: &PR,
    dtos: Vec<UpdatePlace>,
) -> Result<Vec<BulkItem<PlaceResponse>>, ApplicationError<()>> {
    require_items(dtos.len())?;

    let mut report = Vec::with_capacity(dtos.len());
    for (index, dto) in dtos.into_iter().enumerate() {
        let result = update_one(repo, dto).await;
        report.push(bulk_outcome(index, result)?);
    }
    Ok(report)
}

pub async fn remove_one<PR: PlaceRepository>(
    repo: &PR,
    dto: RemoveOne,
) -> Result<(), ApplicationError<RemoveOne>> {
    let id = match dto.id {
        Some(id) => id,
        None => {
            return Err(ValidationError::from_resource(
                dto,
                vec![common::required("base::i64", "/id")],
            )
            .into())
        }
    };

    if !repo.remove_one(id).await? {
        return Err(not_found(id).into());
    }
    Ok(())
}

pub async fn remove_many<PR: PlaceRepository>(
    repo: &PR,
    dto: RemoveMany,
) -> Result<Vec<RemovedResponse>, ApplicationError<RemoveMany>> {
    let ids = dto.ids.clone().unwrap_or_default();
    let mut errors = Vec::new();
    common::check_ids(&ids, "/ids", &mut errors);
    if !errors.is_empty() {
        return Err(ValidationError::from_resource(dto, errors).into());
    }

    let removed = repo.remove_many(&ids).await?;
    Ok(ids
        .into_iter()
        .map(|id| RemovedResponse {
            id,
            removed: removed.contains(&id),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        app::resource::place::PlaceFields,
        domain::{datatype::geo::GeoPoint, entity::place::PlaceType},
        infra::memory::MemoryPlaceRepository,
    };

    fn place_dto(name: &str, latitude: f64, longitude: f64) -> CreatePlace {
        PlaceFields {
            name: Some(name.into()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Default::default()
        }
    }

    async fn seeded_repo() -> (MemoryPlaceRepository, PlaceResponse) {
        let repo = MemoryPlaceRepository::default();
        let bar = create_one(&repo, place_dto("Bar A", 40.0, -73.0)).await.unwrap();
        (repo, bar)
    }

    fn nearby_query(latitude: f64, longitude: f64, radius: f64) -> NearbyQuery {
        NearbyQuery {
            latitude: Some(latitude.to_string()),
            longitude: Some(longitude.to_string()),
            radius: Some(radius.to_string()),
            ..Default::default()
        }
    }

    fn box_query(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> WithinBoxQuery {
        WithinBoxQuery {
            min_lat: Some(min_lat.to_string()),
            min_lng: Some(min_lng.to_string()),
            max_lat: Some(max_lat.to_string()),
            max_lng: Some(max_lng.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_derives_slug_and_defaults() {
        let (_, bar) = seeded_repo().await;
        assert_eq!(bar.slug, "bar-a");
        assert_eq!(bar.place_type, PlaceType::Bar);
        assert_eq!(bar.type_display, "Bar");
        assert_eq!(bar.status_display, "Active");
        assert_eq!(bar.latitude, 40.0);
        assert_eq!(bar.longitude, -73.0);
        assert_eq!(bar.distance, None);
    }

    #[tokio::test]
    async fn colliding_slug_gets_random_suffix() {
        let (repo, _) = seeded_repo().await;
        let twin = create_one(&repo, place_dto("Bar A", 41.0, -73.0)).await.unwrap();

        let (base, suffix) = twin.slug.rsplit_once('-').unwrap();
        assert_eq!(base, "bar-a");
        assert_eq!(suffix.len(), 8);
    }

    #[tokio::test]
    async fn given_slug_collision_is_a_field_error() {
        let (repo, _) = seeded_repo().await;
        let mut dto = place_dto("Another", 41.0, -73.0);
        dto.slug = Some("bar-a".into());

        let err = create_one(&repo, dto).await.unwrap_err();
        match err {
            ApplicationError::Validation(err) => {
                assert_eq!(err.fields[0].path, "/slug");
                assert!(err.fields[0].has_kind(&ValidationErrorKind::AlreadyExists));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn derived_slug_folds_accents() {
        let repo = MemoryPlaceRepository::default();
        let cafe = create_one(&repo, place_dto("Café 24/7", 40.0, -73.0)).await.unwrap();
        assert_eq!(cafe.slug, "cafe-247");
    }

    #[tokio::test]
    async fn blank_slug_is_derived_on_create_and_kept_on_update() {
        let repo = MemoryPlaceRepository::default();
        let mut dto = place_dto("Bar A", 40.0, -73.0);
        dto.slug = Some(String::new());
        let bar = create_one(&repo, dto).await.unwrap();
        assert_eq!(bar.slug, "bar-a");

        let mut dto = place_dto("Bar B", 41.0, -73.0);
        dto.slug = Some("   ".into());
        let other = create_one(&repo, dto).await.unwrap();
        assert_eq!(other.slug, "bar-b");

        let updated = update_one(
            &repo,
            UpdatePlace {
                id: Some(bar.id),
                fields: PlaceFields {
                    slug: Some(String::new()),
                    city: Some("New York".into()),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.slug, "bar-a");
        assert_eq!(updated.city.as_deref(), Some("New York"));
    }

    #[tokio::test]
    async fn create_requires_both_coordinates() {
        let repo = MemoryPlaceRepository::default();
        let mut dto = place_dto("Bar A", 40.0, -73.0);
        dto.longitude = None;

        let err = create_one(&repo, dto).await.unwrap_err();
        match err {
            ApplicationError::Validation(err) => assert_eq!(err.fields[0].path, "/longitude"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nearby_includes_place_at_query_point() {
        let (repo, bar) = seeded_repo().await;
        let found = nearby(&repo, nearby_query(40.0, -73.0, 100.0)).await.unwrap();

        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].id, bar.id);
        assert!(found.items[0].distance.unwrap() < 1e-6);
    }

    #[tokio::test]
    async fn nearby_radius_boundary_is_inclusive() {
        let (repo, bar) = seeded_repo().await;
        let origin = GeoPoint::new(40.01, -73.0).unwrap();
        let exact = origin.distance_to(&GeoPoint::new(40.0, -73.0).unwrap());

        let found = nearby(&repo, nearby_query(40.01, -73.0, exact)).await.unwrap();
        assert_eq!(found.items.len(), 1);
        assert_eq!(found.items[0].id, bar.id);

        let missed = nearby(&repo, nearby_query(40.01, -73.0, exact - 1.0))
            .await
            .unwrap();
        assert_eq!(missed.total, 0);
        assert_eq!(missed.last_page, 0);
    }

    #[tokio::test]
    async fn nearby_orders_by_distance_by_default() {
        let (repo, bar) = seeded_repo().await;
        let far = create_one(&repo, place_dto("Far", 40.02, -73.0)).await.unwrap();
        let near = create_one(&repo, place_dto("Near", 40.001, -73.0)).await.unwrap();

        let found = nearby(&repo, nearby_query(40.0, -73.0, 5000.0)).await.unwrap();
        let ids: Vec<_> = found.items.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![bar.id, near.id, far.id]);
    }

    #[tokio::test]
    async fn nearby_rejects_non_positive_radius() {
        let repo = MemoryPlaceRepository::default();
        let err = nearby(&repo, nearby_query(40.0, -73.0, 0.0)).await.unwrap_err();
        match err {
            ApplicationError::Validation(err) => {
                assert_eq!(err.fields[0].path, "/radius");
                assert!(err.fields[0].has_kind(&ValidationErrorKind::Positive));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn within_box_contains_place() {
        let (repo, bar) = seeded_repo().await;

        let inside = within_box(&repo, box_query(39.0, -74.0, 41.0, -72.0)).await.unwrap();
        assert_eq!(inside.items.len(), 1);
        assert_eq!(inside.items[0].id, bar.id);

        let outside = within_box(&repo, box_query(41.0, -74.0, 42.0, -72.0)).await.unwrap();
        assert!(outside.items.is_empty());
    }

    #[tokio::test]
    async fn within_box_edges_are_inclusive() {
        let (repo, bar) = seeded_repo().await;

        let on_edge = within_box(&repo, box_query(40.0, -74.0, 41.0, -73.0)).await.unwrap();
        assert_eq!(on_edge.items[0].id, bar.id);

        let past_edge = within_box(&repo, box_query(40.000001, -74.0, 41.0, -72.0))
            .await
            .unwrap();
        assert_eq!(past_edge.total, 0);
    }

    #[tokio::test]
    async fn within_box_rejects_inverted_corners() {
        let repo = MemoryPlaceRepository::default();
        let err = within_box(&repo, box_query(41.0, -74.0, 39.0, -72.0))
            .await
            .unwrap_err();
        match err {
            ApplicationError::Validation(err) => {
                assert_eq!(err.fields[0].path, "/min_lat");
                assert!(err.fields[0].has_kind(&ValidationErrorKind::LessThan("39".into())));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pagination_slices_after_counting() {
        let repo = MemoryPlaceRepository::default();
        for idx in 0..25 {
            create_one(&repo, place_dto(&format!("Place {idx}"), 10.0, 10.0))
                .await
                .unwrap();
        }

        let page = find_all(
            &repo,
            PlaceListQuery {
                page: Some("3".into()),
                per_page: Some("10".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(page.total, 25);
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.current_page, 3);
        assert_eq!(page.last_page, 3);
    }

    #[tokio::test]
    async fn non_positive_page_size_returns_no_items() {
        let (repo, _) = seeded_repo().await;
        let page = find_all(
            &repo,
            PlaceListQuery {
                per_page: Some("0".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.last_page, 0);
    }

    #[tokio::test]
    async fn unknown_sort_field_is_a_store_error() {
        let (repo, _) = seeded_repo().await;
        let err = find_all(
            &repo,
            PlaceListQuery {
                sort: Some("popularity".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::Persistence(PersistenceError::UnknownField(_))
        ));
    }

    #[tokio::test]
    async fn filter_matches_place_type() {
        let (repo, _) = seeded_repo().await;
        let mut cafe = place_dto("Cafe B", 40.0, -73.0);
        cafe.place_type = Some(3);
        let cafe = create_one(&repo, cafe).await.unwrap();

        let found = find_all(
            &repo,
            PlaceListQuery {
                place_type: Some("3".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].id, cafe.id);
    }

    #[tokio::test]
    async fn remove_twice_yields_not_found() {
        let (repo, bar) = seeded_repo().await;
        remove_one(&repo, RemoveOne { id: Some(bar.id) }).await.unwrap();

        let err = remove_one(&repo, RemoveOne { id: Some(bar.id) })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_many_keeps_earlier_successes() {
        let (repo, bar) = seeded_repo().await;

        let report = update_many(
            &repo,
            vec![
                UpdatePlace {
                    id: Some(bar.id),
                    fields: PlaceFields {
                        city: Some("New York".into()),
                        ..Default::default()
                    },
                },
                UpdatePlace {
                    id: Some(999),
                    fields: PlaceFields {
                        city: Some("Nowhere".into()),
                        ..Default::default()
                    },
                },
                UpdatePlace {
                    id: Some(bar.id),
                    fields: PlaceFields {
                        latitude: Some(40.5),
                        ..Default::default()
                    },
                },
            ],
        )
        .await
        .unwrap();

        let statuses: Vec<_> = report.iter().map(BulkItem::is_ok).collect();
        assert_eq!(statuses, vec![true, false, false]);

        let stored = find_by_id(
            &repo,
            IdQuery {
                id: Some(bar.id.to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(stored.city.as_deref(), Some("New York"));
        assert_eq!(stored.latitude, 40.0);
    }

    #[tokio::test]
    async fn k_nearest_returns_closest_first() {
        let (repo, bar) = seeded_repo().await;
        create_one(&repo, place_dto("Far", 45.0, -73.0)).await.unwrap();

        let found = k_nearest(
            &repo,
            KNearestQuery {
                latitude: Some("40.0".into()),
                longitude: Some("-73.0".into()),
                k: Some("1".into()),
            },
        )
        .await
        .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, bar.id);
    }

    #[tokio::test]
    async fn coarse_grid_keeps_cells_past_the_poles_and_antimeridian() {
        let repo = MemoryPlaceRepository::default();
        create_one(&repo, place_dto("Arctic", 80.0, 10.0)).await.unwrap();
        create_one(&repo, place_dto("Date Line", 10.0, 179.0)).await.unwrap();

        let clusters = cluster(
            &repo,
            ClusterQuery {
                grid_size: Some("100".into()),
            },
        )
        .await
        .unwrap();

        let total: i64 = clusters.iter().map(|cluster| cluster.count).sum();
        assert_eq!(total, 2);
        assert!(clusters
            .iter()
            .any(|cluster| cluster.latitude == 90.0 && cluster.longitude == 0.0));
        assert!(clusters
            .iter()
            .any(|cluster| cluster.latitude == 0.0 && cluster.longitude == 180.0));
    }

    #[tokio::test]
    async fn cluster_groups_nearby_places() {
        let (repo, _) = seeded_repo().await;
        create_one(&repo, place_dto("Bar B", 40.001, -73.001)).await.unwrap();
        create_one(&repo, place_dto("Far", 45.0, -73.0)).await.unwrap();

        let clusters = cluster(
            &repo,
            ClusterQuery {
                grid_size: Some("0.1".into()),
            },
        )
        .await
        .unwrap();

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].count, 2);
        assert_eq!(clusters[1].count, 1);
    }
}
