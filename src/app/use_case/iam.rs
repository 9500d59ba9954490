use std::collections::BTreeMap;

use uuid::Uuid;

use super::{bulk_outcome, validation as common};
use crate::{
    app::resource::{
        base::{
            BulkItem, ExistsManyResponse, ExistsResponse, IdQuery, IdsQuery, RemoveMany,
            RemoveOne, RemovedResponse,
        },
        iam::{CreateUser, UpdateUser, UserFindOneQuery, UserListQuery, UserResponse, UserSearchQuery},
    },
    base::ResourceID,
    domain::{
        entity::{iam::User, Entity},
        query::ListOutput,
        repository::{NewUser, UserLookup, UserPatch, UserPredicate, UserRepository},
        service::PasswordHashService,
    },
    error::{
        app::ApplicationError,
        persistence::PersistenceError,
        resource::{NotFoundError, ValidationError, ValidationErrorKind, ValidationFieldError},
        service::ServiceError,
    },
};

pub const USERNAME_CONSTRAINT: &str = "users_username_key";
pub const EMAIL_CONSTRAINT: &str = "users_email_key";

pub(crate) mod validation {
    use super::*;
    use crate::domain::{
        query::ListInput,
        repository::{UserFilter, UserSearchField},
    };

    pub fn list_users(
        query: &UserListQuery,
    ) -> Result<ListInput<UserPredicate>, Vec<ValidationFieldError>> {
        let mut errors = Vec::new();
        let input = common::list_input(query, &mut errors);

        let filter = UserFilter {
            uuid: common::parse_opt(query.uuid.as_deref(), "base::uuid", "/uuid", &mut errors),
            username: query.username.clone(),
            email: query.email.clone(),
            first_name: query.first_name.clone(),
            last_name: query.last_name.clone(),
            is_active: common::parse_bool(query.is_active.as_deref(), "/is_active", &mut errors),
            is_staff: common::parse_bool(query.is_staff.as_deref(), "/is_staff", &mut errors),
        };
        if let Some(email) = &filter.email {
            common::check_email(email, "/email", &mut errors);
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let predicate = if filter == UserFilter::default() {
            UserPredicate::All
        } else {
            UserPredicate::Equal(filter)
        };
        Ok(input.with_filter(predicate))
    }

    pub fn search_users(
        query: &UserSearchQuery,
    ) -> Result<ListInput<UserPredicate>, Vec<ValidationFieldError>> {
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
                errors.push(common::required("iam::UserSearchField", "/field"));
                None
            }
            Some(raw) => {
                let field = UserSearchField::ALL.into_iter().find(|f| f.as_str() == raw);
                if field.is_none() {
                    errors.push(common::field_error(
                        "iam::UserSearchField",
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
                Ok(input.with_filter(UserPredicate::Contains { field, query }))
            }
            _ => Err(errors),
        }
    }

    pub fn find_one(query: &UserFindOneQuery) -> Result<UserLookup, Vec<ValidationFieldError>> {
        let mut errors = Vec::new();
        let lookup = UserLookup {
            id: common::parse_opt(query.id.as_deref(), "base::i64", "/id", &mut errors),
            uuid: common::parse_opt(query.uuid.as_deref(), "base::uuid", "/uuid", &mut errors),
            username: query.username.clone(),
            email: query.email.clone(),
        };

        if errors.is_empty() && lookup.is_empty() {
            errors.push(common::field_error(
                "iam::UserFindOneQuery",
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

    pub struct ValidUser {
        pub username: String,
        pub email: String,
        pub password: String,
        pub first_name: String,
        pub last_name: String,
    }

    pub async fn create_user<UR: UserRepository>(
        repo: &UR,
        dto: &CreateUser,
    ) -> Result<ValidUser, ApplicationError<CreateUser>> {
        let mut errors = Vec::new();

        let username = dto.username.clone().unwrap_or_default();
        let email = dto.email.clone().unwrap_or_default();
        let password = dto.password.clone().unwrap_or_default();
        let first_name = dto.first_name.clone().unwrap_or_default();
        let last_name = dto.last_name.clone().unwrap_or_default();

        common::check_username(&username, "/username", &mut errors);
        common::check_email(&email, "/email", &mut errors);
        common::check_password(&password, "/password", &mut errors);
        common::check_max_length(
            &first_name,
            common::NAME_MAX_LENGTH,
            "base::string",
            "/first_name",
            &mut errors,
        );
        common::check_max_length(
            &last_name,
            common::NAME_MAX_LENGTH,
            "base::string",
            "/last_name",
            &mut errors,
        );

        if errors.is_empty() {
            unique_fields(repo, Some(&username), Some(&email), None, &mut errors).await?;
        }

        if !errors.is_empty() {
            return Err(ValidationError::from_resource(dto.clone(), errors).into());
        }

        Ok(ValidUser {
            username,
            email,
            password,
            first_name,
            last_name,
        })
    }

    pub async fn update_user<UR: UserRepository>(
        repo: &UR,
        dto: &UpdateUser,
    ) -> Result<(i64, UserPatch), ApplicationError<UpdateUser>> {
        let mut errors = Vec::new();

        let id = match dto.id {
            Some(id) => id,
            None => {
                errors.push(common::required("base::i64", "/id"));
                0
            }
        };

        if let Some(username) = &dto.username {
            common::check_username(username, "/username", &mut errors);
        }
        if let Some(email) = &dto.email {
            common::check_email(email, "/email", &mut errors);
        }
        for (value, path) in [(&dto.first_name, "/first_name"), (&dto.last_name, "/last_name")] {
            if let Some(value) = value {
                common::check_max_length(
                    value,
                    common::NAME_MAX_LENGTH,
                    "base::string",
                    path,
                    &mut errors,
                );
            }
        }

        if errors.is_empty() {
            unique_fields(
                repo,
                dto.username.as_deref(),
                dto.email.as_deref(),
                Some(id),
                &mut errors,
            )
            .await?;
        }

        if !errors.is_empty() {
            return Err(ValidationError::from_resource(dto.clone(), errors).into());
        }

        Ok((
            id,
            UserPatch {
                username: dto.username.clone(),
                email: dto.email.clone(),
                first_name: dto.first_name.clone(),
                last_name: dto.last_name.clone(),
                is_active: dto.is_active,
                is_staff: dto.is_staff,
            },
        ))
    }

    /// Pre-insert uniqueness check, the store constraint stays authoritative.
    pub async fn unique_fields<UR: UserRepository>(
        repo: &UR,
        username: Option<&str>,
        email: Option<&str>,
        except: Option<i64>,
        errors: &mut Vec<ValidationFieldError>,
    ) -> Result<(), PersistenceError> {
        if let Some(username) = username {
            if repo.username_exists(username, except).await? {
                errors.push(already_exists("base::username", username, "/username"));
            }
        }
        if let Some(email) = email {
            if repo.email_exists(email, except).await? {
                errors.push(already_exists("base::email", email, "/email"));
            }
        }
        Ok(())
    }

    pub fn already_exists(type_id: &'static str, value: &str, path: &str) -> ValidationFieldError {
        common::field_error(type_id, value, path, vec![ValidationErrorKind::AlreadyExists])
    }
}

/// Maps a unique violation raised by the store to the field it guards.
pub(crate) fn unique_violation<R: ResourceID>(
    err: PersistenceError,
    resource: R,
    username: &str,
    email: &str,
) -> ApplicationError<R> {
    let field = match err.violated_constraint() {
        Some(USERNAME_CONSTRAINT) => validation::already_exists("base::username", username, "/username"),
        Some(EMAIL_CONSTRAINT) => validation::already_exists("base::email", email, "/email"),
        _ => return err.into(),
    };
    ValidationError::from_resource(resource, vec![field]).into()
}

fn not_found(key: impl ToString) -> NotFoundError {
    NotFoundError::of::<UserResponse>(key)
}

pub async fn find_all<UR: UserRepository>(
    repo: &UR,
    query: UserListQuery,
) -> Result<ListOutput<UserResponse>, ApplicationError<UserListQuery>> {
    let input = validation::list_users(&query)
        .map_err(|errors| ValidationError::from_resource(query.clone(), errors))?;

    let users = repo.list(&input).await?;
    Ok(users.map(UserResponse::from))
}

pub async fn search<UR: UserRepository>(
    repo: &UR,
    query: UserSearchQuery,
) -> Result<ListOutput<UserResponse>, ApplicationError<UserSearchQuery>> {
    let input = validation::search_users(&query)
        .map_err(|errors| ValidationError::from_resource(query.clone(), errors))?;

    let users = repo.list(&input).await?;
    Ok(users.map(UserResponse::from))
}

pub async fn find_one<UR: UserRepository>(
    repo: &UR,
    query: UserFindOneQuery,
) -> Result<UserResponse, ApplicationError<UserFindOneQuery>> {
    let lookup = validation::find_one(&query)
        .map_err(|errors| ValidationError::from_resource(query.clone(), errors))?;

    let user = repo
        .find_one(&lookup)
        .await?
        .ok_or_else(|| not_found(format!("{lookup:?}")))?;
    Ok(user.into())
}

pub async fn find_by_id<UR: UserRepository>(
    repo: &UR,
    query: IdQuery,
) -> Result<UserResponse, ApplicationError<IdQuery>> {
    let mut errors = Vec::new();
    let id: Option<i64> = common::parse_required(query.id.as_deref(), "base::i64", "/id", &mut errors);
    let id = match id {
        Some(id) if errors.is_empty() => id,
        _ => return Err(ValidationError::from_resource(query, errors).into()),
    };

    let user = repo
        .find_one(&UserLookup::by_id(id))
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(user.into())
}

pub async fn find_by_ids<UR: UserRepository>(
    repo: &UR,
    query: IdsQuery,
) -> Result<Vec<UserResponse>, ApplicationError<IdsQuery>> {
    let mut errors = Vec::new();
    let ids = common::parse_ids(query.ids.as_deref(), "/ids", &mut errors);
    if !errors.is_empty() {
        return Err(ValidationError::from_resource(query, errors).into());
    }

    let users = repo.find_by_ids(&ids).await?;
    Ok(users.into_iter().map(UserResponse::from).collect())
}

pub async fn exists_by_id<UR: UserRepository>(
    repo: &UR,
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

pub async fn exists_by_ids<UR: UserRepository>(
    repo: &UR,
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

/// Validated and hashed user, ready to insert.
async fn prepare_user<UR, HS>(
    repo: &UR,
    hash_service: &HS,
    dto: &CreateUser,
) -> Result<NewUser, ApplicationError<CreateUser>>
where
    UR: UserRepository,
    HS: PasswordHashService,
{
    let valid = validation::create_user(repo, dto).await?;

    let password_hash = hash_service
        .hash_password(&valid.password)
        .map_err(|_| ServiceError::PasswordHashing)?;

    Ok(NewUser {
        username: valid.username,
        email: valid.email,
        password_hash,
        first_name: valid.first_name,
        last_name: valid.last_name,
        is_staff: dto.is_staff.unwrap_or(false),
        is_superuser: dto.is_superuser.unwrap_or(false),
    })
}

pub async fn create_one<UR, HS>(
    repo: &UR,
    hash_service: &HS,
    dto: CreateUser,
) -> Result<UserResponse, ApplicationError<CreateUser>>
where
    UR: UserRepository,
    HS: PasswordHashService,
{
    let new_user = prepare_user(repo, hash_service, &dto).await?;
    let (username, email) = (new_user.username.clone(), new_user.email.clone());

    let user = repo
        .create_one(new_user)
        .await
        .map_err(|err| unique_violation(err, dto, &username, &email))?;

    tracing::info!(user_id = user.id(), "user created");
    Ok(user.into())
}

pub async fn create_many<UR, HS>(
    repo: &UR,
    hash_service: &HS,
    dtos: Vec<CreateUser>,
) -> Result<Vec<BulkItem<UserResponse>>, ApplicationError<()>>
where
    UR: UserRepository,
    HS: PasswordHashService,
{
    require_items(dtos.len())?;

    let mut report = Vec::with_capacity(dtos.len());
    for (index, dto) in dtos.into_iter().enumerate() {
        let result = create_one(repo, hash_service, dto).await;
        report.push(bulk_outcome(index, result)?);
    }
    Ok(report)
}

/// Usernames handled by [`seed_users`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub rejected: Vec<String>,
}

/// Creates the missing users of a seed batch in one transaction.
///
/// Taken usernames are skipped and invalid users are reported; a store
/// failure while inserting leaves none of the batch behind.
pub async fn seed_users<UR, HS>(
    repo: &UR,
    hash_service: &HS,
    dtos: Vec<CreateUser>,
) -> Result<SeedReport, ApplicationError<()>>
where
    UR: UserRepository,
    HS: PasswordHashService,
{
    let mut report = SeedReport::default();
    let mut batch: Vec<NewUser> = Vec::with_capacity(dtos.len());

    for dto in dtos {
        let username = dto.username.clone().unwrap_or_default();
        let lookup = UserLookup {
            username: Some(username.clone()),
            ..Default::default()
        };
        if repo.find_one(&lookup).await?.is_some() {
            tracing::warn!("user already exists: {username}");
            report.existing.push(username);
            continue;
        }

        let duplicated = batch.iter().any(|user| {
            user.username == username || dto.email.as_deref() == Some(user.email.as_str())
        });
        if duplicated {
            tracing::error!("user {username} repeats a username or email of this batch");
            report.rejected.push(username);
            continue;
        }

        match prepare_user(repo, hash_service, &dto).await {
            Ok(user) => batch.push(user),
            Err(ApplicationError::Validation(err)) => {
                tracing::error!("error creating user {username}: {err}");
                report.rejected.push(username);
            }
            Err(err) => return Err(err.map_resource(|_| ())),
        }
    }

    let created = repo.create_all(batch).await?;
    for user in created {
        tracing::info!(user_id = user.id(), "created user: {}", user.username());
        report.created.push(user.username().clone());
    }
    Ok(report)
}

pub async fn update_one<UR: UserRepository>(
    repo: &UR,
    dto: UpdateUser,
) -> Result<UserResponse, ApplicationError<UpdateUser>> {
    let (id, patch) = validation::update_user(repo, &dto).await?;
    let username = patch.username.clone().unwrap_or_default();
    let email = patch.email.clone().unwrap_or_default();

    let user = repo
        .update_one(id, patch)
        .await
        .map_err(|err| unique_violation(err, dto, &username, &email))?
        .ok_or_else(|| not_found(id))?;
    Ok(user.into())
}

pub async fn update_many<UR: UserRepository>(
    repo: &UR,
    dtos: Vec<UpdateUser>,
) -> Result<Vec<BulkItem<UserResponse>>, ApplicationError<()>> {
    require_items(dtos.len())?;

    let mut report = Vec::with_capacity(dtos.len());
    for (index, dto) in dtos.into_iter().enumerate() {
        let result = update_one(repo, dto).await;
        report.push(bulk_outcome(index, result)?);
    }
    Ok(report)
}

pub async fn remove_one<UR: UserRepository>(
    repo: &UR,
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

pub async fn remove_many<UR: UserRepository>(
    repo: &UR,
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

pub(crate) fn require_items(len: usize) -> Result<(), ApplicationError<()>> {
    if len == 0 {
        return Err(ValidationError::from_resource(
            (),
            vec![common::field_error(
                "base::array",
                "[]",
                "",
                vec![ValidationErrorKind::MinItems(1)],
            )],
        )
        .into());
    }
    Ok(())
}

/// Resolves the uuid carried by a token subject.
pub async fn find_by_uuid<UR: UserRepository>(
    repo: &UR,
    uuid: Uuid,
) -> Result<Option<User>, PersistenceError> {
    repo.find_one(&UserLookup {
        uuid: Some(uuid),
        ..Default::default()
    })
    .await
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::infra::memory::{FakeHashService, MemoryUserRepository};

    fn create_dto(username: &str, email: &str) -> CreateUser {
        CreateUser {
            username: Some(username.into()),
            email: Some(email.into()),
            password: Some("secure:12345678".into()),
            first_name: Some("Jane".into()),
            last_name: Some("Doe".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_then_find_by_id_round_trips() {
        let repo = MemoryUserRepository::default();
        let created = create_one(&repo, &FakeHashService, create_dto("jane", "jane@example.com"))
            .await
            .unwrap();

        let found = find_by_id(
            &repo,
            IdQuery {
                id: Some(created.id.to_string()),
            },
        )
        .await
        .unwrap();

        assert_eq!(found.username, "jane");
        assert_eq!(found.email, "jane@example.com");
        assert_eq!(found.first_name, "Jane");
        assert_eq!(found.last_name, "Doe");
        assert!(found.is_active);
        assert!(!found.is_staff);
    }

    #[tokio::test]
    async fn duplicated_username_is_a_field_error() {
        let repo = MemoryUserRepository::default();
        create_one(&repo, &FakeHashService, create_dto("jane", "jane@example.com"))
            .await
            .unwrap();

        let err = create_one(&repo, &FakeHashService, create_dto("jane", "other@example.com"))
            .await
            .unwrap_err();

        match err {
            ApplicationError::Validation(err) => {
                assert_eq!(err.fields.len(), 1);
                assert_eq!(err.fields[0].path, "/username");
                assert!(err.fields[0].has_kind(&ValidationErrorKind::AlreadyExists));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn store_unique_violation_maps_to_field_error() {
        let repo = MemoryUserRepository::default();
        repo.fail_next_insert_with(EMAIL_CONSTRAINT);

        let err = create_one(&repo, &FakeHashService, create_dto("jane", "jane@example.com"))
            .await
            .unwrap_err();

        match err {
            ApplicationError::Validation(err) => assert_eq!(err.fields[0].path, "/email"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_merges_only_given_fields() {
        let repo = MemoryUserRepository::default();
        let created = create_one(&repo, &FakeHashService, create_dto("jane", "jane@example.com"))
            .await
            .unwrap();

        let updated = update_one(
            &repo,
            UpdateUser {
                id: Some(created.id),
                last_name: Some("Roe".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.last_name, "Roe");
        assert_eq!(updated.first_name, "Jane");
        assert_eq!(updated.username, "jane");
    }

    #[tokio::test]
    async fn update_missing_user_is_not_found() {
        let repo = MemoryUserRepository::default();
        let err = update_one(
            &repo,
            UpdateUser {
                id: Some(404),
                first_name: Some("Nobody".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApplicationError::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_twice_yields_not_found() {
        let repo = MemoryUserRepository::default();
        let created = create_one(&repo, &FakeHashService, create_dto("jane", "jane@example.com"))
            .await
            .unwrap();

        remove_one(&repo, RemoveOne { id: Some(created.id) })
            .await
            .unwrap();
        let err = remove_one(&repo, RemoveOne { id: Some(created.id) })
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_many_reports_each_item() {
        let repo = MemoryUserRepository::default();
        let report = create_many(
            &repo,
            &FakeHashService,
            vec![
                create_dto("jane", "jane@example.com"),
                create_dto("jane", "jane2@example.com"),
                create_dto("john", "john@example.com"),
            ],
        )
        .await
        .unwrap();

        let statuses: Vec<_> = report.iter().map(BulkItem::is_ok).collect();
        assert_eq!(statuses, vec![true, false, true]);
        match &report[1] {
            BulkItem::Failed { index, fields, .. } => {
                assert_eq!(*index, 1);
                assert_eq!(fields[0].path, "/username");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exists_by_ids_reports_every_id_once() {
        let repo = MemoryUserRepository::default();
        let created = create_one(&repo, &FakeHashService, create_dto("jane", "jane@example.com"))
            .await
            .unwrap();

        let exists = exists_by_ids(
            &repo,
            IdsQuery {
                ids: Some(format!("{},999,{}", created.id, created.id)),
            },
        )
        .await
        .unwrap();

        assert_eq!(exists.len(), 2);
        assert_eq!(exists[&created.id], true);
        assert_eq!(exists[&999], false);
    }

    #[tokio::test]
    async fn search_requires_known_field() {
        let repo = MemoryUserRepository::default();
        let err = search(
            &repo,
            UserSearchQuery {
                query: Some("ja".into()),
                field: Some("password".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        match err {
            ApplicationError::Validation(err) => {
                assert_eq!(err.fields[0].path, "/field");
                assert!(err.fields[0].has_kind(&ValidationErrorKind::UnknownVariant));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_matches_case_insensitive_substring() {
        let repo = MemoryUserRepository::default();
        create_one(&repo, &FakeHashService, create_dto("jane", "jane@example.com"))
            .await
            .unwrap();
        create_one(&repo, &FakeHashService, create_dto("john", "john@example.com"))
            .await
            .unwrap();

        let found = search(
            &repo,
            UserSearchQuery {
                query: Some("JA".into()),
                field: Some("username".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].username, "jane");
        assert_eq!(found.last_page, 1);
    }

    #[tokio::test]
    async fn find_one_requires_a_key() {
        let repo = MemoryUserRepository::default();
        let err = find_one(&repo, UserFindOneQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Validation(_)));
    }

    async fn username_taken(repo: &MemoryUserRepository, username: &str) -> bool {
        repo.find_one(&UserLookup {
            username: Some(username.into()),
            ..Default::default()
        })
        .await
        .unwrap()
        .is_some()
    }

    #[tokio::test]
    async fn seeding_twice_only_creates_missing_users() {
        let repo = MemoryUserRepository::default();
        let batch = || {
            vec![
                create_dto("admin", "admin@example.com"),
                create_dto("test", "test@example.com"),
            ]
        };

        let first = seed_users(&repo, &FakeHashService, batch()).await.unwrap();
        assert_eq!(first.created, vec!["admin".to_string(), "test".to_string()]);
        assert!(first.existing.is_empty());

        let second = seed_users(&repo, &FakeHashService, batch()).await.unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.existing, vec!["admin".to_string(), "test".to_string()]);
    }

    #[tokio::test]
    async fn failed_seed_insert_leaves_no_users_behind() {
        let repo = MemoryUserRepository::default();
        repo.fail_next_insert_with(USERNAME_CONSTRAINT);

        let err = seed_users(
            &repo,
            &FakeHashService,
            vec![
                create_dto("admin", "admin@example.com"),
                create_dto("user1", "user1@example.com"),
            ],
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::Persistence(PersistenceError::UniqueViolation(_))
        ));
        assert!(!username_taken(&repo, "admin").await);
        assert!(!username_taken(&repo, "user1").await);
    }

    #[tokio::test]
    async fn seed_rejects_invalid_and_repeated_users() {
        let repo = MemoryUserRepository::default();
        let mut invalid = create_dto("broken", "not-an-email");
        invalid.password = Some("short".into());

        let report = seed_users(
            &repo,
            &FakeHashService,
            vec![
                create_dto("user1", "user1@example.com"),
                create_dto("user1", "again@example.com"),
                create_dto("user2", "user1@example.com"),
                invalid,
            ],
        )
        .await
        .unwrap();

        assert_eq!(report.created, vec!["user1".to_string()]);
        assert_eq!(
            report.rejected,
            vec!["user1".to_string(), "user2".to_string(), "broken".to_string()]
        );
        assert!(!username_taken(&repo, "user2").await);
    }
}
