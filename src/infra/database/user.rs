use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::{postgres::PgRow, Executor, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::sql;
use crate::{
    domain::{
        datatype::security::PasswordHash,
        entity::{
            iam::{User, UserState},
            EntityData,
        },
        query::{ListInput, ListOutput},
        repository::{NewUser, UserLookup, UserPatch, UserPredicate, UserRepository},
    },
    error::persistence::PersistenceError,
};

/// Sort fields accepted by user listings, `date_joined` is stored as `created_at`.
pub const USER_SORT_FIELDS: [&str; 12] = [
    "id",
    "uuid",
    "username",
    "email",
    "first_name",
    "last_name",
    "is_active",
    "is_staff",
    "last_login",
    "date_joined",
    "created_at",
    "updated_at",
];

const USER_COLUMNS: &str = "id, uuid, username, email, password_hash, first_name, last_name, \
    is_staff, is_superuser, is_active, last_login, created_at, updated_at";

fn sort_column(sort: &str) -> Result<&'static str, PersistenceError> {
    match USER_SORT_FIELDS.iter().find(|field| **field == sort) {
        Some(&"date_joined") => Ok("created_at"),
        Some(field) => Ok(*field),
        None => Err(PersistenceError::UnknownField(sort.into())),
    }
}

async fn insert_user<'c, E>(executor: E, user: NewUser) -> Result<User, PersistenceError>
where
    E: Executor<'c, Database = Postgres>,
{
    let sql = format!(
        "INSERT INTO users (uuid, username, email, password_hash, first_name, last_name, \
         is_staff, is_superuser) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {USER_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(Uuid::new_v4())
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash.as_str())
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .fetch_one(executor)
        .await?;
    user_from_row(&row)
}

fn user_from_row(row: &PgRow) -> Result<User, PersistenceError> {
    let password_hash: String = row.try_get("password_hash")?;
    let password_hash: PasswordHash = password_hash.parse().map_err(|_| {
        tracing::error!("stored password hash is not a valid PHC string");
        PersistenceError::DecodeData
    })?;

    Ok(User::restore(
        EntityData::restore(
            row.try_get("id")?,
            row.try_get("uuid")?,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ),
        UserState {
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            is_staff: row.try_get("is_staff")?,
            is_superuser: row.try_get("is_superuser")?,
            is_active: row.try_get("is_active")?,
            last_login: row.try_get("last_login")?,
        },
    ))
}

fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &UserPredicate) {
    qb.push(" WHERE TRUE");
    match predicate {
        UserPredicate::All => {}
        UserPredicate::Equal(filter) => {
            if let Some(uuid) = filter.uuid {
                qb.push(" AND uuid = ").push_bind(uuid);
            }
            for (column, value) in [
                ("username", &filter.username),
                ("email", &filter.email),
                ("first_name", &filter.first_name),
                ("last_name", &filter.last_name),
            ] {
                if let Some(value) = value {
                    qb.push(format!(" AND {column} = ")).push_bind(value.clone());
                }
            }
            if let Some(is_active) = filter.is_active {
                qb.push(" AND is_active = ").push_bind(is_active);
            }
            if let Some(is_staff) = filter.is_staff {
                qb.push(" AND is_staff = ").push_bind(is_staff);
            }
        }
        UserPredicate::Contains { field, query } => {
            qb.push(format!(" AND {} ILIKE ", field.as_str()))
                .push_bind(sql::contains_pattern(query))
                .push(" ESCAPE '\\'");
        }
    }
}

async fn fetch_users(
    pool: &PgPool,
    mut qb: QueryBuilder<'_, Postgres>,
) -> Result<Vec<User>, PersistenceError> {
    let mut rows = qb.build().fetch(pool);
    let mut users = Vec::new();
    while let Some(row) = rows.try_next().await? {
        users.push(user_from_row(&row)?);
    }
    Ok(users)
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists_except(
        &self,
        column: &'static str,
        value: &str,
        except: Option<i64>,
    ) -> Result<bool, PersistenceError> {
        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS (SELECT 1 FROM users WHERE {column} = $1 \
             AND ($2::BIGINT IS NULL OR id <> $2))"
        ))
        .bind(value)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn list(
        &self,
        input: &ListInput<UserPredicate>,
    ) -> Result<ListOutput<User>, PersistenceError> {
        let column = sort_column(&input.sort)?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users");
        push_predicate(&mut count, &input.filter);
        let total: i64 = count.build().fetch_one(&self.pool).await?.try_get(0)?;

        if input.is_empty_window() {
            return Ok(ListOutput::new(Vec::new(), total, input));
        }

        let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_predicate(&mut qb, &input.filter);
        sql::push_order(&mut qb, column, input.sort_dir);
        sql::push_window(&mut qb, input);

        let users = fetch_users(&self.pool, qb).await?;
        Ok(ListOutput::new(users, total, input))
    }

    async fn find_one(&self, lookup: &UserLookup) -> Result<Option<User>, PersistenceError> {
        let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE TRUE"));
        if let Some(id) = lookup.id {
            qb.push(" AND id = ").push_bind(id);
        }
        if let Some(uuid) = lookup.uuid {
            qb.push(" AND uuid = ").push_bind(uuid);
        }
        if let Some(username) = &lookup.username {
            qb.push(" AND username = ").push_bind(username.clone());
        }
        if let Some(email) = &lookup.email {
            qb.push(" AND email = ").push_bind(email.clone());
        }
        qb.push(" LIMIT 1");

        let row = qb.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, PersistenceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE id IN "));
        sql::push_list(&mut qb, ids.iter().copied());
        qb.push(" ORDER BY id");
        fetch_users(&self.pool, qb).await
    }

    async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, PersistenceError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let mut qb = QueryBuilder::new("SELECT id FROM users WHERE id IN ");
        sql::push_list(&mut qb, ids.iter().copied());

        let mut rows = qb.build().fetch(&self.pool);
        let mut set = HashSet::new();
        while let Some(row) = rows.try_next().await? {
            set.insert(row.try_get(0)?);
        }
        Ok(set)
    }

    async fn username_exists(
        &self,
        username: &str,
        except: Option<i64>,
    ) -> Result<bool, PersistenceError> {
        self.exists_except("username", username, except).await
    }

    async fn email_exists(
        &self,
        email: &str,
        except: Option<i64>,
    ) -> Result<bool, PersistenceError> {
        self.exists_except("email", email, except).await
    }

    async fn create_one(&self, user: NewUser) -> Result<User, PersistenceError> {
        insert_user(&self.pool, user).await
    }

    async fn create_all(&self, users: Vec<NewUser>) -> Result<Vec<User>, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(users.len());
        for user in users {
            created.push(insert_user(&mut *tx, user).await?);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn update_one(&self, id: i64, patch: UserPatch) -> Result<Option<User>, PersistenceError> {
        let mut qb = QueryBuilder::new("UPDATE users SET updated_at = now()");
        for (column, value) in [
            ("username", patch.username),
            ("email", patch.email),
            ("first_name", patch.first_name),
            ("last_name", patch.last_name),
        ] {
            if let Some(value) = value {
                qb.push(format!(", {column} = ")).push_bind(value);
            }
        }
        if let Some(is_active) = patch.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }
        if let Some(is_staff) = patch.is_staff {
            qb.push(", is_staff = ").push_bind(is_staff);
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {USER_COLUMNS}"));

        let row = qb.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn set_password(&self, id: i64, hash: &PasswordHash) -> Result<bool, PersistenceError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
                .bind(hash.as_str())
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_one(&self, id: i64) -> Result<bool, PersistenceError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_many(&self, ids: &[i64]) -> Result<Vec<i64>, PersistenceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::new("DELETE FROM users WHERE id IN ");
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
