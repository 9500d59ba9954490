pub mod place;
pub mod token;
pub mod user;

pub mod connection {
    use std::time::Duration;

    use sqlx::{postgres::PgPoolOptions, PgPool};

    use crate::{config::env_var::EnvVar, error::persistence::PersistenceError};

    pub async fn create_sqlx_pool(env: &EnvVar) -> Result<PgPool, PersistenceError> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(env.database_max_connections)
            .acquire_timeout(Duration::from_millis(1000 * 5))
            .idle_timeout(Duration::from_millis(1000 * 30))
            .max_lifetime(Duration::from_millis(1000 * 60 * 30))
            .connect(&env.database_url)
            .await?;
        Ok(pool)
    }

    /// Applies the embedded migrations, PostGIS must be installable on the server.
    pub async fn migrate(pool: &PgPool) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations").run(pool).await.map_err(|err| {
            tracing::error!("database migration failed: {err}");
            PersistenceError::DataMigration
        })
    }
}

pub mod sql {
    use sqlx::{Database, Encode, Postgres, QueryBuilder, Type};

    use crate::domain::{
        datatype::geo::{GeoPoint, SRID},
        query::{ListInput, SortDir},
    };

    pub fn push_list<'args, I, T, DB>(qb: &mut QueryBuilder<'args, DB>, list: I)
    where
        I: IntoIterator<Item = T>,
        T: 'args + Encode<'args, DB> + Send + Type<DB>,
        DB: Database,
    {
        qb.push("(");
        let mut sep = qb.separated(", ");
        for item in list {
            sep.push_bind(item);
        }
        sep.push_unseparated(")");
    }

    /// `%query%` pattern for ILIKE with `\` as the escape character.
    pub fn contains_pattern(query: &str) -> String {
        let mut pattern = String::with_capacity(query.len() + 2);
        pattern.push('%');
        for ch in query.chars() {
            if matches!(ch, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(ch);
        }
        pattern.push('%');
        pattern
    }

    pub fn push_point(qb: &mut QueryBuilder<'_, Postgres>, point: &GeoPoint) {
        qb.push("ST_SetSRID(ST_MakePoint(")
            .push_bind(point.longitude())
            .push(", ")
            .push_bind(point.latitude())
            .push(format!("), {SRID})::geography"));
    }

    /// `ORDER BY` on a whitelisted column, `id` breaks ties.
    pub fn push_order(qb: &mut QueryBuilder<'_, Postgres>, column: &str, dir: SortDir) {
        qb.push(format!(" ORDER BY {column} {}", dir.as_sql()));
        if column != "id" {
            qb.push(", id ASC");
        }
    }

    pub fn push_window<F>(qb: &mut QueryBuilder<'_, Postgres>, input: &ListInput<F>) {
        qb.push(" LIMIT ")
            .push_bind(input.per_page)
            .push(" OFFSET ")
            .push_bind(input.offset());
    }

    #[cfg(test)]
    mod tests {
        use pretty_assertions::assert_eq;

        use super::*;

        #[test]
        fn escapes_like_wildcards() {
            assert_eq!(contains_pattern("bar"), "%bar%");
            assert_eq!(contains_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
        }

        #[test]
        fn orders_with_id_tiebreaker() {
            let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM places");
            push_order(&mut qb, "name", SortDir::Desc);
            assert_eq!(qb.sql(), "SELECT id FROM places ORDER BY name DESC, id ASC");

            let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM places");
            push_order(&mut qb, "id", SortDir::Asc);
            assert_eq!(qb.sql(), "SELECT id FROM places ORDER BY id ASC");
        }
    }
}
