use std::sync::Arc;

use sqlx::PgPool;
use url::Url;

use super::{
    database::{
        place::PgPlaceRepository, token::PgTokenBlacklistRepository, user::PgUserRepository,
    },
    service::{
        mail::Mailer,
        security::{Argon2HashService, JWTEncryptionService},
    },
};
use crate::{
    config::env_var::EnvVar, domain::datatype::security::TokenLifetimes, error::UnknownError,
};

/// Repositories and services shared by every controller, built once at start-up.
pub struct AppContext {
    pub users: PgUserRepository,
    pub places: PgPlaceRepository,
    pub blacklist: PgTokenBlacklistRepository,
    pub hasher: Argon2HashService,
    pub encrypter: JWTEncryptionService,
    pub mailer: Mailer,
    pub lifetimes: TokenLifetimes,
    pub frontend_url: Url,
}

impl AppContext {
    pub fn new(pool: PgPool, env: &EnvVar) -> Result<Arc<Self>, UnknownError> {
        Ok(Arc::new(Self {
            users: PgUserRepository::new(pool.clone()),
            places: PgPlaceRepository::new(pool.clone()),
            blacklist: PgTokenBlacklistRepository::new(pool),
            hasher: Argon2HashService::new(),
            encrypter: JWTEncryptionService::new(env.jwt_secret_key.clone()),
            mailer: Mailer::from_config(&env.mail)?,
            lifetimes: TokenLifetimes {
                access: env.access_token_lifetime,
                refresh: env.refresh_token_lifetime,
                password_reset: env.password_reset_timeout,
            },
            frontend_url: env.frontend_url.clone(),
        }))
    }
}
