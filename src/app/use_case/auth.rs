use chrono::Utc;
use serde::de::IgnoredAny;
use url::Url;

use super::{iam, validation as common};
use crate::{
    app::resource::{
        auth::{
            AccessTokenResponse, ChangePassword, ForgotPassword, LoginCredentials,
            RefreshTokenBody, RefreshTokenResponse, RegisterCredentials, ResetPassword,
            TokenPairResponse, UpdateProfile, VerifyTokenBody,
        },
        iam::{CreateUser, UpdateUser, UserResponse},
    },
    base::ResourceID,
    domain::{
        datatype::security::{
            PasswordResetClaims, Token, TokenEncryptionError, TokenKind, TokenLifetimes,
            TokenPayload,
        },
        entity::{iam::User, Entity},
        repository::{TokenBlacklistRepository, UserLookup, UserRepository},
        service::{MailMessage, MailService, PasswordHashService, TokenEncryptionService},
    },
    error::{
        app::ApplicationError,
        resource::{NotFoundError, ValidationError, ValidationErrorKind, ValidationFieldError},
        security::{AuthenticationError, ForbiddenError, UnauthorizedError},
        service::ServiceError,
    },
};

fn issue<T, TS>(
    encrypter: &TS,
    kind: TokenKind,
    lifetime: chrono::Duration,
    user: uuid::Uuid,
    data: T,
) -> Result<String, ServiceError>
where
    T: serde::Serialize,
    TS: TokenEncryptionService,
{
    Token::new(TokenPayload::new(kind, lifetime, user, data), encrypter)
        .map(String::from)
        .map_err(|err| {
            tracing::error!("unable to issue {kind} token: {err}");
            ServiceError::TokenSigning
        })
}

fn token_pair<TS: TokenEncryptionService>(
    encrypter: &TS,
    lifetimes: &TokenLifetimes,
    user: uuid::Uuid,
) -> Result<TokenPairResponse, ServiceError> {
    Ok(TokenPairResponse {
        access_token: issue(encrypter, TokenKind::Access, lifetimes.access, user, ())?,
        refresh_token: issue(encrypter, TokenKind::Refresh, lifetimes.refresh, user, ())?,
    })
}

/// Verifies signature, expiration and the expected token kind.
fn verify_kind<T, TS>(
    encrypter: &TS,
    token: &str,
    kinds: &[TokenKind],
) -> Result<TokenPayload<T>, TokenEncryptionError>
where
    T: serde::de::DeserializeOwned,
    TS: TokenEncryptionService,
{
    let token = Token::<T>::verify(token.to_string(), encrypter)?;
    if !kinds.contains(&token.payload.kind) {
        return Err(TokenEncryptionError::UnexpectedKind);
    }
    Ok(token.payload)
}

fn required_text<'v>(
    value: &'v Option<String>,
    type_id: &'static str,
    path: &str,
    errors: &mut Vec<ValidationFieldError>,
) -> &'v str {
    match value.as_deref() {
        Some(value) if !value.is_empty() => value,
        _ => {
            errors.push(common::required(type_id, path));
            ""
        }
    }
}

fn invalid(path: &str) -> ValidationFieldError {
    common::field_error("base::token", "", path, vec![ValidationErrorKind::Invalid])
}

fn reject<R: ResourceID>(resource: R, errors: Vec<ValidationFieldError>) -> ApplicationError<R> {
    ValidationError::from_resource(resource, errors).into()
}

/// Resolves username and password into an active user.
async fn check_credentials<UR, HS>(
    users: &UR,
    hasher: &HS,
    dto: &LoginCredentials,
) -> Result<User, ApplicationError<LoginCredentials>>
where
    UR: UserRepository,
    HS: PasswordHashService,
{
    let mut errors = Vec::new();
    let username = required_text(&dto.username, "base::username", "/username", &mut errors);
    let password = required_text(&dto.password, "base::password", "/password", &mut errors);
    if !errors.is_empty() {
        return Err(reject(dto.clone(), errors));
    }

    let lookup = UserLookup {
        username: Some(username.to_string()),
        ..Default::default()
    };
    let Some(user) = users.find_one(&lookup).await? else {
        // One hash keeps unknown usernames as slow as a wrong password.
        let _ = hasher.hash_password(password);
        return Err(AuthenticationError::InvalidCredential.into());
    };

    hasher
        .verify_password(password, user.password_hash())
        .map_err(AuthenticationError::from)?;

    if !user.is_active() {
        tracing::debug!(user_id = user.id(), "inactive user attempted to authenticate");
        return Err(AuthenticationError::InvalidCredential.into());
    }
    Ok(user)
}

pub async fn login_credentials<UR, HS, TS>(
    users: &UR,
    hasher: &HS,
    encrypter: &TS,
    lifetimes: &TokenLifetimes,
    dto: LoginCredentials,
) -> Result<TokenPairResponse, ApplicationError<LoginCredentials>>
where
    UR: UserRepository,
    HS: PasswordHashService,
    TS: TokenEncryptionService,
{
    let user = check_credentials(users, hasher, &dto).await?;
    users.record_login(user.id(), Utc::now()).await?;

    tracing::info!(user_id = user.id(), "user logged in");
    Ok(token_pair(encrypter, lifetimes, user.uuid())?)
}

pub async fn register_credentials<UR, HS, TS>(
    users: &UR,
    hasher: &HS,
    encrypter: &TS,
    lifetimes: &TokenLifetimes,
    dto: RegisterCredentials,
) -> Result<TokenPairResponse, ApplicationError<RegisterCredentials>>
where
    UR: UserRepository,
    HS: PasswordHashService,
    TS: TokenEncryptionService,
{
    let create = CreateUser {
        username: dto.username.clone(),
        email: dto.email.clone(),
        password: dto.password.clone(),
        ..Default::default()
    };
    let user = iam::create_one(users, hasher, create)
        .await
        .map_err(|err| err.map_resource(|_| dto.clone()))?;

    Ok(token_pair(encrypter, lifetimes, user.uuid)?)
}

pub async fn logout<BR, TS>(
    blacklist: &BR,
    encrypter: &TS,
    dto: RefreshTokenBody,
) -> Result<(), ApplicationError<RefreshTokenBody>>
where
    BR: TokenBlacklistRepository,
    TS: TokenEncryptionService,
{
    let mut errors = Vec::new();
    let token = required_text(&dto.refresh_token, "base::token", "/refresh_token", &mut errors);
    if !errors.is_empty() {
        return Err(reject(dto, errors));
    }

    let payload = match verify_kind::<(), _>(encrypter, token, &[TokenKind::Refresh]) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!("logout with unusable refresh token: {err}");
            return Err(reject(dto, vec![invalid("/refresh_token")]));
        }
    };

    blacklist.insert(token, payload.expires_at()).await?;
    tracing::info!(user = %payload.sub, "refresh token blacklisted");
    Ok(())
}

pub async fn access_token<UR, BR, TS>(
    users: &UR,
    blacklist: &BR,
    encrypter: &TS,
    lifetimes: &TokenLifetimes,
    dto: RefreshTokenBody,
) -> Result<AccessTokenResponse, ApplicationError<RefreshTokenBody>>
where
    UR: UserRepository,
    BR: TokenBlacklistRepository,
    TS: TokenEncryptionService,
{
    let mut errors = Vec::new();
    let token = required_text(&dto.refresh_token, "base::token", "/refresh_token", &mut errors);
    if !errors.is_empty() {
        return Err(reject(dto, errors));
    }

    let payload = verify_kind::<(), _>(encrypter, token, &[TokenKind::Refresh])
        .map_err(UnauthorizedError::from)?;

    if blacklist.is_blacklisted(token, Utc::now()).await? {
        return Err(UnauthorizedError::BlacklistedToken.into());
    }

    let user = iam::find_by_uuid(users, payload.sub)
        .await?
        .ok_or(UnauthorizedError::InvalidToken)?;
    if !user.is_active() {
        return Err(ForbiddenError::InactiveAccount.into());
    }

    Ok(AccessTokenResponse {
        access_token: issue(encrypter, TokenKind::Access, lifetimes.access, payload.sub, ())?,
    })
}

pub async fn refresh_token<UR, HS, TS>(
    users: &UR,
    hasher: &HS,
    encrypter: &TS,
    lifetimes: &TokenLifetimes,
    dto: LoginCredentials,
) -> Result<RefreshTokenResponse, ApplicationError<LoginCredentials>>
where
    UR: UserRepository,
    HS: PasswordHashService,
    TS: TokenEncryptionService,
{
    let user = check_credentials(users, hasher, &dto).await?;
    Ok(RefreshTokenResponse {
        refresh_token: issue(encrypter, TokenKind::Refresh, lifetimes.refresh, user.uuid(), ())?,
    })
}

pub fn verify_token<TS: TokenEncryptionService>(
    encrypter: &TS,
    dto: VerifyTokenBody,
) -> Result<(), ApplicationError<VerifyTokenBody>> {
    let mut errors = Vec::new();
    let token = required_text(&dto.token, "base::token", "/token", &mut errors);
    if !errors.is_empty() {
        return Err(reject(dto, errors));
    }

    verify_kind::<IgnoredAny, _>(encrypter, token, &[TokenKind::Access, TokenKind::Refresh])
        .map_err(UnauthorizedError::from)?;
    Ok(())
}

/// Resolves a bearer access token into the session user.
pub async fn authenticate<UR, TS>(
    users: &UR,
    encrypter: &TS,
    token: &str,
) -> Result<User, ApplicationError<()>>
where
    UR: UserRepository,
    TS: TokenEncryptionService,
{
    let payload = verify_kind::<(), _>(encrypter, token, &[TokenKind::Access])
        .map_err(UnauthorizedError::from)?;

    let user = iam::find_by_uuid(users, payload.sub)
        .await?
        .ok_or(UnauthorizedError::InvalidToken)?;
    if !user.is_active() {
        return Err(ForbiddenError::InactiveAccount.into());
    }
    Ok(user)
}

pub async fn change_password<UR, HS>(
    users: &UR,
    hasher: &HS,
    user: &User,
    dto: ChangePassword,
) -> Result<(), ApplicationError<ChangePassword>>
where
    UR: UserRepository,
    HS: PasswordHashService,
{
    let mut errors = Vec::new();
    let current = required_text(&dto.current_password, "base::password", "/current_password", &mut errors);
    let new_password = dto.new_password.as_deref().unwrap_or_default();
    common::check_password(new_password, "/new_password", &mut errors);
    if !errors.is_empty() {
        return Err(reject(dto, errors));
    }

    if hasher.verify_password(current, user.password_hash()).is_err() {
        let field = common::field_error(
            "base::password",
            "",
            "/current_password",
            vec![ValidationErrorKind::Invalid],
        );
        return Err(reject(dto, vec![field]));
    }

    let hash = hasher
        .hash_password(new_password)
        .map_err(|_| ServiceError::PasswordHashing)?;
    if !users.set_password(user.id(), &hash).await? {
        return Err(NotFoundError::of::<UserResponse>(user.id()).into());
    }

    tracing::info!(user_id = user.id(), "password changed");
    Ok(())
}

/// Link sent by e-mail, `{frontend}/reset-password?token=...`.
pub fn reset_link(frontend_url: &Url, token: &str) -> Url {
    let mut link = frontend_url.clone();
    let path = format!("{}/reset-password", frontend_url.path().trim_end_matches('/'));
    link.set_path(&path);
    link.set_query(None);
    link.query_pairs_mut().append_pair("token", token);
    link
}

pub async fn forgot_password<UR, TS, MS>(
    users: &UR,
    encrypter: &TS,
    mailer: &MS,
    lifetimes: &TokenLifetimes,
    frontend_url: &Url,
    dto: ForgotPassword,
) -> Result<(), ApplicationError<ForgotPassword>>
where
    UR: UserRepository,
    TS: TokenEncryptionService,
    MS: MailService,
{
    let mut errors = Vec::new();
    let email = dto.email.clone().unwrap_or_default();
    common::check_email(&email, "/email", &mut errors);
    if !errors.is_empty() {
        return Err(reject(dto, errors));
    }

    let lookup = UserLookup {
        email: Some(email.clone()),
        ..Default::default()
    };
    let user = match users.find_one(&lookup).await? {
        Some(user) if user.is_active() => user,
        _ => return Err(NotFoundError::of::<UserResponse>(email).into()),
    };

    let claims = PasswordResetClaims {
        fingerprint: user.password_hash().fingerprint(),
    };
    let token = issue(
        encrypter,
        TokenKind::PasswordReset,
        lifetimes.password_reset,
        user.uuid(),
        claims,
    )?;

    let link = reset_link(frontend_url, &token);
    let message = MailMessage {
        to: user.email().clone(),
        subject: "Password reset".into(),
        body: format!(
            "Hello {},\n\nUse the link below to choose a new password:\n\n{link}\n\n\
             If you did not request a password reset, ignore this message.\n",
            user.username()
        ),
    };
    mailer.send(message).await.map_err(ServiceError::Mail)?;

    tracing::info!(user_id = user.id(), "password reset requested");
    Ok(())
}

pub async fn reset_password<UR, HS, TS>(
    users: &UR,
    hasher: &HS,
    encrypter: &TS,
    dto: ResetPassword,
) -> Result<(), ApplicationError<ResetPassword>>
where
    UR: UserRepository,
    HS: PasswordHashService,
    TS: TokenEncryptionService,
{
    let mut errors = Vec::new();
    let token = required_text(&dto.token, "base::token", "/token", &mut errors);
    let new_password = dto.new_password.as_deref().unwrap_or_default();
    common::check_password(new_password, "/new_password", &mut errors);
    if !errors.is_empty() {
        return Err(reject(dto, errors));
    }

    let payload = match verify_kind::<PasswordResetClaims, _>(
        encrypter,
        token,
        &[TokenKind::PasswordReset],
    ) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!("password reset with unusable token: {err}");
            return Err(reject(dto, vec![invalid("/token")]));
        }
    };

    let user = match iam::find_by_uuid(users, payload.sub).await? {
        Some(user)
            if user.is_active()
                && user.password_hash().fingerprint() == payload.data.fingerprint =>
        {
            user
        }
        _ => return Err(reject(dto, vec![invalid("/token")])),
    };

    let hash = hasher
        .hash_password(new_password)
        .map_err(|_| ServiceError::PasswordHashing)?;
    if !users.set_password(user.id(), &hash).await? {
        return Err(reject(dto, vec![invalid("/token")]));
    }

    tracing::info!(user_id = user.id(), "password reset");
    Ok(())
}

pub fn user_details(user: User) -> UserResponse {
    user.into()
}

pub async fn update_profile<UR: UserRepository>(
    users: &UR,
    user: &User,
    dto: UpdateProfile,
) -> Result<UserResponse, ApplicationError<UpdateProfile>> {
    let update = UpdateUser {
        id: Some(user.id()),
        username: dto.username.clone(),
        email: dto.email.clone(),
        first_name: dto.first_name.clone(),
        last_name: dto.last_name.clone(),
        ..Default::default()
    };
    iam::update_one(users, update)
        .await
        .map_err(|err| err.map_resource(|_| dto.clone()))
}
