use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    base::ResourceID,
    error::resource::{ValidationErrorKind, ValidationFieldError},
};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum PasswordHashAlgorithm {
    #[display(fmt = "argon2d")]
    Argon2d,
    #[display(fmt = "argon2i")]
    Argon2i,
    #[display(fmt = "argon2id")]
    Argon2id,
    #[display(fmt = "2b")]
    Bcrypt,
}

impl ResourceID for PasswordHashAlgorithm {
    fn resource_id() -> &'static str {
        "base::password_hash_algorithm"
    }
}

impl FromStr for PasswordHashAlgorithm {
    type Err = ValidationFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2b" | "2a" => Ok(Self::Bcrypt),
            "argon2d" => Ok(Self::Argon2d),
            "argon2i" => Ok(Self::Argon2i),
            "argon2id" => Ok(Self::Argon2id),
            _ => Err(ValidationFieldError::from_resource::<Self>(
                s.into(),
                String::new(),
                vec![ValidationErrorKind::UnknownVariant],
            )),
        }
    }
}

/// Password hash.
///
/// A validated PHC string as described in the [PHC string format specification][1]:
///
/// ```text
/// $<id>[$v=<version>][$<param>=<value>(,<param>=<value>)*][$<salt>[$<hash>]]
/// ```
///
/// [1]: https://github.com/P-H-C/phc-string-format/blob/master/phc-sf-spec.md#specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    algorithm: PasswordHashAlgorithm,
    phc: String,
}

impl PasswordHash {
    pub fn algorithm(&self) -> PasswordHashAlgorithm {
        self.algorithm
    }

    pub fn as_str(&self) -> &str {
        &self.phc
    }

    /// Digest of the stored hash, changes whenever the password does.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.phc.as_bytes());
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

impl ResourceID for PasswordHash {
    fn resource_id() -> &'static str {
        "base::password_hash"
    }
}

impl FromStr for PasswordHash {
    type Err = ValidationFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hash = password_hash::PasswordHash::new(s).map_err(|_| {
            Self::Err::from_resource::<Self>(
                s.into(),
                String::new(),
                vec![ValidationErrorKind::Invalid],
            )
        })?;

        Ok(Self {
            algorithm: hash.algorithm.as_str().parse()?,
            phc: s.into(),
        })
    }
}

impl std::fmt::Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.phc)
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum PasswordHashError {
    /// Unsupported Algorithm.
    UnsupportedAlgorithm,

    /// Invalid password.
    InvalidPassword,

    /// Invalid password hash.
    InvalidPasswordHash,

    /// Cryptographic error.
    Cryptographic,

    /// Error in the hasher configuration.
    Config,

    Unknown,
}

impl std::error::Error for PasswordHashError {}

impl From<password_hash::Error> for PasswordHashError {
    fn from(err: password_hash::Error) -> Self {
        match err {
            password_hash::Error::Algorithm => Self::UnsupportedAlgorithm,
            password_hash::Error::B64Encoding(_) => Self::InvalidPasswordHash,
            password_hash::Error::Crypto => Self::Cryptographic,
            password_hash::Error::OutputTooShort => Self::Cryptographic,
            password_hash::Error::OutputTooLong => Self::Cryptographic,
            password_hash::Error::ParamNameDuplicated => Self::Config,
            password_hash::Error::ParamNameInvalid => Self::Config,
            password_hash::Error::ParamValueInvalid(_) => Self::Config,
            password_hash::Error::ParamsMaxExceeded => Self::Config,
            password_hash::Error::Password => Self::InvalidPassword,
            password_hash::Error::PhcStringInvalid => Self::InvalidPasswordHash,
            password_hash::Error::PhcStringTooShort => Self::InvalidPasswordHash,
            password_hash::Error::PhcStringTooLong => Self::InvalidPasswordHash,
            password_hash::Error::SaltInvalid(_) => Self::Config,
            password_hash::Error::Version => Self::UnsupportedAlgorithm,
            _ => Self::Unknown,
        }
    }
}

pub struct TokenIssuer;

impl TokenIssuer {
    pub const fn as_str() -> &'static str {
        "places_backend"
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    #[display(fmt = "access")]
    Access,
    #[display(fmt = "refresh")]
    Refresh,
    #[display(fmt = "password_reset")]
    PasswordReset,
}

/// JWT claims, `sub` is the user uuid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload<T> {
    pub iss: String,
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
    pub kind: TokenKind,
    pub data: T,
}

impl<T> TokenPayload<T> {
    pub fn new(kind: TokenKind, lifetime: Duration, sub: Uuid, data: T) -> Self {
        let now = Utc::now();
        Self {
            iss: TokenIssuer::as_str().into(),
            sub,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            jti: Uuid::new_v4(),
            kind,
            data,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Claims carried by a password reset token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetClaims {
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
pub struct Token<T> {
    pub token: String,
    pub payload: TokenPayload<T>,
}

impl<T> From<Token<T>> for String {
    fn from(token: Token<T>) -> Self {
        token.token
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum TokenEncryptionError {
    #[display(fmt = "token expired")]
    Expired,
    #[display(fmt = "invalid token signature")]
    InvalidSignature,
    #[display(fmt = "malformed token")]
    Malformed,
    #[display(fmt = "unexpected token kind")]
    UnexpectedKind,
    #[display(fmt = "token could not be issued")]
    Issuing,
}

impl std::error::Error for TokenEncryptionError {}

impl From<jsonwebtoken::errors::Error> for TokenEncryptionError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            ErrorKind::InvalidKeyFormat | ErrorKind::InvalidRsaKey(_) => Self::Issuing,
            _ => Self::Malformed,
        }
    }
}

/// Lifetimes of the issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
    pub password_reset: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::minutes(5),
            refresh: Duration::days(1),
            password_reset: Duration::minutes(60),
        }
    }
}
