use derive_more::Display;
use salvo::{prelude::StatusError, writer::Json, Piece, Response};

use self::http::ErrorResponse;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Display)]
pub struct UnknownError(BoxedError);

impl std::error::Error for UnknownError {}

impl UnknownError {
    pub fn new(err: BoxedError) -> Self {
        Self(err)
    }
}

impl From<BoxedError> for UnknownError {
    fn from(err: BoxedError) -> Self {
        Self::new(err)
    }
}

#[derive(Debug, Display)]
struct StrError(pub Box<str>);

impl std::error::Error for StrError {}

impl<'a> From<&'a str> for UnknownError {
    fn from(err: &'a str) -> Self {
        UnknownError(Box::new(StrError(Box::from(err))))
    }
}

impl From<String> for UnknownError {
    fn from(err: String) -> Self {
        UnknownError(Box::new(StrError(err.into_boxed_str())))
    }
}

impl From<sqlx::error::Error> for UnknownError {
    fn from(err: sqlx::error::Error) -> Self {
        Self::new(err.into())
    }
}

impl Piece for UnknownError {
    fn render(self, res: &mut Response) {
        tracing::error!("unknown error: {self}");
        let status = StatusError::internal_server_error();
        res.render(Json(ErrorResponse::from_status_error(&status, ())));
        res.set_status_error(status);
    }
}

pub mod app {
    use derive_more::Display;
    use salvo::{prelude::StatusError, writer::Json, Piece};
    use serde::Serialize;

    use super::{
        http::ErrorResponse,
        persistence::PersistenceError,
        resource::{NotFoundError, ValidationError},
        security::{AuthenticationError, ForbiddenError, UnauthorizedError},
        service::ServiceError,
    };

    #[derive(Debug, Display, Serialize)]
    pub enum ApplicationError<R> {
        Authentication(AuthenticationError),
        Unauthorized(UnauthorizedError),
        Forbidden(ForbiddenError),
        Validation(ValidationError<R>),
        NotFound(NotFoundError),
        Persistence(PersistenceError),
        Service(ServiceError),
    }

    impl<R: std::fmt::Debug> std::error::Error for ApplicationError<R> {}

    impl<R> ApplicationError<R> {
        pub fn status_error(&self) -> StatusError {
            match self {
                ApplicationError::Persistence(PersistenceError::Connection(_)) => {
                    StatusError::service_unavailable()
                }
                ApplicationError::Persistence(PersistenceError::UniqueViolation(_)) => {
                    StatusError::conflict()
                }
                ApplicationError::Persistence(_) | ApplicationError::Service(_) => {
                    StatusError::internal_server_error()
                }
                ApplicationError::Validation(_) => StatusError::bad_request(),
                ApplicationError::Authentication(_) => StatusError::bad_request(),
                ApplicationError::Unauthorized(_) => StatusError::unauthorized(),
                ApplicationError::Forbidden(_) => StatusError::forbidden(),
                ApplicationError::NotFound(_) => StatusError::not_found(),
            }
        }

        /// Re-targets a validation error to the resource that was actually received.
        pub fn map_resource<T>(self, resource: impl FnOnce(R) -> T) -> ApplicationError<T>
        where
            T: crate::base::ResourceID,
        {
            match self {
                ApplicationError::Validation(err) => ApplicationError::Validation(
                    ValidationError::from_resource(resource(err.resource), err.fields),
                ),
                ApplicationError::Authentication(err) => ApplicationError::Authentication(err),
                ApplicationError::Unauthorized(err) => ApplicationError::Unauthorized(err),
                ApplicationError::Forbidden(err) => ApplicationError::Forbidden(err),
                ApplicationError::NotFound(err) => ApplicationError::NotFound(err),
                ApplicationError::Persistence(err) => ApplicationError::Persistence(err),
                ApplicationError::Service(err) => ApplicationError::Service(err),
            }
        }
    }

    impl<R> From<AuthenticationError> for ApplicationError<R> {
        fn from(err: AuthenticationError) -> Self {
            Self::Authentication(err)
        }
    }

    impl<R> From<UnauthorizedError> for ApplicationError<R> {
        fn from(err: UnauthorizedError) -> Self {
            Self::Unauthorized(err)
        }
    }

    impl<R> From<ForbiddenError> for ApplicationError<R> {
        fn from(err: ForbiddenError) -> Self {
            Self::Forbidden(err)
        }
    }

    impl<R> From<ValidationError<R>> for ApplicationError<R> {
        fn from(err: ValidationError<R>) -> Self {
            Self::Validation(err)
        }
    }

    impl<R> From<NotFoundError> for ApplicationError<R> {
        fn from(err: NotFoundError) -> Self {
            Self::NotFound(err)
        }
    }

    impl<R> From<PersistenceError> for ApplicationError<R> {
        fn from(err: PersistenceError) -> Self {
            Self::Persistence(err)
        }
    }

    impl<R> From<ServiceError> for ApplicationError<R> {
        fn from(err: ServiceError) -> Self {
            Self::Service(err)
        }
    }

    impl<R: Serialize + Send> Piece for ApplicationError<R> {
        fn render(self, res: &mut salvo::Response) {
            let status = self.status_error();
            match &self {
                ApplicationError::Persistence(err) => tracing::error!("persistence error: {err}"),
                ApplicationError::Service(err) => tracing::error!("service error: {err}"),
                _ => tracing::debug!("request rejected: {self}"),
            }
            res.render(Json(ErrorResponse::from_status_error(&status, self)));
            res.set_status_error(status);
        }
    }
}

pub mod service {
    use derive_more::Display;
    use serde::Serialize;

    use crate::error::UnknownError;

    #[derive(Debug, Display)]
    pub enum DispatchError {
        #[display(fmt = "Dispatched operation timed out in {_0:?}")]
        Timeout(Option<std::time::Duration>),
        #[display(fmt = "IO error dispatching {_0}")]
        IO(std::io::Error),
        #[display(fmt = "Unknown dispatch error {_0}")]
        Unknown(UnknownError),
    }

    impl std::error::Error for DispatchError {}

    /// Failure of an outbound service the application depends on.
    #[derive(Debug, Display)]
    pub enum ServiceError {
        #[display(fmt = "mail delivery failed: {_0}")]
        Mail(UnknownError),
        #[display(fmt = "token signing failed")]
        TokenSigning,
        #[display(fmt = "password hashing failed")]
        PasswordHashing,
    }

    impl std::error::Error for ServiceError {}

    impl Serialize for ServiceError {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            serializer.serialize_none()
        }
    }
}

pub mod persistence {
    use std::io;

    use derive_more::Display;
    use serde::Serialize;

    use super::{service::DispatchError, UnknownError};

    pub type SqlState = String;

    const UNIQUE_VIOLATION: &str = "23505";

    #[derive(Debug, Display)]
    pub enum PersistenceError {
        #[display(fmt = "database persistence error: SQLSTATE {_0:?}")]
        Database(Option<SqlState>),
        #[display(fmt = "unique constraint violated: {_0:?}")]
        UniqueViolation(Option<String>),
        #[display(fmt = "persistence layer connection error: {_0}")]
        Connection(DispatchError),
        #[display(fmt = "unknown field {_0:?} for the queried resource")]
        UnknownField(String),
        #[display(fmt = "PersistenceError data not found")]
        NotFound,
        #[display(fmt = "PersistenceError decoding data")]
        DecodeData,
        #[display(fmt = "PersistenceError data migration")]
        DataMigration,
        #[display(fmt = "unknown persistence error: {_0}")]
        Unknown(UnknownError),
    }

    impl std::error::Error for PersistenceError {}

    impl PersistenceError {
        /// Name of the violated unique constraint, when this is a unique violation.
        pub fn violated_constraint(&self) -> Option<&str> {
            match self {
                PersistenceError::UniqueViolation(constraint) => constraint.as_deref(),
                _ => None,
            }
        }
    }

    impl Serialize for PersistenceError {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            serializer.serialize_none()
        }
    }

    type SqlxError = sqlx::error::Error;

    impl From<SqlxError> for PersistenceError {
        fn from(err: SqlxError) -> Self {
            match err {
                SqlxError::Configuration(_) => {
                    Self::Connection(DispatchError::IO(io::ErrorKind::InvalidInput.into()))
                }
                SqlxError::Database(db) => {
                    let code = db.code().map(|code| code.to_string());
                    if code.as_deref() == Some(UNIQUE_VIOLATION) {
                        let constraint = db
                            .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                            .and_then(|pg| pg.constraint())
                            .map(String::from);
                        return Self::UniqueViolation(constraint);
                    }
                    Self::Database(code)
                }
                SqlxError::Io(io) => Self::Connection(DispatchError::IO(io)),
                SqlxError::Tls(_) => {
                    Self::Connection(DispatchError::IO(io::ErrorKind::ConnectionRefused.into()))
                }
                SqlxError::Protocol(msg) => Self::Connection(DispatchError::IO(io::Error::new(
                    io::ErrorKind::InvalidData,
                    msg,
                ))),
                SqlxError::RowNotFound => Self::NotFound,
                SqlxError::TypeNotFound { .. } => Self::DecodeData,
                SqlxError::ColumnIndexOutOfBounds { .. } => Self::DecodeData,
                SqlxError::ColumnNotFound(_) => Self::DecodeData,
                SqlxError::ColumnDecode { .. } => Self::DecodeData,
                SqlxError::Decode(_) => Self::DecodeData,
                SqlxError::PoolTimedOut => Self::Connection(DispatchError::Timeout(None)),
                SqlxError::PoolClosed => {
                    Self::Connection(DispatchError::IO(io::ErrorKind::NotConnected.into()))
                }
                SqlxError::WorkerCrashed => {
                    tracing::error!("sqlx background worker crashed");
                    Self::Connection(DispatchError::Unknown("sqlx worker crashed".into()))
                }
                SqlxError::Migrate(_) => Self::DataMigration,
                _ => PersistenceError::Unknown(err.into()),
            }
        }
    }
}

pub mod resource {
    use derive_more::{Display, Error};
    use serde::{Deserialize, Serialize};

    use crate::base::ResourceID;

    #[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ValidationErrorKind {
        /// When a required property is missing.
        Required,

        /// Maximum inclusive string length.
        MaxLength(u64),
        /// Minimum inclusive string length.
        MinLength(u64),
        /// When the input doesn't match to a pattern.
        Pattern(String),

        /// Minimum inclusive number of items in an array exceeded.
        MinItems(u64),

        /// Value outside of the described inclusive range.
        #[display(fmt = "Validation error kind: range {_0}")]
        Range(String),
        /// When some number is not positive.
        Positive,
        /// When a lower bound is not strictly less than its upper bound.
        #[display(fmt = "Validation error kind: less_than {_0}")]
        LessThan(String),

        /// The input value doesn't match any of specified options.
        UnknownVariant,
        /// The input value doesn't match one or multiple required types.
        InvalidType,
        /// Duplicated input value.
        Duplicated,
        /// Input value already exists.
        AlreadyExists,
        /// Generic kind.
        Invalid,
    }

    impl std::error::Error for ValidationErrorKind {}

    #[derive(Debug, Error, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ValidationError<R> {
        /// Resource value
        pub resource: R,
        /// Name of the resource
        pub resource_type: &'static str,
        /// Invalid resource fields
        pub fields: Vec<ValidationFieldError>,
    }

    impl<R> ValidationError<R> {
        pub fn from_resource(resource: R, fields: Vec<ValidationFieldError>) -> Self
        where
            R: ResourceID,
        {
            Self {
                resource,
                resource_type: R::resource_id(),
                fields,
            }
        }
    }

    impl<R> std::fmt::Display for ValidationError<R> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_fmt(format_args!(
                "Invalid resource {}, fields {:?}",
                self.resource_type, self.fields
            ))
        }
    }

    #[derive(Debug, Display, Error, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[display(fmt = "{path}: {value:?}, {kinds:?}")]
    pub struct ValidationFieldError {
        /// Resource field path with invalid value
        pub path: String,
        /// Displayed invalid value
        pub value: String,
        /// Value type id
        pub type_id: &'static str,
        /// Kinds of validation errors
        pub kinds: Vec<ValidationErrorKind>,
    }

    impl ValidationFieldError {
        pub fn from_resource<T>(
            value: String,
            path: String,
            kinds: Vec<ValidationErrorKind>,
        ) -> Self
        where
            T: ResourceID,
        {
            Self {
                path,
                type_id: T::resource_id(),
                value,
                kinds,
            }
        }

        pub fn new(
            type_id: &'static str,
            value: String,
            path: String,
            kinds: Vec<ValidationErrorKind>,
        ) -> Self {
            Self {
                path,
                type_id,
                value,
                kinds,
            }
        }

        pub fn has_kind(&self, kind: &ValidationErrorKind) -> bool {
            self.kinds.contains(kind)
        }
    }

    /// A lookup key that does not resolve to any stored resource.
    #[derive(Debug, Display, Clone, Error, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[display(fmt = "Resource {resource_type} not found by {key}")]
    pub struct NotFoundError {
        /// Name of the resource
        pub resource_type: &'static str,
        /// Lookup key used to search the resource
        pub key: String,
    }

    impl NotFoundError {
        pub fn of<R: ResourceID>(key: impl ToString) -> Self {
            Self {
                resource_type: R::resource_id(),
                key: key.to_string(),
            }
        }
    }
}

pub mod security {
    use derive_more::Display;
    use serde::Serialize;

    use crate::domain::datatype::security::{PasswordHashError, TokenEncryptionError};

    /// Unauthorized access to a resource.
    ///
    /// The user is unauthorized to access the resource.
    #[derive(Debug, Display, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum UnauthorizedError {
        /// Authentication token is not present.
        #[display(fmt = "token_not_present")]
        TokenNotPresent,

        /// Authentication token is malformatted.
        ///
        /// The token is no formated as the required authentication scheme
        #[display(fmt = "malformatted_token")]
        MalformattedToken,

        /// Authentication token is invalid.
        #[display(fmt = "invalid_token")]
        InvalidToken,

        /// Authentication token has expired.
        #[display(fmt = "expired_token")]
        ExpiredToken,

        /// Token was revoked by a logout.
        #[display(fmt = "blacklisted_token")]
        BlacklistedToken,
    }

    /// Authenticated access that is not allowed to proceed.
    #[derive(Debug, Display, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ForbiddenError {
        /// The token subject was deactivated after the token was issued.
        #[display(fmt = "inactive_account")]
        InactiveAccount,
    }

    #[derive(Debug, Display, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AuthenticationError {
        /// Attempt to authenticate with invalid credentials.
        #[display(fmt = "invalid_credential")]
        InvalidCredential,
    }

    impl From<PasswordHashError> for AuthenticationError {
        fn from(_: PasswordHashError) -> Self {
            Self::InvalidCredential
        }
    }

    impl From<TokenEncryptionError> for UnauthorizedError {
        fn from(err: TokenEncryptionError) -> Self {
            match err {
                TokenEncryptionError::Expired => Self::ExpiredToken,
                _ => Self::InvalidToken,
            }
        }
    }
}

pub mod config {
    use derive_more::Display;

    #[derive(Debug, Display)]
    pub enum ConfigError {
        #[display(fmt = "Missing env var {_0}")]
        Missing(&'static str),
        #[display(fmt = "Invalid {var}: {value:?}")]
        Invalid { var: &'static str, value: String },
    }

    impl std::error::Error for ConfigError {}
}

pub mod http {
    use derive_more::{Display, Error};
    use salvo::{http::ParseError, prelude::StatusError, writer::Json, Piece, Response};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Display, Clone, Error, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum BadRequest {
        InvalidContent,
    }

    #[derive(Debug, Display, Clone, Error, Serialize, Deserialize)]
    #[display(fmt = "Response error: {title}, {message}")]
    pub struct ErrorResponse<T> {
        pub title: String,
        pub message: String,
        pub error: T,
    }

    impl<T> ErrorResponse<T> {
        pub fn from_status_error(status: &StatusError, err: T) -> Self {
            Self {
                title: status.name.clone(),
                message: status
                    .summary
                    .clone()
                    .unwrap_or_else(|| status.name.clone()),
                error: err,
            }
        }
    }

    impl From<ParseError> for BadRequest {
        fn from(err: ParseError) -> Self {
            tracing::debug!("unable to parse request: {err}");
            BadRequest::InvalidContent
        }
    }

    impl Piece for BadRequest {
        fn render(self, res: &mut Response) {
            let status = StatusError::bad_request();
            res.render(Json(ErrorResponse::from_status_error(&status, self)));
            res.set_status_error(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use salvo::http::StatusCode;

    use super::{
        app::ApplicationError,
        persistence::PersistenceError,
        resource::{NotFoundError, ValidationError},
        security::{AuthenticationError, ForbiddenError, UnauthorizedError},
        service::{DispatchError, ServiceError},
    };

    fn status_of(err: ApplicationError<()>) -> StatusCode {
        err.status_error().code
    }

    #[test]
    fn maps_error_taxonomy_to_http_status() {
        assert_eq!(
            status_of(ValidationError::from_resource((), vec![]).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(NotFoundError::of::<i64>(7).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AuthenticationError::InvalidCredential.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(UnauthorizedError::BlacklistedToken.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ForbiddenError::InactiveAccount.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(PersistenceError::UniqueViolation(None).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(PersistenceError::UnknownField("nope".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(PersistenceError::Connection(DispatchError::Timeout(None)).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ServiceError::TokenSigning.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unique_violation_exposes_constraint_name() {
        let err = PersistenceError::UniqueViolation(Some("users_email_key".into()));
        assert_eq!(err.violated_constraint(), Some("users_email_key"));
        assert_eq!(PersistenceError::NotFound.violated_constraint(), None);
    }
}
