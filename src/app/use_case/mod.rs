pub mod auth;
pub mod iam;
pub mod place;

use crate::{
    app::resource::base::BulkItem,
    error::app::ApplicationError,
};

/// Folds the result of one bulk element into its report entry.
///
/// Store and service failures abort the remaining elements; elements already
/// applied stay applied.
pub(crate) fn bulk_outcome<T, R>(
    index: usize,
    result: Result<T, ApplicationError<R>>,
) -> Result<BulkItem<T>, ApplicationError<()>> {
    match result {
        Ok(item) => Ok(BulkItem::Ok { index, item }),
        Err(ApplicationError::Persistence(err)) => Err(err.into()),
        Err(ApplicationError::Service(err)) => Err(err.into()),
        Err(ApplicationError::Validation(err)) => Ok(BulkItem::Failed {
            index,
            error: err.to_string(),
            fields: err.fields,
        }),
        Err(err) => Ok(BulkItem::Failed {
            index,
            error: err.to_string(),
            fields: Vec::new(),
        }),
    }
}

pub(crate) mod validation {
    use std::str::FromStr;

    use lazy_static::lazy_static;
    use regex::Regex;

    use crate::{
        app::resource::base::ListQuery,
        domain::query::{ListInput, SortDir},
        error::resource::{ValidationErrorKind, ValidationFieldError},
    };

    pub const USERNAME_MAX_LENGTH: usize = 150;
    pub const NAME_MAX_LENGTH: usize = 150;
    pub const PASSWORD_MIN_LENGTH: usize = 8;
    pub const EMAIL_MAX_LENGTH: usize = 254;

    lazy_static! {
        static ref USERNAME_PATTERN: Regex =
            Regex::new(r"^[A-Za-z0-9_.@+-]+$").expect("Expect a valid username regex");
        static ref EMAIL_PATTERN: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
            .expect("Expect a valid email regex");
    }

    pub fn field_error(
        type_id: &'static str,
        value: impl ToString,
        path: &str,
        kinds: Vec<ValidationErrorKind>,
    ) -> ValidationFieldError {
        ValidationFieldError::new(type_id, value.to_string(), path.into(), kinds)
    }

    pub fn required(type_id: &'static str, path: &str) -> ValidationFieldError {
        field_error(type_id, "", path, vec![ValidationErrorKind::Required])
    }

    /// Parses an optional raw value, recording `invalid_type` on failure.
    pub fn parse_opt<T: FromStr>(
        raw: Option<&str>,
        type_id: &'static str,
        path: &str,
        errors: &mut Vec<ValidationFieldError>,
    ) -> Option<T> {
        let raw = raw?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                errors.push(field_error(
                    type_id,
                    raw,
                    path,
                    vec![ValidationErrorKind::InvalidType],
                ));
                None
            }
        }
    }

    pub fn parse_required<T: FromStr>(
        raw: Option<&str>,
        type_id: &'static str,
        path: &str,
        errors: &mut Vec<ValidationFieldError>,
    ) -> Option<T> {
        if raw.map_or(true, |raw| raw.trim().is_empty()) {
            errors.push(required(type_id, path));
            return None;
        }
        parse_opt(raw, type_id, path, errors)
    }

    pub fn parse_bool(
        raw: Option<&str>,
        path: &str,
        errors: &mut Vec<ValidationFieldError>,
    ) -> Option<bool> {
        let raw = raw?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => {
                errors.push(field_error(
                    "base::bool",
                    raw,
                    path,
                    vec![ValidationErrorKind::InvalidType],
                ));
                None
            }
        }
    }

    /// Comma separated list of ids, at least one.
    pub fn parse_ids(
        raw: Option<&str>,
        path: &str,
        errors: &mut Vec<ValidationFieldError>,
    ) -> Vec<i64> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                errors.push(required("base::ids", path));
                return Vec::new();
            }
        };

        let mut ids = Vec::new();
        for (idx, part) in raw.split(',').enumerate() {
            match part.trim().parse::<i64>() {
                Ok(id) if !ids.contains(&id) => ids.push(id),
                Ok(_) => {}
                Err(_) => errors.push(field_error(
                    "base::i64",
                    part,
                    &format!("{path}/{idx}"),
                    vec![ValidationErrorKind::InvalidType],
                )),
            }
        }
        ids
    }

    pub fn check_ids(ids: &[i64], path: &str, errors: &mut Vec<ValidationFieldError>) {
        if ids.is_empty() {
            errors.push(field_error(
                "base::ids",
                "[]",
                path,
                vec![ValidationErrorKind::MinItems(1)],
            ));
        }
    }

    /// Pagination window and ordering shared by every list query.
    pub fn list_input<Q: ListQuery>(
        query: &Q,
        errors: &mut Vec<ValidationFieldError>,
    ) -> ListInput<()> {
        let params = query.list_params();
        let mut input = ListInput::new(());

        if let Some(page) = parse_opt(params.page, "base::i64", "/page", errors) {
            input.page = page;
        }
        if let Some(per_page) = parse_opt(params.per_page, "base::i64", "/per_page", errors) {
            input.per_page = per_page;
        }
        if let Some(sort) = params.sort.map(str::trim).filter(|s| !s.is_empty()) {
            input.sort = sort.into();
        }
        if let Some(dir) = params.sort_dir {
            match SortDir::from_str(dir) {
                Ok(dir) => input.sort_dir = dir,
                Err(kind) => errors.push(field_error("base::sort_dir", dir, "/sort_dir", vec![kind])),
            }
        }

        input
    }

    pub fn check_username(value: &str, path: &str, errors: &mut Vec<ValidationFieldError>) {
        let mut kinds = Vec::new();
        if value.is_empty() {
            kinds.push(ValidationErrorKind::Required);
        } else if !USERNAME_PATTERN.is_match(value) {
            kinds.push(ValidationErrorKind::Pattern(USERNAME_PATTERN.as_str().into()));
        }
        if value.chars().count() > USERNAME_MAX_LENGTH {
            kinds.push(ValidationErrorKind::MaxLength(USERNAME_MAX_LENGTH as u64));
        }
        if !kinds.is_empty() {
            errors.push(field_error("base::username", value, path, kinds));
        }
    }

    pub fn is_email(value: &str) -> bool {
        value.len() <= EMAIL_MAX_LENGTH && EMAIL_PATTERN.is_match(value)
    }

    pub fn check_email(value: &str, path: &str, errors: &mut Vec<ValidationFieldError>) {
        if value.is_empty() {
            errors.push(required("base::email", path));
        } else if !is_email(value) {
            errors.push(field_error(
                "base::email",
                value,
                path,
                vec![ValidationErrorKind::Pattern(EMAIL_PATTERN.as_str().into())],
            ));
        }
    }

    /// Never echoes the password back.
    pub fn check_password(value: &str, path: &str, errors: &mut Vec<ValidationFieldError>) {
        if value.chars().count() < PASSWORD_MIN_LENGTH {
            errors.push(field_error(
                "base::password",
                "",
                path,
                vec![ValidationErrorKind::MinLength(PASSWORD_MIN_LENGTH as u64)],
            ));
        }
    }

    pub fn check_max_length(
        value: &str,
        max: usize,
        type_id: &'static str,
        path: &str,
        errors: &mut Vec<ValidationFieldError>,
    ) {
        if value.chars().count() > max {
            errors.push(field_error(
                type_id,
                value,
                path,
                vec![ValidationErrorKind::MaxLength(max as u64)],
            ));
        }
    }

}
