use chrono::{DateTime, Utc};

use crate::domain::datatype::security::PasswordHash;

use super::{impl_entity, state_ref, EntityData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserState {
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password_hash: PasswordHash,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) is_staff: bool,
    pub(crate) is_superuser: bool,
    pub(crate) is_active: bool,
    pub(crate) last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub(crate) data: EntityData,
    pub(crate) state: UserState,
}

impl_entity!(User, UserState);

impl User {
    state_ref!(username, String);
    state_ref!(email, String);
    state_ref!(password_hash, PasswordHash);
    state_ref!(first_name, String);
    state_ref!(last_name, String);
    state_ref!(is_staff, bool, copy);
    state_ref!(is_superuser, bool, copy);
    state_ref!(is_active, bool, copy);
    state_ref!(last_login, Option<DateTime<Utc>>, copy);

    /// Same as `created`, named after the account lifecycle.
    pub fn date_joined(&self) -> DateTime<Utc> {
        self.data.created
    }
}
