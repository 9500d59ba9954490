pub mod auth;
pub mod iam;
pub mod place;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub trait Entity {
    fn id(&self) -> i64;
    fn uuid(&self) -> Uuid;
    fn created(&self) -> DateTime<Utc>;
    fn updated(&self) -> DateTime<Utc>;
}

/// Data used to restore a entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityData {
    pub(crate) id: i64,
    pub(crate) uuid: Uuid,
    pub(crate) created: DateTime<Utc>,
    pub(crate) updated: DateTime<Utc>,
}

impl EntityData {
    pub fn restore(id: i64, uuid: Uuid, created: DateTime<Utc>, updated: DateTime<Utc>) -> Self {
        Self {
            id,
            uuid,
            created,
            updated,
        }
    }
}

macro_rules! impl_entity {
    ($ent:ty, $state:ty) => {
        impl crate::domain::entity::Entity for $ent {
            fn id(&self) -> i64 {
                self.data.id
            }

            fn uuid(&self) -> uuid::Uuid {
                self.data.uuid
            }

            fn created(&self) -> chrono::DateTime<chrono::Utc> {
                self.data.created
            }

            fn updated(&self) -> chrono::DateTime<chrono::Utc> {
                self.data.updated
            }
        }

        impl $ent {
            pub fn restore(data: crate::domain::entity::EntityData, state: $state) -> Self {
                Self { data, state }
            }
        }
    };
}

macro_rules! state_ref {
    ($prop:ident, $rtrn:ty) => {
        pub fn $prop(&self) -> &$rtrn {
            &self.state.$prop
        }
    };

    ($prop:ident, $rtrn:ty, copy) => {
        pub fn $prop(&self) -> $rtrn {
            self.state.$prop
        }
    };
}

pub(self) use impl_entity;
pub(self) use state_ref;
