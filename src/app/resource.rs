macro_rules! resource_response {
    (struct $name:ident; $($(#[$meta:meta])* $field:ident: $field_ty:ty),+ ,) => {
        #[derive(core::fmt::Debug, core::clone::Clone, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            pub id: i64,
            pub uuid: uuid::Uuid,
            pub created_at: chrono::DateTime<chrono::Utc>,
            pub updated_at: chrono::DateTime<chrono::Utc>,
            $($(#[$meta])* pub $field: $field_ty),+
        }
    };
}

/// Query string of a paginated list, every value arrives as raw text.
macro_rules! list_query {
    (struct $name:ident; $($(#[$meta:meta])* $field:ident),* $(,)?) => {
        #[derive(core::fmt::Debug, core::clone::Clone, core::default::Default, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            #[serde(default)]
            pub page: Option<String>,
            #[serde(default)]
            pub per_page: Option<String>,
            #[serde(default)]
            pub sort: Option<String>,
            #[serde(default)]
            pub sort_dir: Option<String>,
            $(#[serde(default)] $(#[$meta])* pub $field: Option<String>),*
        }

        impl crate::app::resource::base::ListQuery for $name {
            fn list_params(&self) -> crate::app::resource::base::ListParams<'_> {
                crate::app::resource::base::ListParams {
                    page: self.page.as_deref(),
                    per_page: self.per_page.as_deref(),
                    sort: self.sort.as_deref(),
                    sort_dir: self.sort_dir.as_deref(),
                }
            }
        }
    };
}

pub mod base {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use crate::{base::resource_id, error::resource::ValidationFieldError};

    pub struct ListParams<'q> {
        pub page: Option<&'q str>,
        pub per_page: Option<&'q str>,
        pub sort: Option<&'q str>,
        pub sort_dir: Option<&'q str>,
    }

    pub trait ListQuery {
        fn list_params(&self) -> ListParams<'_>;
    }

    list_query! { struct ListWindowQuery; }

    resource_id!(ListWindowQuery, "base::ListWindowQuery");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct IdQuery {
        #[serde(default)]
        pub id: Option<String>,
    }

    resource_id!(IdQuery, "base::IdQuery");

    /// Comma separated ids, `ids=1,2,3`.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct IdsQuery {
        #[serde(default)]
        pub ids: Option<String>,
    }

    resource_id!(IdsQuery, "base::IdsQuery");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct RemoveOne {
        #[serde(default)]
        pub id: Option<i64>,
    }

    resource_id!(RemoveOne, "base::RemoveOne");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct RemoveMany {
        #[serde(default)]
        pub ids: Option<Vec<i64>>,
    }

    resource_id!(RemoveMany, "base::RemoveMany");

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ExistsResponse {
        pub id: i64,
        pub exists: bool,
    }

    /// Every requested id appears exactly once.
    pub type ExistsManyResponse = BTreeMap<i64, bool>;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RemovedResponse {
        pub id: i64,
        pub removed: bool,
    }

    /// Outcome of one element of a bulk request, `index` points into the request array.
    #[derive(Debug, Clone, Serialize)]
    #[serde(tag = "status", rename_all = "snake_case")]
    pub enum BulkItem<T> {
        Ok {
            index: usize,
            item: T,
        },
        Failed {
            index: usize,
            error: String,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            fields: Vec<ValidationFieldError>,
        },
    }

    impl<T> BulkItem<T> {
        pub fn is_ok(&self) -> bool {
            matches!(self, BulkItem::Ok { .. })
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DetailResponse {
        pub detail: String,
    }

    impl DetailResponse {
        pub fn new(detail: impl Into<String>) -> Self {
            Self {
                detail: detail.into(),
            }
        }
    }

}

pub mod iam {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    use crate::base::resource_id;

    list_query! {
        struct UserListQuery;
        uuid,
        username,
        email,
        first_name,
        last_name,
        is_active,
        is_staff,
    }

    resource_id!(UserListQuery, "iam::UserListQuery");

    list_query! {
        struct UserSearchQuery;
        query,
        field,
    }

    resource_id!(UserSearchQuery, "iam::UserSearchQuery");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct UserFindOneQuery {
        #[serde(default)]
        pub id: Option<String>,
        #[serde(default)]
        pub uuid: Option<String>,
        #[serde(default)]
        pub username: Option<String>,
        #[serde(default)]
        pub email: Option<String>,
    }

    resource_id!(UserFindOneQuery, "iam::UserFindOneQuery");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct CreateUser {
        #[serde(default)]
        pub username: Option<String>,
        #[serde(default)]
        pub email: Option<String>,
        #[serde(default, skip_serializing)]
        pub password: Option<String>,
        #[serde(default)]
        pub first_name: Option<String>,
        #[serde(default)]
        pub last_name: Option<String>,
        #[serde(default)]
        pub is_staff: Option<bool>,
        #[serde(default)]
        pub is_superuser: Option<bool>,
    }

    resource_id!(CreateUser, "iam::CreateUser");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct UpdateUser {
        #[serde(default)]
        pub id: Option<i64>,
        #[serde(default)]
        pub username: Option<String>,
        #[serde(default)]
        pub email: Option<String>,
        #[serde(default)]
        pub first_name: Option<String>,
        #[serde(default)]
        pub last_name: Option<String>,
        #[serde(default)]
        pub is_active: Option<bool>,
        #[serde(default)]
        pub is_staff: Option<bool>,
    }

    resource_id!(UpdateUser, "iam::UpdateUser");

    resource_response! {
        struct UserResponse;
        username: String,
        email: String,
        first_name: String,
        last_name: String,
        is_staff: bool,
        is_superuser: bool,
        is_active: bool,
        date_joined: DateTime<Utc>,
        last_login: Option<DateTime<Utc>>,
    }

    resource_id!(UserResponse, "iam::User");
}

pub mod place {
    use serde::{Deserialize, Serialize};

    use crate::{
        base::resource_id,
        domain::entity::place::{PlaceStatus, PlaceType},
    };

    list_query! {
        struct PlaceListQuery;
        name,
        slug,
        city,
        state,
        country,
        postal_code,
        #[serde(rename = "type")]
        place_type,
        status,
    }

    resource_id!(PlaceListQuery, "place::PlaceListQuery");

    list_query! {
        struct PlaceSearchQuery;
        query,
        field,
    }

    resource_id!(PlaceSearchQuery, "place::PlaceSearchQuery");

    list_query! {
        struct NearbyQuery;
        latitude,
        longitude,
        radius,
    }

    resource_id!(NearbyQuery, "place::NearbyQuery");

    list_query! {
        struct WithinBoxQuery;
        min_lat,
        min_lng,
        max_lat,
        max_lng,
    }

    resource_id!(WithinBoxQuery, "place::WithinBoxQuery");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct KNearestQuery {
        #[serde(default)]
        pub latitude: Option<String>,
        #[serde(default)]
        pub longitude: Option<String>,
        #[serde(default)]
        pub k: Option<String>,
    }

    resource_id!(KNearestQuery, "place::KNearestQuery");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ClusterQuery {
        #[serde(default)]
        pub grid_size: Option<String>,
    }

    resource_id!(ClusterQuery, "place::ClusterQuery");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct PlaceFindOneQuery {
        #[serde(default)]
        pub id: Option<String>,
        #[serde(default)]
        pub uuid: Option<String>,
        #[serde(default)]
        pub slug: Option<String>,
        #[serde(default)]
        pub name: Option<String>,
    }

    resource_id!(PlaceFindOneQuery, "place::PlaceFindOneQuery");

    /// Body of a place creation, also the shape merged by updates.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct PlaceFields {
        #[serde(default)]
        pub name: Option<String>,
        #[serde(default)]
        pub slug: Option<String>,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub address: Option<String>,
        #[serde(default)]
        pub city: Option<String>,
        #[serde(default)]
        pub state: Option<String>,
        #[serde(default)]
        pub country: Option<String>,
        #[serde(default)]
        pub postal_code: Option<String>,
        #[serde(default)]
        pub website: Option<String>,
        #[serde(default)]
        pub phone: Option<String>,
        #[serde(default)]
        pub email: Option<String>,
        #[serde(default)]
        pub latitude: Option<f64>,
        #[serde(default)]
        pub longitude: Option<f64>,
        #[serde(default, rename = "type")]
        pub place_type: Option<i16>,
        #[serde(default)]
        pub status: Option<i16>,
    }

    pub type CreatePlace = PlaceFields;

    resource_id!(PlaceFields, "place::CreatePlace");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct UpdatePlace {
        #[serde(default)]
        pub id: Option<i64>,
        #[serde(flatten)]
        pub fields: PlaceFields,
    }

    resource_id!(UpdatePlace, "place::UpdatePlace");

    resource_response! {
        struct PlaceResponse;
        name: String,
        slug: String,
        description: Option<String>,
        address: Option<String>,
        city: Option<String>,
        state: Option<String>,
        country: Option<String>,
        postal_code: Option<String>,
        website: Option<String>,
        phone: Option<String>,
        email: Option<String>,
        latitude: f64,
        longitude: f64,
        #[serde(rename = "type")]
        place_type: PlaceType,
        type_display: String,
        status: PlaceStatus,
        status_display: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        distance: Option<f64>,
    }

    resource_id!(PlaceResponse, "place::Place");

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PlaceClusterResponse {
        pub latitude: f64,
        pub longitude: f64,
        pub count: i64,
    }
}

pub mod auth {
    use serde::{Deserialize, Serialize};

    use crate::base::resource_id;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct LoginCredentials {
        #[serde(default)]
        pub username: Option<String>,
        #[serde(default, skip_serializing)]
        pub password: Option<String>,
    }

    resource_id!(LoginCredentials, "auth::LoginCredentials");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct RegisterCredentials {
        #[serde(default)]
        pub username: Option<String>,
        #[serde(default)]
        pub email: Option<String>,
        #[serde(default, skip_serializing)]
        pub password: Option<String>,
    }

    resource_id!(RegisterCredentials, "auth::RegisterCredentials");

    /// Body carrying a refresh token, used by logout and access token refresh.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct RefreshTokenBody {
        #[serde(default, skip_serializing)]
        pub refresh_token: Option<String>,
    }

    resource_id!(RefreshTokenBody, "auth::RefreshToken");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct VerifyTokenBody {
        #[serde(default, skip_serializing)]
        pub token: Option<String>,
    }

    resource_id!(VerifyTokenBody, "auth::VerifyToken");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ChangePassword {
        #[serde(default, skip_serializing)]
        pub current_password: Option<String>,
        #[serde(default, skip_serializing)]
        pub new_password: Option<String>,
    }

    resource_id!(ChangePassword, "auth::ChangePassword");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ForgotPassword {
        #[serde(default)]
        pub email: Option<String>,
    }

    resource_id!(ForgotPassword, "auth::ForgotPassword");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ResetPassword {
        #[serde(default, skip_serializing)]
        pub token: Option<String>,
        #[serde(default, skip_serializing)]
        pub new_password: Option<String>,
    }

    resource_id!(ResetPassword, "auth::ResetPassword");

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct UpdateProfile {
        #[serde(default)]
        pub username: Option<String>,
        #[serde(default)]
        pub email: Option<String>,
        #[serde(default)]
        pub first_name: Option<String>,
        #[serde(default)]
        pub last_name: Option<String>,
    }

    resource_id!(UpdateProfile, "auth::UpdateProfile");

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TokenPairResponse {
        pub access_token: String,
        pub refresh_token: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AccessTokenResponse {
        pub access_token: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct RefreshTokenResponse {
        pub refresh_token: String,
    }
}
