pub mod resource;
pub mod use_case;

pub mod transform {
    pub mod user {
        use crate::{
            app::resource::iam::UserResponse,
            domain::entity::{iam::User, Entity},
        };

        impl From<User> for UserResponse {
            fn from(user: User) -> Self {
                Self {
                    id: user.id(),
                    uuid: user.uuid(),
                    created_at: user.created(),
                    updated_at: user.updated(),
                    date_joined: user.date_joined(),
                    last_login: user.last_login(),
                    is_staff: user.is_staff(),
                    is_superuser: user.is_superuser(),
                    is_active: user.is_active(),
                    username: user.state.username,
                    email: user.state.email,
                    first_name: user.state.first_name,
                    last_name: user.state.last_name,
                }
            }
        }
    }

    pub mod place {
        use crate::{
            app::resource::place::{PlaceClusterResponse, PlaceResponse},
            domain::{
                entity::{place::Place, Entity},
                repository::{PlaceCluster, PlaceMatch},
            },
        };

        impl From<Place> for PlaceResponse {
            fn from(place: Place) -> Self {
                PlaceMatch {
                    place,
                    distance: None,
                }
                .into()
            }
        }

        impl From<PlaceMatch> for PlaceResponse {
            fn from(PlaceMatch { place, distance }: PlaceMatch) -> Self {
                let location = place.location();
                Self {
                    id: place.id(),
                    uuid: place.uuid(),
                    created_at: place.created(),
                    updated_at: place.updated(),
                    latitude: location.latitude(),
                    longitude: location.longitude(),
                    place_type: place.place_type(),
                    type_display: place.place_type().to_string(),
                    status: place.status(),
                    status_display: place.status().to_string(),
                    distance,
                    name: place.state.name,
                    slug: place.state.slug,
                    description: place.state.description,
                    address: place.state.address,
                    city: place.state.city,
                    state: place.state.state,
                    country: place.state.country,
                    postal_code: place.state.postal_code,
                    website: place.state.website,
                    phone: place.state.phone,
                    email: place.state.email,
                }
            }
        }

        impl From<PlaceCluster> for PlaceClusterResponse {
            fn from(cluster: PlaceCluster) -> Self {
                Self {
                    latitude: cluster.center.latitude(),
                    longitude: cluster.center.longitude(),
                    count: cluster.count,
                }
            }
        }
    }
}
