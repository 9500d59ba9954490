use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::domain::datatype::geo::GeoPoint;

use super::{impl_entity, state_ref, EntityData};

#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum PlaceType {
    #[default]
    #[display(fmt = "Bar")]
    Bar,
    #[display(fmt = "Pub")]
    Pub,
    #[display(fmt = "Restaurant")]
    Restaurant,
    #[display(fmt = "Cafe")]
    Cafe,
    #[display(fmt = "Nightclub")]
    Nightclub,
    #[display(fmt = "Brewery")]
    Brewery,
    #[display(fmt = "Winery")]
    Winery,
    #[display(fmt = "Food Truck")]
    FoodTruck,
    #[display(fmt = "Cocktail Bar")]
    CocktailBar,
    #[display(fmt = "Sports Bar")]
    SportsBar,
    #[display(fmt = "Lounge")]
    Lounge,
    #[display(fmt = "Rooftop Bar")]
    RooftopBar,
}

impl PlaceType {
    pub const ALL: [PlaceType; 12] = [
        PlaceType::Bar,
        PlaceType::Pub,
        PlaceType::Restaurant,
        PlaceType::Cafe,
        PlaceType::Nightclub,
        PlaceType::Brewery,
        PlaceType::Winery,
        PlaceType::FoodTruck,
        PlaceType::CocktailBar,
        PlaceType::SportsBar,
        PlaceType::Lounge,
        PlaceType::RooftopBar,
    ];
}

impl TryFrom<i16> for PlaceType {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or_else(|| format!("unknown place type {value}"))
    }
}

impl From<PlaceType> for i16 {
    fn from(kind: PlaceType) -> Self {
        kind as i16
    }
}

#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum PlaceStatus {
    #[default]
    #[display(fmt = "Active")]
    Active,
    #[display(fmt = "Inactive")]
    Inactive,
}

impl TryFrom<i16> for PlaceStatus {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Active),
            1 => Ok(Self::Inactive),
            _ => Err(format!("unknown place status {value}")),
        }
    }
}

impl From<PlaceStatus> for i16 {
    fn from(status: PlaceStatus) -> Self {
        status as i16
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceState {
    pub(crate) name: String,
    pub(crate) slug: String,
    pub(crate) description: Option<String>,
    pub(crate) address: Option<String>,
    pub(crate) city: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) country: Option<String>,
    pub(crate) postal_code: Option<String>,
    pub(crate) website: Option<String>,
    pub(crate) phone: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) location: GeoPoint,
    pub(crate) place_type: PlaceType,
    pub(crate) status: PlaceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub(crate) data: EntityData,
    pub(crate) state: PlaceState,
}

impl_entity!(Place, PlaceState);

impl Place {
    state_ref!(name, String);
    state_ref!(slug, String);
    state_ref!(description, Option<String>);
    state_ref!(address, Option<String>);
    state_ref!(city, Option<String>);
    state_ref!(country, Option<String>);
    state_ref!(postal_code, Option<String>);
    state_ref!(website, Option<String>);
    state_ref!(phone, Option<String>);
    state_ref!(email, Option<String>);
    state_ref!(location, GeoPoint, copy);
    state_ref!(place_type, PlaceType, copy);
    state_ref!(status, PlaceStatus, copy);

    /// State or province, `state` is taken by the entity state.
    pub fn region(&self) -> &Option<String> {
        &self.state.state
    }
}
