use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Spatial reference of every stored point (WGS 84).
pub const SRID: i32 = 4326;

/// Mean earth radius used for great-circle distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

#[derive(Debug, Display, Clone, Copy, PartialEq)]
pub enum GeoError {
    #[display(fmt = "latitude {_0} outside of [-90, 90]")]
    Latitude(f64),
    #[display(fmt = "longitude {_0} outside of [-180, 180]")]
    Longitude(f64),
    #[display(fmt = "min latitude {_0} is not less than max latitude {_1}")]
    LatitudeOrder(f64, f64),
    #[display(fmt = "min longitude {_0} is not less than max longitude {_1}")]
    LongitudeOrder(f64, f64),
}

impl std::error::Error for GeoError {}

/// Geographic point, longitude/latitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Point with each coordinate pulled back into range, for grid cell
    /// centres that round past a pole or the antimeridian.
    pub fn clamped(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: latitude.clamp(-90.0, 90.0),
            longitude: longitude.clamp(-180.0, 180.0),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
    }
}

/// Axis aligned rectangle, edges included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: GeoPoint,
    max: GeoPoint,
}

impl BoundingBox {
    pub fn new(min: GeoPoint, max: GeoPoint) -> Result<Self, GeoError> {
        if min.latitude >= max.latitude {
            return Err(GeoError::LatitudeOrder(min.latitude, max.latitude));
        }
        if min.longitude >= max.longitude {
            return Err(GeoError::LongitudeOrder(min.longitude, max.longitude));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> GeoPoint {
        self.min
    }

    pub fn max(&self) -> GeoPoint {
        self.max
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.min.latitude..=self.max.latitude).contains(&point.latitude)
            && (self.min.longitude..=self.max.longitude).contains(&point.longitude)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn clamps_snapped_cell_centres() {
        let centre = GeoPoint::clamped(100.0, 182.0);
        assert_eq!((centre.latitude(), centre.longitude()), (90.0, 180.0));
        let centre = GeoPoint::clamped(-91.0, -7.0);
        assert_eq!((centre.latitude(), centre.longitude()), (-90.0, -7.0));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert_eq!(GeoPoint::new(90.5, 0.0), Err(GeoError::Latitude(90.5)));
        assert_eq!(GeoPoint::new(0.0, -180.1), Err(GeoError::Longitude(-180.1)));
        assert!(GeoPoint::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn distance_between_same_point_is_zero() {
        let bar = GeoPoint::new(40.0, -73.0).unwrap();
        assert_eq!(bar.distance_to(&bar), 0.0);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111km() {
        let a = GeoPoint::new(40.0, -73.0).unwrap();
        let b = GeoPoint::new(41.0, -73.0).unwrap();
        let distance = a.distance_to(&b);
        assert!((distance - 111_195.0).abs() < 100.0, "{distance}");
    }

    #[test]
    fn box_requires_ordered_corners() {
        let low = GeoPoint::new(39.0, -74.0).unwrap();
        let high = GeoPoint::new(41.0, -72.0).unwrap();
        assert!(BoundingBox::new(low, high).is_ok());
        assert_eq!(
            BoundingBox::new(high, low),
            Err(GeoError::LatitudeOrder(41.0, 39.0))
        );
    }

    #[test]
    fn box_edges_are_inclusive() {
        let bbox = BoundingBox::new(
            GeoPoint::new(39.0, -74.0).unwrap(),
            GeoPoint::new(41.0, -72.0).unwrap(),
        )
        .unwrap();

        assert!(bbox.contains(&GeoPoint::new(41.0, -73.0).unwrap()));
        assert!(bbox.contains(&GeoPoint::new(39.0, -74.0).unwrap()));
        assert!(!bbox.contains(&GeoPoint::new(41.000001, -73.0).unwrap()));
    }
}
