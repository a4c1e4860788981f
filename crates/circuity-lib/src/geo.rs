//! Coordinate types and great-circle distance math.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mean Earth radius in miles, used by the Haversine formula.
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Mean Earth radius in kilometers, used by the Haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Maximum length of a cosmetic location name.
pub const MAX_LOCATION_NAME_LEN: usize = 100;

/// Distance units fixed per request and per stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Miles,
    #[serde(rename = "km")]
    Kilometers,
}

impl Units {
    /// Wire and storage representation of the unit.
    pub fn as_str(self) -> &'static str {
        match self {
            Units::Miles => "miles",
            Units::Kilometers => "km",
        }
    }

    /// Parse the storage representation back into a unit.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "miles" => Some(Units::Miles),
            "km" => Some(Units::Kilometers),
            _ => None,
        }
    }

    /// Earth radius in this unit.
    pub fn earth_radius(self) -> f64 {
        match self {
            Units::Miles => EARTH_RADIUS_MILES,
            Units::Kilometers => EARTH_RADIUS_KM,
        }
    }

    /// Conversion factor from meters (the routing service's native unit).
    pub fn meters_factor(self) -> f64 {
        match self {
            Units::Miles => 0.000621371,
            Units::Kilometers => 0.001,
        }
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting out-of-range values.
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        let coordinate = Coordinate { lat, lng };
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Check that both components are within their valid ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(Error::InvalidLatitude { value: self.lat });
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(Error::InvalidLongitude { value: self.lng });
        }
        Ok(())
    }

    /// Round both components to 6 decimal places (~0.11m), the precision used
    /// for cache identity so lookups are exact-match rather than fuzzy.
    pub fn rounded(&self) -> Self {
        Coordinate {
            lat: round_to(self.lat, 6),
            lng: round_to(self.lng, 6),
        }
    }
}

/// A coordinate with an optional cosmetic name.
///
/// The name is not part of cache identity; only the rounded coordinates and
/// the units identify a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Location {
    pub fn new(coordinate: Coordinate, name: Option<String>) -> Self {
        Location { coordinate, name }
    }
}

/// Great-circle distance between two coordinates using the Haversine formula.
///
/// Pure and infallible: coordinates are validated at the boundary before they
/// reach this function. Returns the distance in the requested units, rounded
/// to 2 decimal places. Identical endpoints yield exactly 0.0.
pub fn straight_distance(origin: Coordinate, destination: Coordinate, units: Units) -> f64 {
    let radius = units.earth_radius();

    let lat1 = origin.lat.to_radians();
    let lat2 = destination.lat.to_radians();
    let dlat = (destination.lat - origin.lat).to_radians();
    let dlng = (destination.lng - origin.lng).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    round_to(radius * c, 2)
}

/// Round `value` to `decimals` decimal places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
