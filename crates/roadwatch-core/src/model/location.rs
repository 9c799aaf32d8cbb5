//! Geographic coordinates and the one parser for `"lat, lng"` text.
//!
//! Both the report form's coordinate field and map clicks funnel through
//! this module, so a coordinate that reaches an [`IssueRecord`] has always
//! passed the same range checks.
//!
//! [`IssueRecord`]: super::IssueRecord

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

pub const LAT_RANGE: (f64, f64) = (-90.0, 90.0);
pub const LNG_RANGE: (f64, f64) = (-180.0, 180.0);

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Build a coordinate, rejecting non-finite or out-of-range components.
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        let point = Self { lat, lng };
        point.validate()?;
        Ok(point)
    }

    /// Re-check an existing value (deserialized records bypass [`LatLng::new`]).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(ValidationError::new(
                "location",
                self.to_string(),
                "coordinates must be finite numbers",
            ));
        }
        if self.lat < LAT_RANGE.0 || self.lat > LAT_RANGE.1 {
            return Err(ValidationError::new(
                "location",
                self.to_string(),
                "latitude must be within [-90, 90]",
            ));
        }
        if self.lng < LNG_RANGE.0 || self.lng > LNG_RANGE.1 {
            return Err(ValidationError::new(
                "location",
                self.to_string(),
                "longitude must be within [-180, 180]",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

impl FromStr for LatLng {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_lat_lng(s)
    }
}

/// Parse `"lat, lng"` into a validated [`LatLng`].
///
/// Exactly two comma-separated components are required; whitespace around
/// either component is ignored.
pub fn parse_lat_lng(text: &str) -> Result<LatLng, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(
            "location",
            text,
            "a location is required; pick one on the map or type \"lat, lng\"",
        ));
    }

    let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    let [lat_text, lng_text] = parts.as_slice() else {
        return Err(ValidationError::new(
            "location",
            text,
            format!("expected two comma-separated numbers, found {}", parts.len()),
        ));
    };

    let lat = parse_component(text, lat_text, "latitude")?;
    let lng = parse_component(text, lng_text, "longitude")?;
    LatLng::new(lat, lng)
}

fn parse_component(raw: &str, component: &str, name: &str) -> Result<f64, ValidationError> {
    component
        .parse::<f64>()
        .map_err(|_| ValidationError::new("location", raw, format!("{name} '{component}' is not a number")))
}
