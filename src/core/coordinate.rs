use std::{fmt, str::FromStr};

use serde::Serialize;

use super::error::GatewayError;

pub const MAX_LATITUDE: f64 = 90.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// A validated geographic coordinate.
///
/// Only constructed through [`Coordinate::new`] or [`FromStr`], so every
/// value in circulation lies within `[-90, 90] x [-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GatewayError> {
        // Range checks written so NaN falls through to the error arm.
        if !(-MAX_LATITUDE..=MAX_LATITUDE).contains(&latitude) {
            return Err(crate::validation_error!(
                "latitude {} outside [-90, 90]",
                latitude
            ));
        }
        if !(-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&longitude) {
            return Err(crate::validation_error!(
                "longitude {} outside [-180, 180]",
                longitude
            ));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Bit-exact key used by the response cache; no rounding or bucketing.
    /// `-0.0` and `0.0` share a key.
    pub fn key(&self) -> (u64, u64) {
        (canonical_bits(self.latitude), canonical_bits(self.longitude))
    }
}

fn canonical_bits(value: f64) -> u64 {
    // -0.0 == 0.0, so this folds both zeros onto +0.0.
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

impl FromStr for Coordinate {
    type Err = GatewayError;

    /// Parses `"<lat>,<lon>"`. Commas and whitespace are both accepted as
    /// delimiters, so `"40.1, -88.2"` and `"40.1 -88.2"` are equivalent.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .collect();

        let [lat, lon] = parts.as_slice() else {
            return Err(crate::validation_error!(
                "expected \"<lat>,<lon>\", got {:?}",
                s
            ));
        };

        let latitude = lat
            .parse::<f64>()
            .map_err(|e| crate::validation_error!("invalid latitude {:?}: {}", lat, e))?;
        let longitude = lon
            .parse::<f64>()
            .map_err(|e| crate::validation_error!("invalid longitude {:?}: {}", lon, e))?;

        Self::new(latitude, longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}
