use serde::{Deserialize, Serialize};

use crate::error::{invalid_argument_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn validate(&self) -> Result<(), Error> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(invalid_argument_error("latitude out of range"));
        }

        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(invalid_argument_error("longitude out of range"));
        }

        Ok(())
    }
}

/// A pickup or dropoff point as chosen by the customer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub label: String,
    pub coordinates: Coordinates,
}

impl Place {
    pub fn new(label: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            label: label.into(),
            coordinates: Coordinates { lat, lng },
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.label.trim().is_empty() {
            return Err(invalid_argument_error("place label is required"));
        }

        self.coordinates.validate()
    }
}

#[test]
fn place_rejects_out_of_range_coordinates() {
    assert!(Place::new("Depot", 52.52, 13.40).validate().is_ok());
    assert!(Place::new("Depot", 91.0, 13.40).validate().is_err());
    assert!(Place::new("Depot", 52.52, f64::NAN).validate().is_err());
    assert!(Place::new("  ", 52.52, 13.40).validate().is_err());
}
