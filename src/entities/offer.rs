use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_argument_error, invalid_state_error, unexpected_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl OfferStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for OfferStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(unexpected_error(format!("unknown offer status {other}"))),
        }
    }
}

/// A driver's priced bid on a service request. Prices are in minor currency units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverOffer {
    pub id: Uuid,
    pub request_id: Uuid,
    pub driver_id: Uuid,
    pub price: i64,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
}

impl DriverOffer {
    pub fn new(request_id: Uuid, driver_id: Uuid, price: i64) -> Result<Self, Error> {
        if request_id.is_nil() {
            return Err(invalid_argument_error("request_id is required"));
        }

        if driver_id.is_nil() {
            return Err(invalid_argument_error("driver_id is required"));
        }

        if price <= 0 {
            return Err(invalid_argument_error("price must be positive"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            request_id,
            driver_id,
            price,
            status: OfferStatus::Pending,
            created_at: Utc::now(),
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == OfferStatus::Pending
    }

    pub fn accept(&mut self, price: i64) -> Result<(), Error> {
        if !self.is_pending() {
            return Err(invalid_state_error("offer is not pending"));
        }

        self.status = OfferStatus::Accepted;
        self.price = price;

        Ok(())
    }

    /// Rejects a pending offer. With `include_accepted` an already accepted offer is
    /// rejected as well, which is what cancelling the owning request needs.
    pub fn reject(&mut self, include_accepted: bool) -> Result<(), Error> {
        match self.status {
            OfferStatus::Pending => {
                self.status = OfferStatus::Rejected;
                Ok(())
            }
            OfferStatus::Accepted if include_accepted => {
                self.status = OfferStatus::Rejected;
                Ok(())
            }
            _ => Err(invalid_state_error("offer is already decided")),
        }
    }
}

#[test]
fn offer_requires_positive_price() {
    let err = DriverOffer::new(Uuid::new_v4(), Uuid::new_v4(), 0).unwrap_err();
    assert!(err.is_invalid_argument_error());

    let err = DriverOffer::new(Uuid::nil(), Uuid::new_v4(), 100).unwrap_err();
    assert!(err.is_invalid_argument_error());
}

#[test]
fn accepted_offer_survives_plain_rejection() {
    let mut offer = DriverOffer::new(Uuid::new_v4(), Uuid::new_v4(), 5000).unwrap();

    offer.accept(4500).unwrap();
    assert_eq!(offer.price, 4500);
    assert!(offer.reject(false).is_err());
    assert_eq!(offer.status, OfferStatus::Accepted);

    offer.reject(true).unwrap();
    assert_eq!(offer.status, OfferStatus::Rejected);
    assert!(offer.accept(4500).is_err());
}
