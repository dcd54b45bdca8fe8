use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_argument_error, Error};

/// A customer's decision to take one offer on their request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acceptance {
    pub request_id: Uuid,
    pub customer_id: Uuid,
    pub offer_id: Uuid,
    pub price: i64,
    pub payment_method_id: i64,
}

impl Acceptance {
    pub fn validate(&self) -> Result<(), Error> {
        if self.request_id.is_nil() {
            return Err(invalid_argument_error("request_id is required"));
        }

        if self.customer_id.is_nil() {
            return Err(invalid_argument_error("customer_id is required"));
        }

        if self.offer_id.is_nil() {
            return Err(invalid_argument_error("offer_id is required"));
        }

        if self.price <= 0 {
            return Err(invalid_argument_error("price must be positive"));
        }

        if self.payment_method_id <= 0 {
            return Err(invalid_argument_error(
                "payment_method_id is required",
            ));
        }

        Ok(())
    }
}

/// What a committed acceptance changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arbitration {
    pub request_id: Uuid,
    pub offer_id: Uuid,
    pub payment_id: Uuid,
    pub price: i64,
    pub rejected_offers: u64,
}

#[test]
fn acceptance_requires_every_field() {
    let acceptance = Acceptance {
        request_id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        offer_id: Uuid::new_v4(),
        price: 4000,
        payment_method_id: 7,
    };
    assert!(acceptance.validate().is_ok());

    let missing_offer = Acceptance {
        offer_id: Uuid::nil(),
        ..acceptance
    };
    assert!(missing_offer.validate().unwrap_err().is_invalid_argument_error());

    let missing_method = Acceptance {
        payment_method_id: 0,
        ..acceptance
    };
    assert!(missing_method.validate().is_err());
}
