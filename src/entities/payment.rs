use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{unexpected_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
}

impl PaymentStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            other => Err(unexpected_error(format!(
                "unknown payment status {other}"
            ))),
        }
    }
}

/// Bookkeeping row for an accepted trip. One row per (customer, payment method).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub payment_method_id: i64,
    pub amount: i64,
    pub status: PaymentStatus,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(customer_id: Uuid, payment_method_id: i64, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            payment_method_id,
            amount,
            status: PaymentStatus::Pending,
            updated_at: Utc::now(),
        }
    }

    pub fn is_keyed_on(&self, customer_id: Uuid, payment_method_id: i64) -> bool {
        self.customer_id == customer_id && self.payment_method_id == payment_method_id
    }

    pub fn restart(&mut self, amount: i64) {
        self.amount = amount;
        self.status = PaymentStatus::Pending;
        self.updated_at = Utc::now();
    }
}
