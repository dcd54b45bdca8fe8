pub mod customers;
pub mod drivers;
pub mod offers;
pub mod payments;
pub mod requests;
pub mod rooms;

use axum::extract::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{invalid_argument_error, Error};
use crate::notifier::Notifier;

#[derive(Serialize, Deserialize)]
pub struct Affected {
    pub affected_rows: u64,
}

impl From<u64> for Affected {
    fn from(affected_rows: u64) -> Self {
        Self { affected_rows }
    }
}

pub fn required<T>(value: Option<T>, field: &str) -> Result<T, Error> {
    value.ok_or_else(|| invalid_argument_error(format!("{field} is required")))
}

pub async fn health(Extension(notifier): Extension<Notifier>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "rooms": notifier.room_count(),
    }))
}
