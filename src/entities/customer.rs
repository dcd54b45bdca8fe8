use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_argument_error, Error};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: String) -> Result<Self, Error> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(invalid_argument_error("customer name is required"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            created_at: Utc::now(),
        })
    }
}
