use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_argument_error, invalid_state_error, unexpected_error, Error};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub status: DriverStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Idle,
    Available,
}

impl DriverStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Available => "available",
        }
    }
}

impl FromStr for DriverStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "available" => Ok(Self::Available),
            other => Err(unexpected_error(format!(
                "unknown driver status {other}"
            ))),
        }
    }
}

impl Driver {
    pub fn new(name: String) -> Result<Self, Error> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(invalid_argument_error("driver name is required"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            status: DriverStatus::Idle,
        })
    }

    pub fn is_available(&self) -> bool {
        self.status == DriverStatus::Available
    }

    #[tracing::instrument]
    pub fn start(&mut self) -> Result<(), Error> {
        match self.status {
            DriverStatus::Idle => {
                self.status = DriverStatus::Available;
                Ok(())
            }
            _ => Err(invalid_state_error("driver is already available")),
        }
    }

    #[tracing::instrument]
    pub fn stop(&mut self) -> Result<(), Error> {
        match self.status {
            DriverStatus::Available => {
                self.status = DriverStatus::Idle;
                Ok(())
            }
            _ => Err(invalid_state_error("driver is not available")),
        }
    }
}

#[test]
fn driver_toggles_availability() {
    let mut driver = Driver::new(" Ada ".into()).unwrap();
    assert_eq!(driver.name, "Ada");
    assert!(!driver.is_available());

    driver.start().unwrap();
    assert!(driver.is_available());
    assert!(driver.start().unwrap_err().is_invalid_state_error());

    driver.stop().unwrap();
    assert!(driver.stop().is_err());
}
