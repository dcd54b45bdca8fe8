use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Place;
use crate::error::{invalid_argument_error, invalid_state_error, unexpected_error, Error};

const MAX_NOTE_LEN: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// States in which a winning offer is recorded against the request.
    pub fn is_booked(&self) -> bool {
        matches!(self, Self::Accepted | Self::Completed)
    }
}

impl FromStr for RequestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(unexpected_error(format!(
                "unknown request status {other}"
            ))),
        }
    }
}

/// Fields a customer supplies when posting a trip request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewRequest {
    pub customer_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
    pub vehicle_type: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
    pub vehicle_type: String,
    pub note: Option<String>,
    pub status: RequestStatus,
    pub chosen_offer_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub requested_at: DateTime<Utc>,
    pub booked_at: Option<DateTime<Utc>>,
}

impl ServiceRequest {
    pub fn new(draft: NewRequest) -> Result<Self, Error> {
        if draft.customer_id.is_nil() {
            return Err(invalid_argument_error("customer_id is required"));
        }

        draft.pickup.validate()?;
        draft.dropoff.validate()?;

        let vehicle_type = draft.vehicle_type.trim().to_lowercase();
        if vehicle_type.is_empty() {
            return Err(invalid_argument_error("vehicle_type is required"));
        }

        let note = draft
            .note
            .map(|note| note.trim().to_string())
            .filter(|note| !note.is_empty());

        if note.as_ref().map_or(false, |note| note.len() > MAX_NOTE_LEN) {
            return Err(invalid_argument_error("note is too long"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            customer_id: draft.customer_id,
            pickup: draft.pickup,
            dropoff: draft.dropoff,
            vehicle_type,
            note,
            status: RequestStatus::Pending,
            chosen_offer_id: None,
            payment_id: None,
            requested_at: Utc::now(),
            booked_at: None,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// The chosen offer and payment are recorded exactly while the request is booked.
    pub fn is_consistent(&self) -> bool {
        let booked = self.status.is_booked();
        booked == self.chosen_offer_id.is_some() && booked == self.payment_id.is_some()
    }

    pub fn accept(&mut self, offer_id: Uuid, booked_at: DateTime<Utc>) -> Result<(), Error> {
        match self.status {
            RequestStatus::Pending => {
                self.status = RequestStatus::Accepted;
                self.chosen_offer_id = Some(offer_id);
                self.booked_at = Some(booked_at);
                Ok(())
            }
            _ => Err(invalid_state_error("request is not pending")),
        }
    }

    pub fn attach_payment(&mut self, payment_id: Uuid) {
        self.payment_id = Some(payment_id);
    }

    pub fn complete(&mut self) -> Result<(), Error> {
        match self.status {
            RequestStatus::Accepted => {
                self.status = RequestStatus::Completed;
                Ok(())
            }
            _ => Err(invalid_state_error("request is not accepted")),
        }
    }

    pub fn cancel(&mut self) -> Result<(), Error> {
        match self.status {
            RequestStatus::Pending | RequestStatus::Accepted => {
                self.status = RequestStatus::Cancelled;
                self.chosen_offer_id = None;
                self.payment_id = None;
                Ok(())
            }
            _ => Err(invalid_state_error("request is already closed")),
        }
    }
}

#[cfg(test)]
fn draft() -> NewRequest {
    NewRequest {
        customer_id: Uuid::new_v4(),
        pickup: Place::new("Warehouse 4", 52.52, 13.40),
        dropoff: Place::new("Harbour gate", 52.49, 13.45),
        vehicle_type: " Van ".into(),
        note: Some("  ".into()),
    }
}

#[test]
fn new_request_is_pending_and_normalised() {
    let request = ServiceRequest::new(draft()).unwrap();

    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.vehicle_type, "van");
    assert_eq!(request.note, None);
    assert!(request.is_consistent());
}

#[test]
fn new_request_requires_vehicle_type() {
    let mut draft = draft();
    draft.vehicle_type = "".into();

    let err = ServiceRequest::new(draft).unwrap_err();
    assert!(err.is_invalid_argument_error());
}

#[test]
fn request_walks_through_accept_and_complete() {
    let mut request = ServiceRequest::new(draft()).unwrap();
    let offer_id = Uuid::new_v4();

    request.accept(offer_id, Utc::now()).unwrap();
    assert!(!request.is_consistent());
    request.attach_payment(Uuid::new_v4());
    assert!(request.is_consistent());

    assert!(request.accept(Uuid::new_v4(), Utc::now()).is_err());

    request.complete().unwrap();
    assert_eq!(request.status, RequestStatus::Completed);
    assert_eq!(request.chosen_offer_id, Some(offer_id));
    assert!(request.is_consistent());
}

#[test]
fn cancel_clears_booking_and_is_terminal() {
    let mut request = ServiceRequest::new(draft()).unwrap();
    request.accept(Uuid::new_v4(), Utc::now()).unwrap();
    request.attach_payment(Uuid::new_v4());

    request.cancel().unwrap();

    assert_eq!(request.status, RequestStatus::Cancelled);
    assert!(request.is_consistent());
    assert!(request.cancel().unwrap_err().is_invalid_state_error());
    assert!(request.complete().unwrap_err().is_invalid_state_error());
}

#[test]
fn status_round_trips_through_name() {
    for status in [
        RequestStatus::Pending,
        RequestStatus::Accepted,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ] {
        assert_eq!(status.name().parse::<RequestStatus>().unwrap(), status);
    }
}
