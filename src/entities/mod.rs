mod acceptance;
mod customer;
mod driver;
mod offer;
mod payment;
mod place;
mod request;

pub use acceptance::{Acceptance, Arbitration};
pub use customer::Customer;
pub use driver::{Driver, DriverStatus};
pub use offer::{DriverOffer, OfferStatus};
pub use payment::{Payment, PaymentStatus};
pub use place::{Coordinates, Place};
pub use request::{NewRequest, RequestStatus, ServiceRequest};
