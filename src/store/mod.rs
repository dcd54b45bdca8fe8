//! The persistent store capability the engine is built on.
//!
//! Every state-changing method returns the number of rows it affected. Guarded
//! updates only touch rows whose current status satisfies the guard, so a zero
//! tells the caller the row was absent or had already moved on.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{Customer, Driver, DriverOffer, DriverStatus, Payment, ServiceRequest};
use crate::error::Error;

#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a transaction. Dropping it without `commit` rolls it back.
    async fn begin(&self) -> Result<Box<dyn Transaction>, Error>;

    async fn insert_customer(&self, customer: &Customer) -> Result<(), Error>;
    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, Error>;

    async fn insert_driver(&self, driver: &Driver) -> Result<(), Error>;
    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, Error>;
    /// Moves a driver from `from` to `to`; zero rows when the driver was not in `from`.
    async fn set_driver_status(
        &self,
        id: Uuid,
        from: DriverStatus,
        to: DriverStatus,
    ) -> Result<u64, Error>;

    async fn insert_request(&self, request: &ServiceRequest) -> Result<(), Error>;
    async fn find_request(&self, id: Uuid) -> Result<Option<ServiceRequest>, Error>;
    async fn list_requests(&self, customer_id: Uuid) -> Result<Vec<ServiceRequest>, Error>;
    /// accepted -> completed
    async fn complete_request(&self, id: Uuid) -> Result<u64, Error>;
    /// pending|accepted -> cancelled, rejecting every undecided or accepted offer of the
    /// request in the same transaction.
    async fn cancel_request(&self, id: Uuid) -> Result<u64, Error>;

    /// Records the offer only while its request is still pending.
    async fn insert_offer(&self, offer: &DriverOffer) -> Result<u64, Error>;
    async fn find_offer(&self, id: Uuid) -> Result<Option<DriverOffer>, Error>;
    async fn list_offers(&self, request_id: Uuid) -> Result<Vec<DriverOffer>, Error>;
    /// pending -> rejected for a single offer.
    async fn withdraw_offer(&self, id: Uuid) -> Result<u64, Error>;
    /// pending -> rejected for every offer of the driver; returns the offers it touched.
    async fn withdraw_all_offers(&self, driver_id: Uuid) -> Result<Vec<DriverOffer>, Error>;
    /// Rejects the pending offers of other drivers on an already accepted request.
    async fn reject_competing_offers(&self, request_id: Uuid, driver_id: Uuid)
        -> Result<u64, Error>;

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, Error>;
}

/// One physical transaction used by offer arbitration.
#[async_trait]
pub trait Transaction: Send {
    /// pending -> accepted for the customer's request, recording the chosen offer.
    async fn accept_request(
        &mut self,
        request_id: Uuid,
        customer_id: Uuid,
        offer_id: Uuid,
    ) -> Result<u64, Error>;

    /// Inserts or refreshes the payment keyed on (customer, payment method).
    async fn upsert_payment(
        &mut self,
        customer_id: Uuid,
        payment_method_id: i64,
        amount: i64,
    ) -> Result<Uuid, Error>;

    async fn attach_payment(
        &mut self,
        request_id: Uuid,
        customer_id: Uuid,
        payment_id: Uuid,
    ) -> Result<u64, Error>;

    /// pending -> accepted for the offer, provided it belongs to the request.
    async fn accept_offer(
        &mut self,
        offer_id: Uuid,
        request_id: Uuid,
        price: i64,
    ) -> Result<u64, Error>;

    /// pending -> rejected for every other offer on the request. Zero rows is fine.
    async fn reject_other_offers(&mut self, request_id: Uuid, offer_id: Uuid)
        -> Result<u64, Error>;

    async fn commit(self: Box<Self>) -> Result<(), Error>;
    async fn rollback(self: Box<Self>) -> Result<(), Error>;
}
