use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{
    Acceptance, Arbitration, Customer, Driver, DriverOffer, NewRequest, Payment, ServiceRequest,
};
use crate::error::Error;

#[async_trait]
pub trait CustomerAPI {
    async fn create_customer(&self, name: String) -> Result<Customer, Error>;

    async fn find_customer(&self, id: Uuid) -> Result<Customer, Error>;
}

#[async_trait]
pub trait DriverAPI {
    async fn create_driver(&self, name: String) -> Result<Driver, Error>;

    async fn find_driver(&self, id: Uuid) -> Result<Driver, Error>;

    async fn start_driver(&self, id: Uuid) -> Result<Driver, Error>;

    /// Takes the driver offline and withdraws every offer still pending.
    async fn stop_driver(&self, id: Uuid) -> Result<Driver, Error>;
}

#[async_trait]
pub trait RequestAPI {
    async fn create_request(&self, draft: NewRequest) -> Result<ServiceRequest, Error>;

    async fn find_request(&self, id: Uuid) -> Result<ServiceRequest, Error>;

    async fn list_requests(&self, customer_id: Uuid) -> Result<Vec<ServiceRequest>, Error>;

    async fn complete_request(&self, id: Uuid) -> Result<u64, Error>;

    async fn cancel_request(&self, id: Uuid) -> Result<u64, Error>;
}

#[async_trait]
pub trait OfferAPI {
    /// Returns `None` when the request is no longer open for offers.
    async fn submit_offer(
        &self,
        request_id: Uuid,
        driver_id: Uuid,
        price: i64,
    ) -> Result<Option<DriverOffer>, Error>;

    async fn find_offer(&self, id: Uuid) -> Result<DriverOffer, Error>;

    async fn list_offers(&self, request_id: Uuid) -> Result<Vec<DriverOffer>, Error>;

    async fn withdraw_offer(&self, id: Uuid) -> Result<u64, Error>;

    async fn withdraw_all_offers(&self, driver_id: Uuid) -> Result<u64, Error>;

    async fn accept_offer(&self, acceptance: Acceptance) -> Result<Arbitration, Error>;

    async fn reject_competing_offers(&self, request_id: Uuid, driver_id: Uuid)
        -> Result<u64, Error>;
}

#[async_trait]
pub trait PaymentAPI {
    async fn find_payment(&self, id: Uuid) -> Result<Payment, Error>;
}

pub trait API: CustomerAPI + DriverAPI + RequestAPI + OfferAPI + PaymentAPI {}
