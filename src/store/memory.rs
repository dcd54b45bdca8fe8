use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, Transaction};
use crate::entities::{
    Customer, Driver, DriverOffer, DriverStatus, Payment, RequestStatus, ServiceRequest,
};
use crate::error::{conflict_error, invalid_state_error, not_found_error, Error};

#[derive(Clone, Debug, Default)]
struct Tables {
    customers: HashMap<Uuid, Customer>,
    drivers: HashMap<Uuid, Driver>,
    requests: HashMap<Uuid, ServiceRequest>,
    offers: HashMap<Uuid, DriverOffer>,
    payments: HashMap<Uuid, Payment>,
}

impl Tables {
    fn accept_request(&mut self, request_id: Uuid, customer_id: Uuid, offer_id: Uuid) -> u64 {
        match self.requests.get_mut(&request_id) {
            Some(request) if request.customer_id == customer_id => {
                request.accept(offer_id, Utc::now()).map_or(0, |_| 1)
            }
            _ => 0,
        }
    }

    fn upsert_payment(&mut self, customer_id: Uuid, payment_method_id: i64, amount: i64) -> Uuid {
        if let Some(payment) = self
            .payments
            .values_mut()
            .find(|payment| payment.is_keyed_on(customer_id, payment_method_id))
        {
            payment.restart(amount);
            return payment.id;
        }

        let payment = Payment::new(customer_id, payment_method_id, amount);
        let id = payment.id;
        self.payments.insert(id, payment);

        id
    }

    fn attach_payment(&mut self, request_id: Uuid, customer_id: Uuid, payment_id: Uuid) -> u64 {
        match self.requests.get_mut(&request_id) {
            Some(request) if request.customer_id == customer_id => {
                request.attach_payment(payment_id);
                1
            }
            _ => 0,
        }
    }

    fn accept_offer(&mut self, offer_id: Uuid, request_id: Uuid, price: i64) -> u64 {
        match self.offers.get_mut(&offer_id) {
            Some(offer) if offer.request_id == request_id => offer.accept(price).map_or(0, |_| 1),
            _ => 0,
        }
    }

    fn reject_offers<P>(&mut self, include_accepted: bool, predicate: P) -> Vec<DriverOffer>
    where
        P: Fn(&DriverOffer) -> bool,
    {
        self.offers
            .values_mut()
            .filter(|offer| predicate(offer))
            .filter_map(|offer| match offer.reject(include_accepted) {
                Ok(()) => Some(offer.clone()),
                Err(_) => None,
            })
            .collect()
    }

    fn request_status(&self, request_id: Uuid) -> Option<RequestStatus> {
        self.requests.get(&request_id).map(|request| request.status)
    }
}

/// In-process store. A transaction owns the table lock until it finishes, so
/// transactions are fully serialized.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, Error> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();

        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<(), Error> {
        let mut tables = self.tables.lock().await;
        if tables.customers.contains_key(&customer.id) {
            return Err(conflict_error("customer already exists"));
        }

        tables.customers.insert(customer.id, customer.clone());

        Ok(())
    }

    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, Error> {
        Ok(self.tables.lock().await.customers.get(&id).cloned())
    }

    async fn insert_driver(&self, driver: &Driver) -> Result<(), Error> {
        let mut tables = self.tables.lock().await;
        if tables.drivers.contains_key(&driver.id) {
            return Err(conflict_error("driver already exists"));
        }

        tables.drivers.insert(driver.id, driver.clone());

        Ok(())
    }

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, Error> {
        Ok(self.tables.lock().await.drivers.get(&id).cloned())
    }

    async fn set_driver_status(
        &self,
        id: Uuid,
        from: DriverStatus,
        to: DriverStatus,
    ) -> Result<u64, Error> {
        let mut tables = self.tables.lock().await;

        match tables.drivers.get_mut(&id) {
            Some(driver) if driver.status == from => {
                driver.status = to;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn insert_request(&self, request: &ServiceRequest) -> Result<(), Error> {
        let mut tables = self.tables.lock().await;
        if !tables.customers.contains_key(&request.customer_id) {
            return Err(not_found_error("customer not found"));
        }

        tables.requests.insert(request.id, request.clone());

        Ok(())
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<ServiceRequest>, Error> {
        Ok(self.tables.lock().await.requests.get(&id).cloned())
    }

    async fn list_requests(&self, customer_id: Uuid) -> Result<Vec<ServiceRequest>, Error> {
        let tables = self.tables.lock().await;

        let mut requests: Vec<ServiceRequest> = tables
            .requests
            .values()
            .filter(|request| request.customer_id == customer_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));

        Ok(requests)
    }

    async fn complete_request(&self, id: Uuid) -> Result<u64, Error> {
        let mut tables = self.tables.lock().await;

        match tables.requests.get_mut(&id) {
            Some(request) => Ok(request.complete().map_or(0, |_| 1)),
            None => Ok(0),
        }
    }

    async fn cancel_request(&self, id: Uuid) -> Result<u64, Error> {
        let mut tables = self.tables.lock().await;

        let cancelled = match tables.requests.get_mut(&id) {
            Some(request) => request.cancel().is_ok(),
            None => false,
        };

        if !cancelled {
            return Ok(0);
        }

        tables.reject_offers(true, |offer| offer.request_id == id);

        Ok(1)
    }

    async fn insert_offer(&self, offer: &DriverOffer) -> Result<u64, Error> {
        let mut tables = self.tables.lock().await;

        let open = tables
            .requests
            .get(&offer.request_id)
            .map_or(false, ServiceRequest::is_pending);
        if !open {
            return Ok(0);
        }

        match tables.drivers.get(&offer.driver_id) {
            Some(driver) if driver.is_available() => {}
            Some(_) => return Err(invalid_state_error("driver is not available")),
            None => return Err(not_found_error("driver not found")),
        }

        tables.offers.insert(offer.id, offer.clone());

        Ok(1)
    }

    async fn find_offer(&self, id: Uuid) -> Result<Option<DriverOffer>, Error> {
        Ok(self.tables.lock().await.offers.get(&id).cloned())
    }

    async fn list_offers(&self, request_id: Uuid) -> Result<Vec<DriverOffer>, Error> {
        let tables = self.tables.lock().await;

        let mut offers: Vec<DriverOffer> = tables
            .offers
            .values()
            .filter(|offer| offer.request_id == request_id)
            .cloned()
            .collect();
        offers.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(offers)
    }

    async fn withdraw_offer(&self, id: Uuid) -> Result<u64, Error> {
        let mut tables = self.tables.lock().await;

        match tables.offers.get_mut(&id) {
            Some(offer) => Ok(offer.reject(false).map_or(0, |_| 1)),
            None => Ok(0),
        }
    }

    async fn withdraw_all_offers(&self, driver_id: Uuid) -> Result<Vec<DriverOffer>, Error> {
        let mut tables = self.tables.lock().await;

        Ok(tables.reject_offers(false, |offer| offer.driver_id == driver_id))
    }

    async fn reject_competing_offers(
        &self,
        request_id: Uuid,
        driver_id: Uuid,
    ) -> Result<u64, Error> {
        let mut tables = self.tables.lock().await;

        let booked = tables
            .request_status(request_id)
            .map_or(false, |status| status.is_booked());

        if !booked {
            return Ok(0);
        }

        let rejected = tables.reject_offers(false, |offer| {
            offer.request_id == request_id && offer.driver_id != driver_id
        });

        Ok(rejected.len() as u64)
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, Error> {
        Ok(self.tables.lock().await.payments.get(&id).cloned())
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn accept_request(
        &mut self,
        request_id: Uuid,
        customer_id: Uuid,
        offer_id: Uuid,
    ) -> Result<u64, Error> {
        Ok(self
            .working
            .accept_request(request_id, customer_id, offer_id))
    }

    async fn upsert_payment(
        &mut self,
        customer_id: Uuid,
        payment_method_id: i64,
        amount: i64,
    ) -> Result<Uuid, Error> {
        Ok(self
            .working
            .upsert_payment(customer_id, payment_method_id, amount))
    }

    async fn attach_payment(
        &mut self,
        request_id: Uuid,
        customer_id: Uuid,
        payment_id: Uuid,
    ) -> Result<u64, Error> {
        Ok(self
            .working
            .attach_payment(request_id, customer_id, payment_id))
    }

    async fn accept_offer(
        &mut self,
        offer_id: Uuid,
        request_id: Uuid,
        price: i64,
    ) -> Result<u64, Error> {
        Ok(self.working.accept_offer(offer_id, request_id, price))
    }

    async fn reject_other_offers(
        &mut self,
        request_id: Uuid,
        offer_id: Uuid,
    ) -> Result<u64, Error> {
        let rejected = self.working.reject_offers(false, |offer| {
            offer.request_id == request_id && offer.id != offer_id
        });

        Ok(rejected.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), Error> {
        Ok(())
    }
}

#[tokio::test]
async fn dropped_transaction_leaves_no_trace() {
    use crate::entities::{NewRequest, Place};

    let store = MemoryStore::new();
    let customer = Customer::new("Grace".into()).unwrap();
    store.insert_customer(&customer).await.unwrap();

    let request = ServiceRequest::new(NewRequest {
        customer_id: customer.id,
        pickup: Place::new("A", 1.0, 1.0),
        dropoff: Place::new("B", 2.0, 2.0),
        vehicle_type: "car".into(),
        note: None,
    })
    .unwrap();
    store.insert_request(&request).await.unwrap();

    {
        let mut tx = store.begin().await.unwrap();
        let rows = tx
            .accept_request(request.id, customer.id, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    let stored = store.find_request(request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
    assert_eq!(stored.chosen_offer_id, None);
}

#[tokio::test]
async fn offers_need_an_open_request_and_an_available_driver() {
    use crate::entities::{NewRequest, Place};

    let store = MemoryStore::new();
    let customer = Customer::new("Ivy".into()).unwrap();
    store.insert_customer(&customer).await.unwrap();

    let duplicate = store.insert_customer(&customer).await.unwrap_err();
    assert!(duplicate.is_conflict_error());

    let request = ServiceRequest::new(NewRequest {
        customer_id: customer.id,
        pickup: Place::new("A", 1.0, 1.0),
        dropoff: Place::new("B", 2.0, 2.0),
        vehicle_type: "car".into(),
        note: None,
    })
    .unwrap();
    store.insert_request(&request).await.unwrap();

    let driver = Driver::new("Otto".into()).unwrap();
    store.insert_driver(&driver).await.unwrap();

    let offer = DriverOffer::new(request.id, driver.id, 1200).unwrap();
    let err = store.insert_offer(&offer).await.unwrap_err();
    assert!(err.is_invalid_state_error());

    store
        .set_driver_status(driver.id, DriverStatus::Idle, DriverStatus::Available)
        .await
        .unwrap();
    assert_eq!(store.insert_offer(&offer).await.unwrap(), 1);

    store.cancel_request(request.id).await.unwrap();
    let late = DriverOffer::new(request.id, driver.id, 1100).unwrap();
    assert_eq!(store.insert_offer(&late).await.unwrap(), 0);
}
