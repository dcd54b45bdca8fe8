mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use uuid::Uuid;

use common::Fixture;
use haul::api::{OfferAPI, PaymentAPI, RequestAPI};
use haul::entities::{
    Customer, Driver, DriverOffer, DriverStatus, OfferStatus, Payment, PaymentStatus,
    RequestStatus, ServiceRequest,
};
use haul::error::{store_unavailable_error, Error};
use haul::store::{MemoryStore, Store, Transaction};

#[tokio::test]
async fn accepting_an_offer_books_the_request() {
    let fixture = Fixture::new().await;
    let request = fixture.request().await;
    let driver_a = fixture.available_driver("Ayo").await;
    let driver_b = fixture.available_driver("Bea").await;

    let offer_a = fixture.offer(&request, &driver_a, 5000).await;
    let offer_b = fixture.offer(&request, &driver_b, 4000).await;

    let arbitration = fixture
        .engine
        .accept_offer(fixture.acceptance(&request, &offer_b))
        .await
        .unwrap();

    assert_eq!(arbitration.offer_id, offer_b.id);
    assert_eq!(arbitration.rejected_offers, 1);

    let request = fixture.engine.find_request(request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Accepted);
    assert_eq!(request.chosen_offer_id, Some(offer_b.id));
    assert_eq!(request.payment_id, Some(arbitration.payment_id));
    assert!(request.booked_at.is_some());
    assert!(request.is_consistent());

    let offer_a = fixture.engine.find_offer(offer_a.id).await.unwrap();
    let offer_b = fixture.engine.find_offer(offer_b.id).await.unwrap();
    assert_eq!(offer_a.status, OfferStatus::Rejected);
    assert_eq!(offer_b.status, OfferStatus::Accepted);
    assert_eq!(offer_b.price, 4000);

    let payment = fixture
        .engine
        .find_payment(arbitration.payment_id)
        .await
        .unwrap();
    assert_eq!(payment.customer_id, fixture.customer.id);
    assert_eq!(payment.amount, 4000);
    assert_eq!(payment.payment_method_id, 7);
    assert_eq!(payment.status, PaymentStatus::Pending);

    let err = fixture
        .engine
        .accept_offer(fixture.acceptance(&request, &offer_a))
        .await
        .unwrap_err();
    assert!(err.is_not_found_error());
}

#[tokio::test]
async fn accepted_price_overrides_the_offered_price() {
    let fixture = Fixture::new().await;
    let request = fixture.request().await;
    let driver = fixture.available_driver("Cruz").await;
    let offer = fixture.offer(&request, &driver, 5000).await;

    let mut acceptance = fixture.acceptance(&request, &offer);
    acceptance.price = 4500;

    fixture.engine.accept_offer(acceptance).await.unwrap();

    let offer = fixture.engine.find_offer(offer.id).await.unwrap();
    assert_eq!(offer.price, 4500);
}

#[tokio::test]
async fn retrying_an_accept_is_not_found_and_changes_nothing() {
    let fixture = Fixture::new().await;
    let request = fixture.request().await;
    let driver_a = fixture.available_driver("Dara").await;
    let driver_b = fixture.available_driver("Eli").await;
    let offer = fixture.offer(&request, &driver_a, 3000).await;
    fixture.offer(&request, &driver_b, 3100).await;

    let acceptance = fixture.acceptance(&request, &offer);
    let first = fixture.engine.accept_offer(acceptance).await.unwrap();

    let request_after_first = fixture.engine.find_request(request.id).await.unwrap();
    let offers_after_first = fixture.engine.list_offers(request.id).await.unwrap();
    let payment_after_first = fixture.engine.find_payment(first.payment_id).await.unwrap();

    let err = fixture.engine.accept_offer(acceptance).await.unwrap_err();
    assert!(err.is_not_found_error());

    assert_eq!(
        fixture.engine.find_request(request.id).await.unwrap(),
        request_after_first
    );
    assert_eq!(
        fixture.engine.list_offers(request.id).await.unwrap(),
        offers_after_first
    );
    assert_eq!(
        fixture.engine.find_payment(first.payment_id).await.unwrap(),
        payment_after_first
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_accepts_produce_one_winner() {
    let fixture = Fixture::new().await;
    let request = fixture.request().await;

    let mut offers = Vec::new();
    for i in 0..8 {
        let driver = fixture.available_driver(&format!("driver-{i}")).await;
        offers.push(fixture.offer(&request, &driver, 2000 + i * 100).await);
    }

    let attempts = offers.iter().map(|offer| {
        let engine = fixture.engine.clone();
        let acceptance = fixture.acceptance(&request, offer);
        tokio::spawn(async move { engine.accept_offer(acceptance).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(Error::is_not_found_error));

    let offers = fixture.engine.list_offers(request.id).await.unwrap();
    let accepted: Vec<_> = offers
        .iter()
        .filter(|offer| offer.status == OfferStatus::Accepted)
        .collect();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].id, winners[0].offer_id);
    assert!(offers
        .iter()
        .filter(|offer| offer.id != winners[0].offer_id)
        .all(|offer| offer.status == OfferStatus::Rejected));

    let request = fixture.engine.find_request(request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Accepted);
    assert_eq!(request.chosen_offer_id, Some(winners[0].offer_id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn accept_racing_cancel_leaves_a_consistent_request() {
    for _ in 0..20 {
        let fixture = Fixture::new().await;
        let request = fixture.request().await;
        let driver_a = fixture.available_driver("Fen").await;
        let driver_b = fixture.available_driver("Gus").await;
        let offer = fixture.offer(&request, &driver_a, 2500).await;
        fixture.offer(&request, &driver_b, 2600).await;

        let accept = {
            let engine = fixture.engine.clone();
            let acceptance = fixture.acceptance(&request, &offer);
            tokio::spawn(async move { engine.accept_offer(acceptance).await })
        };
        let cancel = {
            let engine = fixture.engine.clone();
            let id = request.id;
            tokio::spawn(async move { engine.cancel_request(id).await })
        };

        let accepted = accept.await.unwrap();
        let cancelled = cancel.await.unwrap();

        // cancel is allowed from both pending and accepted, so it always lands
        assert_eq!(cancelled.unwrap(), 1);
        if let Err(err) = accepted {
            assert!(err.is_not_found_error());
        }

        let request = fixture.engine.find_request(request.id).await.unwrap();
        assert_eq!(request.status, RequestStatus::Cancelled);
        assert!(request.is_consistent());

        let offers = fixture.engine.list_offers(request.id).await.unwrap();
        assert!(offers
            .iter()
            .all(|offer| offer.status == OfferStatus::Rejected));
    }
}

#[tokio::test]
async fn failed_step_rolls_back_every_change() {
    let fixture = Fixture::new().await;
    let request = fixture.request().await;
    let driver = fixture.available_driver("Hal").await;
    let offer = fixture.offer(&request, &driver, 1800).await;

    // an offer id from another request fails the offer step after the request and
    // payment steps already ran inside the transaction
    let other_request = fixture.request().await;
    let foreign_offer = fixture.offer(&other_request, &driver, 1900).await;

    let mut acceptance = fixture.acceptance(&request, &offer);
    acceptance.offer_id = foreign_offer.id;

    let err = fixture.engine.accept_offer(acceptance).await.unwrap_err();
    assert!(err.is_not_found_error());

    let request_after = fixture.engine.find_request(request.id).await.unwrap();
    assert_eq!(request_after, request);

    let offers = fixture.engine.list_offers(request.id).await.unwrap();
    assert_eq!(offers, vec![offer.clone()]);

    let foreign_after = fixture.engine.find_offer(foreign_offer.id).await.unwrap();
    assert_eq!(foreign_after.status, OfferStatus::Pending);

    // the request is still open, so the customer can retry with the right offer
    let arbitration = fixture
        .engine
        .accept_offer(fixture.acceptance(&request, &offer))
        .await
        .unwrap();
    assert_eq!(arbitration.offer_id, offer.id);
}

#[tokio::test]
async fn accept_by_another_customer_is_not_found() {
    let fixture = Fixture::new().await;
    let request = fixture.request().await;
    let driver = fixture.available_driver("Ivo").await;
    let offer = fixture.offer(&request, &driver, 2100).await;

    let mut acceptance = fixture.acceptance(&request, &offer);
    acceptance.customer_id = Uuid::new_v4();

    let err = fixture.engine.accept_offer(acceptance).await.unwrap_err();
    assert!(err.is_not_found_error());

    let request = fixture.engine.find_request(request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
}

#[tokio::test]
async fn missing_fields_are_rejected_before_touching_the_store() {
    let fixture = Fixture::new().await;
    let request = fixture.request().await;
    let driver = fixture.available_driver("Jun").await;
    let offer = fixture.offer(&request, &driver, 2100).await;

    let mut acceptance = fixture.acceptance(&request, &offer);
    acceptance.payment_method_id = 0;

    let err = fixture.engine.accept_offer(acceptance).await.unwrap_err();
    assert!(err.is_invalid_argument_error());

    let mut acceptance = fixture.acceptance(&request, &offer);
    acceptance.offer_id = Uuid::nil();

    let err = fixture.engine.accept_offer(acceptance).await.unwrap_err();
    assert!(err.is_invalid_argument_error());
}

#[tokio::test]
async fn payment_is_upserted_per_customer_and_method() {
    let fixture = Fixture::new().await;
    let driver = fixture.available_driver("Kit").await;

    let first_request = fixture.request().await;
    let first_offer = fixture.offer(&first_request, &driver, 3000).await;
    let first = fixture
        .engine
        .accept_offer(fixture.acceptance(&first_request, &first_offer))
        .await
        .unwrap();

    let second_request = fixture.request().await;
    let second_offer = fixture.offer(&second_request, &driver, 4200).await;
    let second = fixture
        .engine
        .accept_offer(fixture.acceptance(&second_request, &second_offer))
        .await
        .unwrap();

    assert_eq!(first.payment_id, second.payment_id);

    let payment = fixture.engine.find_payment(second.payment_id).await.unwrap();
    assert_eq!(payment.amount, 4200);

    let third_request = fixture.request().await;
    let third_offer = fixture.offer(&third_request, &driver, 1000).await;
    let mut acceptance = fixture.acceptance(&third_request, &third_offer);
    acceptance.payment_method_id = 8;
    let third = fixture.engine.accept_offer(acceptance).await.unwrap();

    assert_ne!(third.payment_id, first.payment_id);
}

#[tokio::test]
async fn reject_competing_offers_is_idempotent_and_guarded() {
    let fixture = Fixture::new().await;
    let request = fixture.request().await;
    let driver_a = fixture.available_driver("Lea").await;
    let driver_b = fixture.available_driver("Max").await;
    fixture.offer(&request, &driver_a, 2000).await;
    let competing = fixture.offer(&request, &driver_b, 2100).await;

    // nothing is swept while the request is still open
    let rows = fixture
        .engine
        .reject_competing_offers(request.id, driver_a.id)
        .await
        .unwrap();
    assert_eq!(rows, 0);
    assert_eq!(
        fixture.engine.find_offer(competing.id).await.unwrap().status,
        OfferStatus::Pending
    );

    // arbitration already sweeps competitors, so a follow-up run changes nothing
    let offers = fixture.engine.list_offers(request.id).await.unwrap();
    let winner = offers
        .iter()
        .find(|offer| offer.driver_id == driver_a.id)
        .unwrap();
    fixture
        .engine
        .accept_offer(fixture.acceptance(&request, winner))
        .await
        .unwrap();

    let before = fixture.engine.list_offers(request.id).await.unwrap();
    for _ in 0..2 {
        let rows = fixture
            .engine
            .reject_competing_offers(request.id, driver_a.id)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }
    assert_eq!(fixture.engine.list_offers(request.id).await.unwrap(), before);
}

/// Delegates to a memory store but refuses every commit once `failing` is set.
#[derive(Default)]
struct CommitFailingStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl CommitFailingStore {
    fn fail_commits(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

struct CommitFailingTransaction {
    inner: Box<dyn Transaction>,
    fail_commit: bool,
}

#[async_trait]
impl Transaction for CommitFailingTransaction {
    async fn accept_request(
        &mut self,
        request_id: Uuid,
        customer_id: Uuid,
        offer_id: Uuid,
    ) -> Result<u64, Error> {
        self.inner
            .accept_request(request_id, customer_id, offer_id)
            .await
    }

    async fn upsert_payment(
        &mut self,
        customer_id: Uuid,
        payment_method_id: i64,
        amount: i64,
    ) -> Result<Uuid, Error> {
        self.inner
            .upsert_payment(customer_id, payment_method_id, amount)
            .await
    }

    async fn attach_payment(
        &mut self,
        request_id: Uuid,
        customer_id: Uuid,
        payment_id: Uuid,
    ) -> Result<u64, Error> {
        self.inner
            .attach_payment(request_id, customer_id, payment_id)
            .await
    }

    async fn accept_offer(
        &mut self,
        offer_id: Uuid,
        request_id: Uuid,
        price: i64,
    ) -> Result<u64, Error> {
        self.inner.accept_offer(offer_id, request_id, price).await
    }

    async fn reject_other_offers(
        &mut self,
        request_id: Uuid,
        offer_id: Uuid,
    ) -> Result<u64, Error> {
        self.inner.reject_other_offers(request_id, offer_id).await
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        if !self.fail_commit {
            return self.inner.commit().await;
        }

        self.inner.rollback().await?;

        Err(store_unavailable_error("connection reset during commit"))
    }

    async fn rollback(self: Box<Self>) -> Result<(), Error> {
        self.inner.rollback().await
    }
}

#[async_trait]
impl Store for CommitFailingStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, Error> {
        let inner = self.inner.begin().await?;

        Ok(Box::new(CommitFailingTransaction {
            inner,
            fail_commit: self.failing.load(Ordering::SeqCst),
        }))
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<(), Error> {
        self.inner.insert_customer(customer).await
    }

    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, Error> {
        self.inner.find_customer(id).await
    }

    async fn insert_driver(&self, driver: &Driver) -> Result<(), Error> {
        self.inner.insert_driver(driver).await
    }

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, Error> {
        self.inner.find_driver(id).await
    }

    async fn set_driver_status(
        &self,
        id: Uuid,
        from: DriverStatus,
        to: DriverStatus,
    ) -> Result<u64, Error> {
        self.inner.set_driver_status(id, from, to).await
    }

    async fn insert_request(&self, request: &ServiceRequest) -> Result<(), Error> {
        self.inner.insert_request(request).await
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<ServiceRequest>, Error> {
        self.inner.find_request(id).await
    }

    async fn list_requests(&self, customer_id: Uuid) -> Result<Vec<ServiceRequest>, Error> {
        self.inner.list_requests(customer_id).await
    }

    async fn complete_request(&self, id: Uuid) -> Result<u64, Error> {
        self.inner.complete_request(id).await
    }

    async fn cancel_request(&self, id: Uuid) -> Result<u64, Error> {
        self.inner.cancel_request(id).await
    }

    async fn insert_offer(&self, offer: &DriverOffer) -> Result<u64, Error> {
        self.inner.insert_offer(offer).await
    }

    async fn find_offer(&self, id: Uuid) -> Result<Option<DriverOffer>, Error> {
        self.inner.find_offer(id).await
    }

    async fn list_offers(&self, request_id: Uuid) -> Result<Vec<DriverOffer>, Error> {
        self.inner.list_offers(request_id).await
    }

    async fn withdraw_offer(&self, id: Uuid) -> Result<u64, Error> {
        self.inner.withdraw_offer(id).await
    }

    async fn withdraw_all_offers(&self, driver_id: Uuid) -> Result<Vec<DriverOffer>, Error> {
        self.inner.withdraw_all_offers(driver_id).await
    }

    async fn reject_competing_offers(
        &self,
        request_id: Uuid,
        driver_id: Uuid,
    ) -> Result<u64, Error> {
        self.inner
            .reject_competing_offers(request_id, driver_id)
            .await
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, Error> {
        self.inner.find_payment(id).await
    }
}

#[tokio::test]
async fn commit_failure_leaves_no_trace() {
    let store = Arc::new(CommitFailingStore::default());
    store.fail_commits();
    let fixture = Fixture::with_store(store).await;
    let request = fixture.request().await;
    let driver_a = fixture.available_driver("Nia").await;
    let driver_b = fixture.available_driver("Oz").await;
    let offer = fixture.offer(&request, &driver_a, 2700).await;
    fixture.offer(&request, &driver_b, 2800).await;

    let offers_before = fixture.engine.list_offers(request.id).await.unwrap();

    let err = fixture
        .engine
        .accept_offer(fixture.acceptance(&request, &offer))
        .await
        .unwrap_err();
    assert!(err.is_store_unavailable_error());

    assert_eq!(
        fixture.engine.find_request(request.id).await.unwrap(),
        request
    );
    assert_eq!(
        fixture.engine.list_offers(request.id).await.unwrap(),
        offers_before
    );
}

#[tokio::test]
async fn failed_acceptances_leave_an_existing_payment_untouched() {
    let store = Arc::new(CommitFailingStore::default());
    let fixture = Fixture::with_store(store.clone()).await;
    let driver = fixture.available_driver("Pax").await;

    let booked_request = fixture.request().await;
    let booked_offer = fixture.offer(&booked_request, &driver, 3000).await;
    let booked = fixture
        .engine
        .accept_offer(fixture.acceptance(&booked_request, &booked_offer))
        .await
        .unwrap();
    let payment_before = fixture.engine.find_payment(booked.payment_id).await.unwrap();

    // same customer and payment method, so the payment step refreshes that row
    let request = fixture.request().await;
    let offer = fixture.offer(&request, &driver, 4500).await;

    let elsewhere = fixture.request().await;
    let foreign_offer = fixture.offer(&elsewhere, &driver, 4600).await;
    let mut acceptance = fixture.acceptance(&request, &offer);
    acceptance.offer_id = foreign_offer.id;

    let err = fixture.engine.accept_offer(acceptance).await.unwrap_err();
    assert!(err.is_not_found_error());
    assert_eq!(
        fixture.engine.find_payment(booked.payment_id).await.unwrap(),
        payment_before
    );

    store.fail_commits();

    let err = fixture
        .engine
        .accept_offer(fixture.acceptance(&request, &offer))
        .await
        .unwrap_err();
    assert!(err.is_store_unavailable_error());

    let payment_after = fixture.engine.find_payment(booked.payment_id).await.unwrap();
    assert_eq!(payment_after.amount, 3000);
    assert_eq!(payment_after.updated_at, payment_before.updated_at);
    assert_eq!(
        fixture.engine.find_request(request.id).await.unwrap().status,
        RequestStatus::Pending
    );
}
