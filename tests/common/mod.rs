#![allow(dead_code)]

use std::sync::Arc;

use haul::api::{CustomerAPI, DriverAPI, OfferAPI, RequestAPI};
use haul::engine::Engine;
use haul::entities::{Acceptance, Customer, Driver, DriverOffer, NewRequest, Place, ServiceRequest};
use haul::notifier::Notifier;
use haul::store::{MemoryStore, Store};

pub struct Fixture {
    pub engine: Arc<Engine>,
    pub store: Arc<dyn Store>,
    pub notifier: Notifier,
    pub customer: Customer,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new())).await
    }

    pub async fn with_store(store: Arc<dyn Store>) -> Self {
        let (notifier, relay) = Notifier::new(256, 64);
        tokio::spawn(relay.run());

        let engine = Arc::new(Engine::new(store.clone(), notifier.clone()));
        let customer = engine.create_customer("Margaret".into()).await.unwrap();

        Self {
            engine,
            store,
            notifier,
            customer,
        }
    }

    pub async fn available_driver(&self, name: &str) -> Driver {
        let driver = self.engine.create_driver(name.into()).await.unwrap();
        self.engine.start_driver(driver.id).await.unwrap()
    }

    pub async fn request(&self) -> ServiceRequest {
        self.engine
            .create_request(draft(self.customer.id))
            .await
            .unwrap()
    }

    pub async fn offer(&self, request: &ServiceRequest, driver: &Driver, price: i64) -> DriverOffer {
        self.engine
            .submit_offer(request.id, driver.id, price)
            .await
            .unwrap()
            .expect("request should be open for offers")
    }

    pub fn acceptance(&self, request: &ServiceRequest, offer: &DriverOffer) -> Acceptance {
        Acceptance {
            request_id: request.id,
            customer_id: self.customer.id,
            offer_id: offer.id,
            price: offer.price,
            payment_method_id: 7,
        }
    }
}

pub fn draft(customer_id: uuid::Uuid) -> NewRequest {
    NewRequest {
        customer_id,
        pickup: Place::new("Central station", 52.525, 13.369),
        dropoff: Place::new("Airport terminal 1", 52.364, 13.509),
        vehicle_type: "sedan".into(),
        note: Some("two suitcases".into()),
    }
}
