mod arbitration;
mod customer_api;
mod driver_api;
mod helpers;
mod offer_api;
mod payment_api;
mod request_api;

use std::sync::Arc;

use crate::{api::API, notifier::Notifier, store::Store};

/// Brokers requests and offers over an injected store, announcing committed changes
/// through the notifier.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    notifier: Notifier,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }
}

impl API for Engine {}
