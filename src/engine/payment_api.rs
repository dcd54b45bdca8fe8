use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{api::PaymentAPI, entities::Payment, error::{not_found_error, Error}};

#[async_trait]
impl PaymentAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn find_payment(&self, id: Uuid) -> Result<Payment, Error> {
        self.store
            .find_payment(id)
            .await?
            .ok_or_else(|| not_found_error("payment not found"))
    }
}
