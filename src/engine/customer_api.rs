use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{api::CustomerAPI, entities::Customer, error::{not_found_error, Error}};

#[async_trait]
impl CustomerAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_customer(&self, name: String) -> Result<Customer, Error> {
        let customer = Customer::new(name)?;

        self.store.insert_customer(&customer).await?;

        tracing::info!(customer_id = %customer.id, "customer created");

        Ok(customer)
    }

    #[tracing::instrument(skip(self))]
    async fn find_customer(&self, id: Uuid) -> Result<Customer, Error> {
        self.store
            .find_customer(id)
            .await?
            .ok_or_else(|| not_found_error("customer not found"))
    }
}
