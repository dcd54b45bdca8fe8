use super::helpers::{fetch_request, unmatched_request_error};
use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::RequestAPI,
    entities::{NewRequest, ServiceRequest},
    error::{not_found_error, Error},
    notifier::Event,
};

#[async_trait]
impl RequestAPI for Engine {
    #[tracing::instrument(skip(self, draft), fields(customer_id = %draft.customer_id))]
    async fn create_request(&self, draft: NewRequest) -> Result<ServiceRequest, Error> {
        let request = ServiceRequest::new(draft)?;

        if self.store.find_customer(request.customer_id).await?.is_none() {
            return Err(not_found_error("customer not found"));
        }

        self.store.insert_request(&request).await?;

        tracing::info!(request_id = %request.id, "request created");

        self.notifier.publish(
            request.id,
            Event::RequestCreated {
                request_id: request.id,
            },
        );

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn find_request(&self, id: Uuid) -> Result<ServiceRequest, Error> {
        fetch_request(self.store.as_ref(), id).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_requests(&self, customer_id: Uuid) -> Result<Vec<ServiceRequest>, Error> {
        self.store.list_requests(customer_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn complete_request(&self, id: Uuid) -> Result<u64, Error> {
        let rows = self.store.complete_request(id).await?;

        if rows == 0 {
            tracing::info!("no accepted request to complete");
            return Err(unmatched_request_error(self.store.as_ref(), id, "complete").await);
        }

        tracing::info!("request completed");

        self.notifier
            .publish(id, Event::RequestCompleted { request_id: id });

        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_request(&self, id: Uuid) -> Result<u64, Error> {
        let rows = self.store.cancel_request(id).await?;

        if rows == 0 {
            tracing::info!("no open request to cancel");
            return Err(unmatched_request_error(self.store.as_ref(), id, "cancel").await);
        }

        tracing::info!("request cancelled");

        self.notifier
            .publish(id, Event::RequestCancelled { request_id: id });

        Ok(rows)
    }
}
