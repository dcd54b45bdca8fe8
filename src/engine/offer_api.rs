use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::OfferAPI,
    entities::{Acceptance, Arbitration, DriverOffer},
    error::{not_found_error, Error},
    notifier::Event,
};

#[async_trait]
impl OfferAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn submit_offer(
        &self,
        request_id: Uuid,
        driver_id: Uuid,
        price: i64,
    ) -> Result<Option<DriverOffer>, Error> {
        let offer = DriverOffer::new(request_id, driver_id, price)?;

        // the store checks driver availability under the same lock as the request
        if self.store.insert_offer(&offer).await? == 0 {
            tracing::info!("request is not open for offers, ignoring");
            return Ok(None);
        }

        tracing::info!(offer_id = %offer.id, "offer submitted");

        self.notifier.publish(
            request_id,
            Event::OfferSubmitted {
                request_id,
                offer_id: offer.id,
                driver_id,
                price,
            },
        );

        Ok(Some(offer))
    }

    #[tracing::instrument(skip(self))]
    async fn find_offer(&self, id: Uuid) -> Result<DriverOffer, Error> {
        self.store
            .find_offer(id)
            .await?
            .ok_or_else(|| not_found_error("offer not found"))
    }

    #[tracing::instrument(skip(self))]
    async fn list_offers(&self, request_id: Uuid) -> Result<Vec<DriverOffer>, Error> {
        self.store.list_offers(request_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn withdraw_offer(&self, id: Uuid) -> Result<u64, Error> {
        let offer = self.find_offer(id).await?;

        let rows = self.store.withdraw_offer(id).await?;

        if rows > 0 {
            tracing::info!("offer withdrawn");

            self.notifier.publish(
                offer.request_id,
                Event::OfferWithdrawn {
                    request_id: offer.request_id,
                    offer_id: id,
                },
            );
        }

        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn withdraw_all_offers(&self, driver_id: Uuid) -> Result<u64, Error> {
        let withdrawn = self.store.withdraw_all_offers(driver_id).await?;

        for offer in withdrawn.iter() {
            self.notifier.publish(
                offer.request_id,
                Event::OfferWithdrawn {
                    request_id: offer.request_id,
                    offer_id: offer.id,
                },
            );
        }

        tracing::info!(count = withdrawn.len(), "withdrew pending offers");

        Ok(withdrawn.len() as u64)
    }

    #[tracing::instrument(skip(self), fields(request_id = %acceptance.request_id))]
    async fn accept_offer(&self, acceptance: Acceptance) -> Result<Arbitration, Error> {
        self.arbitrate(acceptance).await
    }

    #[tracing::instrument(skip(self))]
    async fn reject_competing_offers(
        &self,
        request_id: Uuid,
        driver_id: Uuid,
    ) -> Result<u64, Error> {
        let rows = self
            .store
            .reject_competing_offers(request_id, driver_id)
            .await?;

        if rows > 0 {
            self.notifier.publish(
                request_id,
                Event::OffersRejected {
                    request_id,
                    count: rows,
                },
            );
        }

        Ok(rows)
    }
}
