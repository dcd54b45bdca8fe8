//! Offer arbitration: picking the winning offer of a request as one atomic unit.
//!
//! The guarded `pending -> accepted` update on the request is the only step that can
//! succeed once per request. Everything after it runs in the same transaction, so a
//! losing racer (a second accept, or a cancel that got there first) sees zero rows and
//! leaves before touching payments or offers.

use super::Engine;

use crate::{
    entities::{Acceptance, Arbitration},
    error::{not_found_error, Error},
    notifier::Event,
    store::Transaction,
};

impl Engine {
    pub(super) async fn arbitrate(&self, acceptance: Acceptance) -> Result<Arbitration, Error> {
        acceptance.validate()?;

        let mut tx = self.store.begin().await?;

        let arbitration = match run(tx.as_mut(), &acceptance).await {
            Ok(arbitration) => arbitration,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }

                tracing::info!(error = %err, "acceptance rolled back");
                return Err(err);
            }
        };

        tx.commit().await?;

        tracing::info!(
            offer_id = %arbitration.offer_id,
            payment_id = %arbitration.payment_id,
            rejected = arbitration.rejected_offers,
            "offer accepted"
        );

        self.notifier.publish(
            arbitration.request_id,
            Event::OfferAccepted {
                request_id: arbitration.request_id,
                offer_id: arbitration.offer_id,
                price: arbitration.price,
                payment_id: arbitration.payment_id,
            },
        );

        if arbitration.rejected_offers > 0 {
            self.notifier.publish(
                arbitration.request_id,
                Event::OffersRejected {
                    request_id: arbitration.request_id,
                    count: arbitration.rejected_offers,
                },
            );
        }

        Ok(arbitration)
    }
}

async fn run(tx: &mut dyn Transaction, acceptance: &Acceptance) -> Result<Arbitration, Error> {
    let Acceptance {
        request_id,
        customer_id,
        offer_id,
        price,
        payment_method_id,
    } = *acceptance;

    if tx
        .accept_request(request_id, customer_id, offer_id)
        .await?
        == 0
    {
        return Err(not_found_error(
            "no matching open request for this customer",
        ));
    }

    let payment_id = tx
        .upsert_payment(customer_id, payment_method_id, price)
        .await?;

    if tx
        .attach_payment(request_id, customer_id, payment_id)
        .await?
        == 0
    {
        return Err(not_found_error("request vanished while booking"));
    }

    if tx.accept_offer(offer_id, request_id, price).await? == 0 {
        return Err(not_found_error(
            "no pending offer with this id on the request",
        ));
    }

    let rejected_offers = tx.reject_other_offers(request_id, offer_id).await?;

    Ok(Arbitration {
        request_id,
        offer_id,
        payment_id,
        price,
        rejected_offers,
    })
}
