use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{required, Affected};
use crate::entities::{Acceptance, Arbitration, DriverOffer};
use crate::error::Error;
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct SubmitParams {
    driver_id: Option<Uuid>,
    price: Option<i64>,
}

#[derive(Serialize, Deserialize)]
pub struct AcceptParams {
    customer_id: Option<Uuid>,
    offer_id: Option<Uuid>,
    price: Option<i64>,
    payment_method_id: Option<i64>,
}

#[derive(Serialize, Deserialize)]
pub struct RejectCompetingParams {
    driver_id: Option<Uuid>,
}

pub async fn submit(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<SubmitParams>,
) -> Result<Json<Option<DriverOffer>>, Error> {
    let driver_id = required(params.driver_id, "driver_id")?;
    let price = required(params.price, "price")?;

    let offer = api.submit_offer(id, driver_id, price).await?;

    Ok(offer.into())
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DriverOffer>>, Error> {
    let offers = api.list_offers(id).await?;

    Ok(offers.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverOffer>, Error> {
    let offer = api.find_offer(id).await?;

    Ok(offer.into())
}

pub async fn withdraw(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Affected>, Error> {
    let rows = api.withdraw_offer(id).await?;

    Ok(Json(rows.into()))
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<AcceptParams>,
) -> Result<Json<Arbitration>, Error> {
    let acceptance = Acceptance {
        request_id: id,
        customer_id: required(params.customer_id, "customer_id")?,
        offer_id: required(params.offer_id, "offer_id")?,
        price: required(params.price, "price")?,
        payment_method_id: required(params.payment_method_id, "payment_method_id")?,
    };

    let arbitration = api.accept_offer(acceptance).await?;

    Ok(arbitration.into())
}

pub async fn reject_competing(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<RejectCompetingParams>,
) -> Result<Json<Affected>, Error> {
    let driver_id = required(params.driver_id, "driver_id")?;

    let rows = api.reject_competing_offers(id, driver_id).await?;

    Ok(Json(rows.into()))
}
