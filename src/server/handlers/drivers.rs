use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Affected;
use crate::entities::Driver;
use crate::error::Error;
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    name: String,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<CreateParams>,
) -> Result<Json<Driver>, Error> {
    let driver = api.create_driver(params.name).await?;

    Ok(driver.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, Error> {
    let driver = api.find_driver(id).await?;

    Ok(driver.into())
}

pub async fn start(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, Error> {
    let driver = api.start_driver(id).await?;

    Ok(driver.into())
}

pub async fn stop(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, Error> {
    let driver = api.stop_driver(id).await?;

    Ok(driver.into())
}

pub async fn withdraw_offers(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Affected>, Error> {
    let rows = api.withdraw_all_offers(id).await?;

    Ok(Json(rows.into()))
}
