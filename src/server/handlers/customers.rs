use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Customer, ServiceRequest};
use crate::error::Error;
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    name: String,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<CreateParams>,
) -> Result<Json<Customer>, Error> {
    let customer = api.create_customer(params.name).await?;

    Ok(customer.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, Error> {
    let customer = api.find_customer(id).await?;

    Ok(customer.into())
}

pub async fn list_requests(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ServiceRequest>>, Error> {
    let requests = api.list_requests(id).await?;

    Ok(requests.into())
}
