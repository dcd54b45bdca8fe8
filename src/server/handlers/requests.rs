use axum::extract::{Extension, Json, Path};
use uuid::Uuid;

use super::Affected;
use crate::entities::{NewRequest, ServiceRequest};
use crate::error::Error;
use crate::server::DynAPI;

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Json(draft): Json<NewRequest>,
) -> Result<Json<ServiceRequest>, Error> {
    let request = api.create_request(draft).await?;

    Ok(request.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceRequest>, Error> {
    let request = api.find_request(id).await?;

    Ok(request.into())
}

pub async fn complete(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Affected>, Error> {
    let rows = api.complete_request(id).await?;

    Ok(Json(rows.into()))
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Affected>, Error> {
    let rows = api.cancel_request(id).await?;

    Ok(Json(rows.into()))
}
