use axum::extract::{Extension, Json, Path};
use uuid::Uuid;

use crate::entities::Payment;
use crate::error::Error;
use crate::server::DynAPI;

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, Error> {
    let payment = api.find_payment(id).await?;

    Ok(payment.into())
}
