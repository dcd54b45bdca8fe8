use uuid::Uuid;

use crate::{
    entities::{Driver, ServiceRequest},
    error::{invalid_state_error, not_found_error, Error},
    store::Store,
};

#[tracing::instrument(skip(store))]
pub async fn fetch_request(store: &dyn Store, id: Uuid) -> Result<ServiceRequest, Error> {
    store
        .find_request(id)
        .await?
        .ok_or_else(|| not_found_error("request not found"))
}

#[tracing::instrument(skip(store))]
pub async fn fetch_driver(store: &dyn Store, id: Uuid) -> Result<Driver, Error> {
    store
        .find_driver(id)
        .await?
        .ok_or_else(|| not_found_error("driver not found"))
}

/// Explains a guarded request update that matched no row.
#[tracing::instrument(skip(store))]
pub async fn unmatched_request_error(store: &dyn Store, id: Uuid, action: &str) -> Error {
    match store.find_request(id).await {
        Ok(Some(request)) if request.status.is_terminal() => invalid_state_error(format!(
            "cannot {action} a request that is already {}",
            request.status.name()
        )),
        Ok(_) => not_found_error(format!("nothing to {action}")),
        Err(err) => err,
    }
}
