mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};

use crate::server::handlers::{customers, drivers, offers, payments, requests, rooms};
use crate::{api::API, error::{unexpected_error, Error}, notifier::Notifier};

pub type DynAPI = Arc<dyn API + Send + Sync>;

pub fn router(api: DynAPI, notifier: Notifier) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/customers", post(customers::create))
        .route("/customers/:id", get(customers::find))
        .route("/customers/:id/requests", get(customers::list_requests))
        .route("/drivers", post(drivers::create))
        .route("/drivers/:id", get(drivers::find))
        .route("/drivers/:id/start", patch(drivers::start))
        .route("/drivers/:id/stop", patch(drivers::stop))
        .route("/drivers/:id/offers/withdraw", patch(drivers::withdraw_offers))
        .route("/requests", post(requests::create))
        .route("/requests/:id", get(requests::find))
        .route("/requests/:id/offers", get(offers::list).post(offers::submit))
        .route("/requests/:id/offers/reject", patch(offers::reject_competing))
        .route("/requests/:id/accept", patch(offers::accept))
        .route("/requests/:id/complete", patch(requests::complete))
        .route("/requests/:id/cancel", patch(requests::cancel))
        .route("/requests/:id/ws", get(rooms::subscribe))
        .route("/offers/:id", get(offers::find))
        .route("/offers/:id/withdraw", patch(offers::withdraw))
        .route("/payments/:id", get(payments::find))
        .layer(Extension(api))
        .layer(Extension(notifier))
}

pub async fn serve<T: API + Sync + Send + 'static>(
    api: T,
    notifier: Notifier,
    addr: SocketAddr,
) -> Result<(), Error> {
    let app = router(Arc::new(api) as DynAPI, notifier);

    let server = axum::Server::try_bind(&addr)
        .map_err(|err| unexpected_error(format!("failed to bind {addr}: {err}")))?;

    tracing::info!("listening on {}", addr);

    server
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| unexpected_error(format!("server error: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }

    tracing::info!("shutting down");
}
