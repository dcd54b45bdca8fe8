use std::sync::Arc;

use haul::config::{Config, StoreKind};
use haul::engine::Engine;
use haul::error::Error;
use haul::notifier::Notifier;
use haul::server::serve;
use haul::store::{MemoryStore, PgStore, Store};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let store: Arc<dyn Store> = match config.store {
        StoreKind::Postgres => Arc::new(
            PgStore::connect(
                &config.database_url,
                config.database_max_connections,
                config.database_acquire_timeout,
            )
            .await?,
        ),
        StoreKind::Memory => {
            tracing::warn!("using the in-memory store, state is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let (notifier, relay) =
        Notifier::new(config.notification_queue_size, config.room_buffer_size);
    tokio::spawn(relay.run());

    let engine = Engine::new(store, notifier.clone());

    serve(engine, notifier, config.http_addr()?).await
}
