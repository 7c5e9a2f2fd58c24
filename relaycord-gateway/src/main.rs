//! Gateway process entry point: loads configuration, connects to the
//! store and bus, constructs the shared [`relaycord_registry::Registry`],
//! and serves the WebSocket upgrade route.

use std::sync::Arc;

use relaycord_bus::BusConsumer;
use relaycord_gateway::config::Config;
use relaycord_gateway::error::BootstrapError;
use relaycord_gateway::{router, GatewayState};
use relaycord_registry::Registry;
use relaycord_store::ScyllaStoreAdapter;

#[cfg(feature = "performance")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), BootstrapError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions { release: sentry::release_name!(), ..Default::default() },
        ))
    });

    let store: Arc<dyn relaycord_store::StoreAdapter> = Arc::new(
        ScyllaStoreAdapter::connect(&config.scylla_hosts, &config.scylla_user, &config.scylla_password)
            .await?,
    );

    let registry = Arc::new(Registry::new());

    let bus = BusConsumer::connect(&config.kafka_hosts, &config.kafka_group_id)?;
    tokio::spawn(bus.run(Arc::clone(&registry)));

    let state = GatewayState { registry, store };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| BootstrapError::Bind(config.bind_addr.clone(), e))?;

    tracing::info!(addr = %config.bind_addr, "gateway listening");
    axum::serve(listener, app).await.map_err(|e| BootstrapError::Bind(config.bind_addr.clone(), e))?;

    Ok(())
}
