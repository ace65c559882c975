//! Application startup and server initialization.
//!
//! This module wires the store, identity providers, session issuer and
//! mailbox into an `AppState` and serves the router.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::auth::Auth;
use crate::config::ConfigV1;
use crate::mailbox::Mailbox;
use crate::metrics::Metrics;
use crate::models::session::SessionIssuer;
use crate::providers::ProviderRegistry;
use crate::routes;
use crate::state::AppState;
use crate::store::{create_store, Store};

/// Builds the application state around an already created store.
///
/// Fails when the backend keys cannot be loaded or a provider is misconfigured.
pub fn build_state_with_store(
    config: Arc<ConfigV1>,
    store: Arc<dyn Store>,
) -> Result<AppState, String> {
    let sessions = Arc::new(SessionIssuer::new(&config.backend, &config.session)?);
    let providers = Arc::new(ProviderRegistry::new(&config.providers)?);
    let metrics = Metrics::new();

    let auth = Arc::new(Auth::new(
        providers.clone(),
        store.clone(),
        sessions.clone(),
        metrics.clone(),
    ));
    let mailbox = Arc::new(Mailbox::new(
        store.clone(),
        metrics.clone(),
        &config.mailbox,
    ));

    Ok(AppState {
        auth,
        providers,
        sessions,
        store,
        mailbox,
        metrics,
    })
}

/// Builds the application state, creating the store from the configuration.
pub async fn build_state(config: Arc<ConfigV1>) -> Result<AppState, String> {
    let store = create_store(&config.store).await;
    build_state_with_store(config, store)
}

/// Initializes and runs the application server.
///
/// Binds to the address specified in the configuration and serves requests
/// until the process is stopped.
///
/// # Errors
///
/// Returns an error if the state cannot be built, the address cannot be bound,
/// or the server stops with a runtime error.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(config.clone()).await.map_err(|e| {
        error!("Failed to initialise application: {}", e);
        e
    })?;

    info!(
        "Mailbox unlocks at {}, listing order {:?}",
        state.mailbox.unlock_at(),
        config.mailbox.order
    );
    info!("Starting server on {}", config.bind_address);

    let app = routes::create_router(state);
    let listener = TcpListener::bind(&config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
