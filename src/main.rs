//! Countdown backend entrypoint wiring the settings store, the countdown runtime and the HTTP/SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use countdown_back::{
    clock::{SharedClock, SystemClock},
    config::AppConfig,
    dao::settings_store::{StoreHandle, memory::MemorySettingsStore},
    routes,
    services::countdown_service::CountdownRuntime,
    state::{AppState, SharedState, engine::CountdownEngine},
};

/// Selects the settings store implementation (`postgrest` or `memory`).
const STORE_BACKEND_ENV: &str = "COUNTDOWN_STORE_BACKEND";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let clock: SharedClock = Arc::new(SystemClock);
    let store = build_store(&config, clock.clone());

    let engine = CountdownEngine::new(
        store,
        clock,
        config.bootstrap.clone(),
        config.request_timeout,
    );
    let app_state = AppState::new(Arc::new(engine));

    // Initial load happens here; a failure leaves the engine errored and the supervisor retrying.
    let runtime = CountdownRuntime::start(app_state.clone()).await;
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    drop(runtime);
    info!("countdown runtime stopped");
    Ok(())
}

/// Pick the settings store from the environment; missing credentials yield an unconfigured handle.
fn build_store(config: &AppConfig, clock: SharedClock) -> StoreHandle {
    let backend = env::var(STORE_BACKEND_ENV).unwrap_or_else(|_| "postgrest".into());
    match backend.as_str() {
        "memory" => {
            info!("using in-memory countdown store; data is lost on restart");
            StoreHandle::connected(MemorySettingsStore::new(clock))
        }
        "postgrest" => postgrest_store(config),
        other => {
            warn!(backend = other, "unknown store backend; serving unconfigured");
            StoreHandle::unconfigured(format!("unknown store backend `{other}`"))
        }
    }
}

#[cfg(feature = "postgrest-store")]
fn postgrest_store(config: &AppConfig) -> StoreHandle {
    use countdown_back::dao::settings_store::postgrest::{PostgrestConfig, PostgrestSettingsStore};

    let store_config = match PostgrestConfig::from_env() {
        Ok(store_config) => store_config
            .with_request_timeout(config.request_timeout)
            .with_poll_interval(config.change_poll_interval),
        Err(err) => {
            warn!(error = %err, "countdown store is not configured");
            return StoreHandle::unconfigured(err.to_string());
        }
    };

    match PostgrestSettingsStore::new(store_config) {
        Ok(store) => {
            info!("using PostgREST countdown store");
            StoreHandle::connected(store)
        }
        Err(err) => {
            warn!(error = %err, "failed to build PostgREST client");
            StoreHandle::unconfigured(err.to_string())
        }
    }
}

#[cfg(not(feature = "postgrest-store"))]
fn postgrest_store(_config: &AppConfig) -> StoreHandle {
    warn!("built without the postgrest-store feature");
    StoreHandle::unconfigured("built without the postgrest-store feature")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
