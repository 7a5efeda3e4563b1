//! Old Heck Back binary entrypoint wiring REST, SSE and the document store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use old_heck_back::{
    config::AppConfig,
    dao::{game_store::memory::MemoryGameStore, share_cache::ShareCache},
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let shares = ShareCache::load(config.share_cache_path.clone()).await;
    let app_state = AppState::new(config, shares);

    start_storage(app_state.clone()).await;
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Use MongoDB when `MONGO_URI` is set, the in-memory store otherwise.
async fn start_storage(state: SharedState) {
    #[cfg(feature = "mongo-store")]
    {
        use old_heck_back::{
            dao::{
                game_store::{
                    GameStore,
                    mongodb::{MongoConfig, MongoGameStore},
                },
                storage::StorageError,
            },
            services::storage_supervisor,
        };

        if env::var_os("MONGO_URI").is_some() {
            let watch_capacity = state.config().watch_capacity;
            info!("MONGO_URI set; supervising MongoDB document store");
            tokio::spawn(storage_supervisor::run(state, move || async move {
                let config = MongoConfig::from_env().await?;
                let store = MongoGameStore::connect(config, watch_capacity).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>)
            }));
            return;
        }
    }

    info!("using in-memory document store; games are lost on restart");
    let capacity = state.config().watch_capacity;
    state
        .install_game_store(Arc::new(MemoryGameStore::new(capacity)))
        .await;
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
                warn!(error = %err, "cannot listen for SIGTERM; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
