use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{game_store::GameStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a document store installed in the shared state, flipping degraded
/// mode while it is unreachable. Runs forever.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, retry_in_ms = delay.as_millis() as u64, "document store connection failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        state.install_game_store(store.clone()).await;
        info!("document store connected; leaving degraded mode");
        delay = INITIAL_DELAY;

        watch_health(&state, store.as_ref()).await;

        warn!("document store lost; reconnecting from scratch");
        state.clear_game_store().await;
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll `store` until it fails and cannot be revived in place.
async fn watch_health(state: &SharedState, store: &dyn GameStore) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded() {
                info!("document store healthy again; leaving degraded mode");
                state.set_degraded(false);
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut reconnect_delay = INITIAL_DELAY;
        let mut revived = false;
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!(attempt, "document store reconnected after failed health check");
                    revived = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(attempt, error = %err, "document store reconnect failed; entering degraded mode");
                        state.set_degraded(true);
                    } else {
                        warn!(attempt, error = %err, "document store reconnect failed");
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if !revived {
            warn!("exhausted document store reconnect attempts");
            return;
        }
        state.set_degraded(false);
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{game_store::memory::MemoryGameStore, share_cache::ShareCache},
        state::AppState,
    };

    #[tokio::test(start_paused = true)]
    async fn retries_until_a_store_connects() {
        let shares =
            ShareCache::load(std::env::temp_dir().join(format!("{}.json", Uuid::new_v4()))).await;
        let state = AppState::new(AppConfig::default(), shares);
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(StorageError::unavailable(
                        "down",
                        std::io::Error::other("refused"),
                    ))
                } else {
                    Ok(Arc::new(MemoryGameStore::new(4)) as Arc<dyn GameStore>)
                }
            }
        }));

        let mut degraded = state.degraded_watcher();
        tokio::time::timeout(Duration::from_secs(30), degraded.wait_for(|value| !*value))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(state.game_store().await.is_some());

        supervisor.abort();
    }
}
