pub mod bidding;
pub mod round_lifecycle;
pub mod timer;
pub mod update;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig, dao::game_store::GameStore, dao::share_cache::ShareCache,
    services::table_session::TableHandle,
};

/// State shared by every handler.
pub type SharedState = Arc<AppState>;

/// Central application state: the document store, mounted tables and share codes.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
    tables: DashMap<Uuid, TableHandle>,
    shares: ShareCache,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, shares: ShareCache) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            game_store: RwLock::new(None),
            degraded: degraded_tx,
            tables: DashMap::new(),
            shares,
            config,
        })
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn install_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.set_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.set_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn set_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Mounted table sessions keyed by viewer id.
    pub fn tables(&self) -> &DashMap<Uuid, TableHandle> {
        &self.tables
    }

    /// Share code cache.
    pub fn shares(&self) -> &ShareCache {
        &self.shares
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::game_store::memory::MemoryGameStore;

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let state = AppState::new(
            AppConfig::default(),
            ShareCache::load(std::env::temp_dir().join(format!("{}.json", Uuid::new_v4()))).await,
        );
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());

        state
            .install_game_store(Arc::new(MemoryGameStore::new(4)))
            .await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_game_store().await;
        assert!(state.is_degraded());
        assert!(state.game_store().await.is_none());
    }
}
