//! Domain-facing access to the shared game document.

use std::{sync::Arc, time::SystemTime};

use futures::StreamExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        game_store::GameStore,
        models::GameEntity,
        storage::{StorageError, StorageResult},
    },
    domain::Game,
    state::update::GameUpdate,
};

/// Message delivered to a subscriber's inbox.
#[derive(Debug)]
pub enum RemoteEvent {
    /// The document as it is now.
    Snapshot(Box<Game>),
    /// The document is gone; no further snapshots follow.
    Deleted,
}

/// Live subscription to one document. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Create, read, patch and subscribe over a [`GameStore`], speaking domain types.
#[derive(Clone)]
pub struct SyncAdapter {
    store: Arc<dyn GameStore>,
}

fn decode(entity: GameEntity) -> StorageResult<Game> {
    let id = entity.id;
    Game::try_from(entity).map_err(|source| StorageError::Malformed { id, source })
}

impl SyncAdapter {
    /// Adapter speaking to `store`.
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Store a new game document.
    pub async fn create(&self, game: Game) -> StorageResult<Uuid> {
        self.store.create_game(game.into()).await
    }

    /// Current document, if it exists.
    pub async fn read(&self, id: Uuid) -> StorageResult<Option<Game>> {
        self.store.find_game(id).await?.map(decode).transpose()
    }

    /// Push `update` and return the stored write timestamp.
    pub async fn patch(&self, id: Uuid, update: GameUpdate) -> StorageResult<SystemTime> {
        self.store
            .patch_game(id, update.into_patch(SystemTime::now()))
            .await
    }

    /// Forward every snapshot of `id` into `inbox`, starting with the current
    /// document. Returns `None` when the document does not exist.
    pub async fn subscribe<E>(
        &self,
        id: Uuid,
        inbox: mpsc::UnboundedSender<E>,
    ) -> StorageResult<Option<Subscription>>
    where
        E: From<RemoteEvent> + Send + 'static,
    {
        let Some(mut snapshots) = self.store.watch_game(id).await? else {
            return Ok(None);
        };

        let task = tokio::spawn(async move {
            while let Some(entity) = snapshots.next().await {
                let game = match decode(entity) {
                    Ok(game) => game,
                    Err(err) => {
                        warn!(game_id = %id, error = %err, "skipping malformed snapshot");
                        continue;
                    }
                };
                if inbox
                    .send(E::from(RemoteEvent::Snapshot(Box::new(game))))
                    .is_err()
                {
                    return;
                }
            }
            debug!(game_id = %id, "snapshot stream ended");
            let _ = inbox.send(E::from(RemoteEvent::Deleted));
        });

        Ok(Some(Subscription { task }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::game_store::memory::MemoryGameStore,
        domain::{GamePhase, GameSetup},
    };

    fn adapter() -> SyncAdapter {
        SyncAdapter::new(Arc::new(MemoryGameStore::new(8)))
    }

    fn game() -> Game {
        let setup = GameSetup::new(vec!["A".into(), "B".into()], 1, 0).unwrap();
        Game::new("t", setup)
    }

    #[tokio::test]
    async fn subscribers_receive_current_then_patches() {
        let adapter = adapter();
        let id = adapter.create(game()).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel::<RemoteEvent>();
        let _subscription = adapter.subscribe(id, tx).await.unwrap().unwrap();

        let Some(RemoteEvent::Snapshot(first)) = rx.recv().await else {
            panic!("expected the current document");
        };
        assert_eq!(first.current_phase, GamePhase::Bidding);

        adapter.patch(id, GameUpdate::end_game()).await.unwrap();
        let Some(RemoteEvent::Snapshot(second)) = rx.recv().await else {
            panic!("expected the patched document");
        };
        assert!(second.is_completed());
        assert!(second.in_progress_round.is_none());
    }

    #[tokio::test]
    async fn deletion_is_reported_once() {
        let store = Arc::new(MemoryGameStore::new(8));
        let adapter = SyncAdapter::new(store.clone());
        let id = adapter.create(game()).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel::<RemoteEvent>();
        let _subscription = adapter.subscribe(id, tx).await.unwrap().unwrap();
        assert!(matches!(rx.recv().await, Some(RemoteEvent::Snapshot(_))));

        store.delete_game(id).await.unwrap();
        assert!(matches!(rx.recv().await, Some(RemoteEvent::Deleted)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn missing_documents() {
        let adapter = adapter();
        let id = Uuid::new_v4();
        assert!(adapter.read(id).await.unwrap().is_none());
        let (tx, _rx) = mpsc::unbounded_channel::<RemoteEvent>();
        assert!(adapter.subscribe(id, tx).await.unwrap().is_none());
        assert!(matches!(
            adapter.patch(id, GameUpdate::end_game()).await,
            Err(StorageError::Missing { .. })
        ));
    }
}
