//! Process-local document store used when no database is configured.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tracing::debug;
use uuid::Uuid;

use super::{GameStore, SnapshotStream, fanout::SnapshotHub};
use crate::dao::{
    models::{GameEntity, GameListItemEntity, GamePatch},
    storage::{StorageError, StorageResult},
};

/// In-memory [`GameStore`] with the same watch semantics as the database backends.
#[derive(Clone, Debug)]
pub struct MemoryGameStore {
    games: Arc<DashMap<Uuid, GameEntity>>,
    hub: SnapshotHub,
}

impl MemoryGameStore {
    /// Empty store whose watchers buffer up to `watch_capacity` snapshots.
    pub fn new(watch_capacity: usize) -> Self {
        Self {
            games: Arc::new(DashMap::new()),
            hub: SnapshotHub::new(watch_capacity),
        }
    }

    fn patch(&self, id: Uuid, mut patch: GamePatch) -> StorageResult<SystemTime> {
        let mut entry = self
            .games
            .get_mut(&id)
            .ok_or(StorageError::Missing { id })?;
        let floor = entry.updated_at + Duration::from_micros(1);
        patch.updated_at = patch.updated_at.max(floor);
        patch.apply_to(&mut entry);
        // publish under the entry lock so watchers see writes in stamp order
        self.hub.publish(&entry);
        Ok(entry.updated_at)
    }

    fn watch(&self, id: Uuid) -> Option<SnapshotStream> {
        let receiver = self.hub.subscribe(id);
        let Some(current) = self.games.get(&id).map(|entry| entry.clone()) else {
            self.hub.close(id);
            return None;
        };
        Some(SnapshotHub::stream(current, receiver))
    }

    #[cfg(test)]
    pub(crate) fn hub(&self) -> &SnapshotHub {
        &self.hub
    }
}

impl GameStore for MemoryGameStore {
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<Uuid>> {
        let store = self.clone();
        Box::pin(async move {
            let id = game.id;
            store.games.insert(id, game);
            debug!(game_id = %id, "stored game in memory");
            Ok(id)
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.games.get(&id).map(|entry| entry.clone())) })
    }

    fn patch_game(
        &self,
        id: Uuid,
        patch: GamePatch,
    ) -> BoxFuture<'static, StorageResult<SystemTime>> {
        let store = self.clone();
        Box::pin(async move { store.patch(id, patch) })
    }

    fn watch_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SnapshotStream>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.watch(id)) })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .games
                .iter()
                .map(|entry| entry.value().clone().into())
                .collect())
        })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let removed = store.games.remove(&id).is_some();
            store.hub.close(id);
            Ok(removed)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::{
        dao::models::PatchField,
        domain::{Game, GamePhase, GameSetup},
    };

    fn entity() -> GameEntity {
        let setup = GameSetup::new(vec!["A".into(), "B".into(), "C".into()], 1, 2).unwrap();
        Game::new("table", setup).into()
    }

    #[tokio::test]
    async fn watchers_see_every_patch() {
        let store = MemoryGameStore::new(8);
        let id = store.create_game(entity()).await.unwrap();
        let mut first = store.watch_game(id).await.unwrap().unwrap();
        let mut second = store.watch_game(id).await.unwrap().unwrap();

        let patch = GamePatch {
            current_phase: Some(GamePhase::Results),
            bidding_phase: PatchField::Remove,
            ..GamePatch::touch()
        };
        store.patch_game(id, patch).await.unwrap();

        for stream in [&mut first, &mut second] {
            let initial = stream.next().await.unwrap();
            assert_eq!(initial.current_phase, GamePhase::Bidding);
            let patched = stream.next().await.unwrap();
            assert_eq!(patched.current_phase, GamePhase::Results);
            assert!(patched.bidding_phase.is_none());
        }
    }

    #[tokio::test]
    async fn write_timestamps_never_go_backwards() {
        let store = MemoryGameStore::new(8);
        let id = store.create_game(entity()).await.unwrap();
        let first = store.patch_game(id, GamePatch::touch()).await.unwrap();
        let mut stale = GamePatch::touch();
        stale.updated_at = first - Duration::from_secs(60);
        let second = store.patch_game(id, stale).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_reach_watchers_in_stamp_order() {
        const WRITERS: usize = 4;
        const WRITES: usize = 25;

        let store = MemoryGameStore::new(WRITERS * WRITES + 1);
        let id = store.create_game(entity()).await.unwrap();
        let stream = store.watch_game(id).await.unwrap().unwrap();

        let writers: Vec<_> = (0..WRITERS)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..WRITES {
                        store.patch_game(id, GamePatch::touch()).await.unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let seen: Vec<_> = stream
            .take(WRITERS * WRITES + 1)
            .map(|entity| entity.updated_at)
            .collect()
            .await;
        assert_eq!(seen.len(), WRITERS * WRITES + 1);
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn patching_a_missing_game_fails() {
        let store = MemoryGameStore::new(8);
        let id = Uuid::new_v4();
        let err = store.patch_game(id, GamePatch::touch()).await.unwrap_err();
        assert!(matches!(err, StorageError::Missing { id: missing } if missing == id));
        assert!(store.watch_game(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_ends_watch_streams() {
        let store = MemoryGameStore::new(8);
        let id = store.create_game(entity()).await.unwrap();
        let mut stream = store.watch_game(id).await.unwrap().unwrap();
        assert!(stream.next().await.is_some());

        assert!(store.delete_game(id).await.unwrap());
        assert!(stream.next().await.is_none());
        assert!(!store.delete_game(id).await.unwrap());
        assert!(store.find_game(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_summarises_games() {
        let store = MemoryGameStore::new(8);
        store.create_game(entity()).await.unwrap();
        let listed = store.list_games().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].players.len(), 3);
        assert_eq!(listed[0].rounds_played, 0);
        assert_eq!(listed[0].max_rounds, 17);
    }
}
