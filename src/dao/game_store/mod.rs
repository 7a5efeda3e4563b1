pub mod fanout;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{GameEntity, GameListItemEntity, GamePatch};
use crate::dao::storage::StorageResult;
use futures::{future::BoxFuture, stream::BoxStream};
use std::time::SystemTime;
use uuid::Uuid;

/// Live sequence of full document snapshots, starting with the current one.
pub type SnapshotStream = BoxStream<'static, GameEntity>;

/// Abstraction over the shared game document store.
///
/// Writes are last-write-wins per field. Every successful write is pushed to
/// the streams returned by [`GameStore::watch_game`].
pub trait GameStore: Send + Sync {
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<Uuid>>;
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Returns the stored write timestamp, which never goes backwards for a
    /// document. Fails with
    /// [`StorageError::Missing`](crate::dao::storage::StorageError::Missing)
    /// when the document does not exist.
    fn patch_game(
        &self,
        id: Uuid,
        patch: GamePatch,
    ) -> BoxFuture<'static, StorageResult<SystemTime>>;
    /// `None` when the document does not exist. The stream ends when the
    /// document is deleted.
    fn watch_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SnapshotStream>>>;
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>>;
    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
