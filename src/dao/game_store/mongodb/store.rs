use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::{Bson, DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoGameDocument, doc_id},
};
use crate::dao::{
    game_store::{GameStore, SnapshotStream, fanout::SnapshotHub},
    models::{GameEntity, GameListItemEntity, GamePatch, PatchField},
    storage::StorageResult,
};

const GAME_COLLECTION_NAME: &str = "games";

/// MongoDB-backed [`GameStore`].
///
/// Snapshots are fanned out from this process only: watchers see writes made
/// through the same store instance.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
    hub: SnapshotHub,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        self.state.write().await.database = database;
        Ok(())
    }
}

fn encode<T: Serialize>(id: Uuid, field: &'static str, value: &T) -> MongoResult<Bson> {
    mongodb::bson::serialize_to_bson(value)
        .map_err(|source| MongoDaoError::EncodeField { id, field, source })
}

fn encode_field<T: Serialize>(
    id: Uuid,
    field: &'static str,
    value: PatchField<T>,
    set: &mut Document,
    unset: &mut Document,
) -> MongoResult<()> {
    match value {
        PatchField::Keep => {}
        PatchField::Set(value) => {
            set.insert(field, encode(id, field, &value)?);
        }
        PatchField::Remove => {
            unset.insert(field, "");
        }
    }
    Ok(())
}

/// `$set`/`$unset` update equivalent to applying `patch`. The write
/// timestamp only ever moves forward.
fn update_document(id: Uuid, patch: GamePatch) -> MongoResult<Document> {
    let mut set = Document::new();
    let mut unset = Document::new();

    if let Some(rounds) = patch.rounds {
        set.insert("rounds", encode(id, "rounds", &rounds)?);
    }
    if let Some(phase) = patch.current_phase {
        set.insert("currentPhase", encode(id, "currentPhase", &phase)?);
    }
    if let Some(status) = patch.status {
        set.insert("status", encode(id, "status", &status)?);
    }
    encode_field(
        id,
        "inProgressRound",
        patch.in_progress_round,
        &mut set,
        &mut unset,
    )?;
    encode_field(id, "biddingPhase", patch.bidding_phase, &mut set, &mut unset)?;

    let mut update = doc! {
        "$max": { "updatedAt": DateTime::from_system_time(patch.updated_at) },
    };
    if !set.is_empty() {
        update.insert("$set", set);
    }
    if !unset.is_empty() {
        update.insert("$unset", unset);
    }
    Ok(update)
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig, watch_capacity: usize) -> MongoResult<Self> {
        let database =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
            hub: SnapshotHub::new(watch_capacity),
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"createdAt": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("game_created_at_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_COLLECTION_NAME,
                index: "createdAt",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoGameDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    async fn create_game(&self, game: GameEntity) -> MongoResult<Uuid> {
        let id = game.id;
        let document: MongoGameDocument = game.into();
        self.collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::InsertGame { id, source })?;
        debug!(game_id = %id, "inserted game document");
        Ok(id)
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        self.collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadGame { id, source })?
            .map(GameEntity::try_from)
            .transpose()
    }

    async fn patch_game(&self, id: Uuid, patch: GamePatch) -> MongoResult<SystemTime> {
        let update = update_document(id, patch)?;
        let updated = self
            .collection()
            .await
            .find_one_and_update(doc_id(id), update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::PatchGame { id, source })?
            .ok_or(MongoDaoError::MissingGame { id })?;

        let entity = GameEntity::try_from(updated)?;
        self.inner.hub.publish(&entity);
        Ok(entity.updated_at)
    }

    async fn watch_game(&self, id: Uuid) -> MongoResult<Option<SnapshotStream>> {
        let receiver = self.inner.hub.subscribe(id);
        match self.find_game(id).await? {
            Some(current) => Ok(Some(SnapshotHub::stream(current, receiver))),
            None => {
                self.inner.hub.close(id);
                Ok(None)
            }
        }
    }

    async fn list_games(&self) -> MongoResult<Vec<GameListItemEntity>> {
        let documents: Vec<MongoGameDocument> = self
            .collection()
            .await
            .find(doc! {})
            .sort(doc! {"createdAt": -1})
            .await
            .map_err(|source| MongoDaoError::ListGames { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListGames { source })?;

        documents
            .into_iter()
            .map(|document| GameEntity::try_from(document).map(Into::into))
            .collect()
    }

    async fn delete_game(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .collection()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteGame { id, source })?;
        self.inner.hub.close(id);
        Ok(result.deleted_count > 0)
    }
}

impl GameStore for MongoGameStore {
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<Uuid>> {
        let store = self.clone();
        Box::pin(async move { store.create_game(game).await.map_err(Into::into) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn patch_game(
        &self,
        id: Uuid,
        patch: GamePatch,
    ) -> BoxFuture<'static, StorageResult<SystemTime>> {
        let store = self.clone();
        Box::pin(async move { store.patch_game(id, patch).await.map_err(Into::into) })
    }

    fn watch_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SnapshotStream>>> {
        let store = self.clone();
        Box::pin(async move { store.watch_game(id).await.map_err(Into::into) })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_games().await.map_err(Into::into) })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_game(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
