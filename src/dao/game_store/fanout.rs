//! In-process fan-out of document snapshots to watchers.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::SnapshotStream;
use crate::dao::models::GameEntity;

/// Per-document broadcast channels shared by a store and its watchers.
#[derive(Clone, Debug)]
pub struct SnapshotHub {
    channels: Arc<DashMap<Uuid, broadcast::Sender<GameEntity>>>,
    capacity: usize,
}

impl SnapshotHub {
    /// Hub whose channels buffer up to `capacity` snapshots per document.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Start receiving snapshots of `id`. Call before reading the current
    /// document so no write can slip between the read and the subscription.
    pub fn subscribe(&self, id: Uuid) -> broadcast::Receiver<GameEntity> {
        self.channels
            .entry(id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Push a snapshot to every watcher of its document.
    pub fn publish(&self, entity: &GameEntity) {
        let delivered = match self.channels.get(&entity.id) {
            Some(sender) => sender.send(entity.clone()).is_ok(),
            None => return,
        };
        if !delivered {
            self.channels
                .remove_if(&entity.id, |_, sender| sender.receiver_count() == 0);
        }
    }

    /// Close every stream watching `id`.
    pub fn close(&self, id: Uuid) {
        if self.channels.remove(&id).is_some() {
            debug!(game_id = %id, "closed snapshot channel");
        }
    }

    /// Stream yielding `current` followed by every published snapshot.
    ///
    /// A watcher that falls behind skips to the newest snapshots; each one
    /// carries the full document.
    pub fn stream(
        current: GameEntity,
        mut receiver: broadcast::Receiver<GameEntity>,
    ) -> SnapshotStream {
        Box::pin(async_stream::stream! {
            let id = current.id;
            yield current;
            loop {
                match receiver.recv().await {
                    Ok(entity) => {
                        yield entity;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(game_id = %id, skipped, "snapshot watcher lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::domain::{Game, GameSetup};

    fn entity() -> GameEntity {
        let setup = GameSetup::new(vec!["A".into(), "B".into()], 1, 0).unwrap();
        Game::new("t", setup).into()
    }

    #[tokio::test]
    async fn stream_starts_with_current_and_follows_publishes() {
        let hub = SnapshotHub::new(4);
        let current = entity();
        let receiver = hub.subscribe(current.id);
        let mut stream = SnapshotHub::stream(current.clone(), receiver);

        let mut next = current.clone();
        next.name = "renamed".into();
        next.updated_at = current.updated_at + std::time::Duration::from_millis(1);
        hub.publish(&next);

        assert_eq!(stream.next().await, Some(current.clone()));
        assert_eq!(stream.next().await.map(|e| e.name), Some("renamed".into()));

        hub.close(current.id);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn publishing_without_watchers_is_a_no_op() {
        let hub = SnapshotHub::new(4);
        let current = entity();
        hub.publish(&current);

        let receiver = hub.subscribe(current.id);
        drop(receiver);
        hub.publish(&current);
        assert!(hub.channels.is_empty());
    }
}
