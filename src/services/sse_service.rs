use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        sse::{Handshake, ServerEvent, SystemStatus},
        table::TableView,
    },
    error::ServiceError,
    services::table_service,
    state::SharedState,
};

const TABLE_EVENT: &str = "table";

/// Open the SSE stream of one viewer's table.
///
/// The stream starts with a `handshake`, then the current view, then every
/// later view. `system` events report degraded mode changes. It ends when
/// the viewer is unmounted.
pub fn table_stream(
    state: &SharedState,
    game_id: Uuid,
    viewer_id: Uuid,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + use<>>, ServiceError> {
    let views = table_service::subscribe(state, game_id, viewer_id)?;
    let degraded = state.degraded_watcher();
    let handshake = ServerEvent::json(
        "handshake".to_string(),
        &Handshake {
            viewer_id,
            game_id,
            degraded: *degraded.borrow(),
        },
    )
    .map_err(|err| ServiceError::InvalidState(format!("cannot encode handshake: {err}")))?;

    Ok(to_sse_stream(handshake, views, degraded, viewer_id))
}

/// Forward view and degraded-mode changes into an SSE response until either
/// side goes away.
fn to_sse_stream(
    handshake: ServerEvent,
    mut views: watch::Receiver<TableView>,
    mut degraded: watch::Receiver<bool>,
    viewer_id: Uuid,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(handshake))).await.is_err() {
            return;
        }
        views.mark_changed();
        degraded.mark_unchanged();

        loop {
            let payload = tokio::select! {
                _ = tx.closed() => break,
                changed = views.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let view = views.borrow_and_update().clone();
                    ServerEvent::json(TABLE_EVENT.to_string(), &view)
                }
                changed = degraded.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let degraded = *degraded.borrow_and_update();
                    ServerEvent::json("system".to_string(), &SystemStatus { degraded })
                }
            };

            match payload {
                Ok(payload) => {
                    if tx.send(Ok(to_event(payload))).await.is_err() {
                        break;
                    }
                }
                Err(err) => warn!(viewer_id = %viewer_id, error = %err, "failed to encode SSE payload"),
            }
        }

        info!(viewer_id = %viewer_id, "table SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::response::IntoResponse;
    use futures::StreamExt;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{game_store::memory::MemoryGameStore, share_cache::ShareCache},
        dto::game::CreateGameRequest,
        services::game_service,
        state::AppState,
    };

    #[tokio::test]
    async fn streams_open_with_a_handshake() {
        let shares =
            ShareCache::load(std::env::temp_dir().join(format!("{}.json", Uuid::new_v4()))).await;
        let state = AppState::new(AppConfig::default(), shares);
        state
            .install_game_store(Arc::new(MemoryGameStore::new(4)))
            .await;
        let game = game_service::create_game(
            &state,
            CreateGameRequest {
                name: "t".into(),
                players: vec!["Ann".into(), "Bob".into()],
                decks: 1,
                first_bidder: Some(0),
            },
        )
        .await
        .unwrap();
        let view = table_service::mount(&state, game.id).await.unwrap();

        let sse = {
            let borrowed = state.clone();
            table_stream(&borrowed, game.id, view.viewer_id).unwrap()
        };
        let mut body = sse.into_response().into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        let first = String::from_utf8(first.to_vec()).unwrap();
        assert!(first.contains("event: handshake"));
        assert!(first.contains(&view.viewer_id.to_string()));

        let second = body.next().await.unwrap().unwrap();
        let second = String::from_utf8(second.to_vec()).unwrap();
        assert!(second.contains("event: table"));
    }

    #[tokio::test]
    async fn streams_for_unknown_viewers_are_refused() {
        let shares = crate::dao::share_cache::ShareCache::load(
            std::env::temp_dir().join(format!("{}.json", Uuid::new_v4())),
        )
        .await;
        let state = crate::state::AppState::new(crate::config::AppConfig::default(), shares);
        assert!(matches!(
            table_stream(&state, Uuid::new_v4(), Uuid::new_v4()),
            Err(ServiceError::NotFound(_))
        ));
    }
}
