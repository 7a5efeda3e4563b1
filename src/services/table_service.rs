use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::{
    domain::GameStatus,
    dto::table::TableView,
    error::ServiceError,
    services::{
        game_service,
        table_session::{TableCommand, TableHandle},
    },
    state::SharedState,
};

/// Start a viewer session on `game_id` and return its first view.
pub async fn mount(state: &SharedState, game_id: Uuid) -> Result<TableView, ServiceError> {
    let adapter = game_service::adapter(state).await?;
    let handle = TableHandle::mount(adapter, game_id, state.config()).await?;
    let view = handle.view();
    let views = handle.subscribe();
    state.tables().insert(handle.viewer_id(), handle);
    spawn_reaper(state, game_id, view.viewer_id, views);
    Ok(view)
}

/// How long a finished session stays readable before it is dropped.
const FINISHED_TABLE_GRACE: Duration = Duration::from_secs(30);

/// Drop the session once its game is over or gone, after a grace period so
/// clients can still read the final view.
fn spawn_reaper(
    state: &SharedState,
    game_id: Uuid,
    viewer_id: Uuid,
    mut views: watch::Receiver<TableView>,
) {
    let state = Arc::downgrade(state);
    tokio::spawn(async move {
        let finished = views
            .wait_for(|view| view.error.is_some() || view.status == GameStatus::Completed)
            .await
            .is_ok();
        if !finished {
            return;
        }
        tokio::time::sleep(FINISHED_TABLE_GRACE).await;

        if let Some(state) = state.upgrade()
            && state
                .tables()
                .remove_if(&viewer_id, |_, handle| handle.game_id() == game_id)
                .is_some()
        {
            info!(game_id = %game_id, viewer_id = %viewer_id, "finished table reaped");
        }
    });
}

/// Latest view published by a viewer session.
pub fn view(state: &SharedState, game_id: Uuid, viewer_id: Uuid) -> Result<TableView, ServiceError> {
    with_table(state, game_id, viewer_id, TableHandle::view)
}

/// Follow every view a session publishes.
pub fn subscribe(
    state: &SharedState,
    game_id: Uuid,
    viewer_id: Uuid,
) -> Result<watch::Receiver<TableView>, ServiceError> {
    with_table(state, game_id, viewer_id, TableHandle::subscribe)
}

/// Stop a viewer session. Writes it already pushed stay in the document.
pub fn unmount(state: &SharedState, game_id: Uuid, viewer_id: Uuid) -> Result<(), ServiceError> {
    state
        .tables()
        .remove_if(&viewer_id, |_, handle| handle.game_id() == game_id)
        .map(|_| info!(game_id = %game_id, viewer_id = %viewer_id, "viewer left the table"))
        .ok_or_else(|| missing(viewer_id))
}

/// Run a table command on behalf of a viewer.
pub async fn dispatch(
    state: &SharedState,
    game_id: Uuid,
    viewer_id: Uuid,
    command: TableCommand,
) -> Result<TableView, ServiceError> {
    // The map guard must not be held across the await.
    let (dispatcher, handle_game) = {
        let handle = state
            .tables()
            .get(&viewer_id)
            .ok_or_else(|| missing(viewer_id))?;
        (handle.dispatcher(), handle.game_id())
    };
    if handle_game != game_id {
        return Err(missing(viewer_id));
    }
    dispatcher.dispatch(command).await
}

fn with_table<T>(
    state: &SharedState,
    game_id: Uuid,
    viewer_id: Uuid,
    read: impl FnOnce(&TableHandle) -> T,
) -> Result<T, ServiceError> {
    state
        .tables()
        .get(&viewer_id)
        .filter(|handle| handle.game_id() == game_id)
        .map(|handle| read(&handle))
        .ok_or_else(|| missing(viewer_id))
}

fn missing(viewer_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("viewer {viewer_id}"))
}
