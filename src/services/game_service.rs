use rand::{Rng, distr::Alphanumeric};
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::{
        game::{CreateGameRequest, GameDetail, GameSummary, ShareResponse},
        validation::SHARE_CODE_LENGTH,
    },
    domain::{Game, GameSetup},
    error::ServiceError,
    services::sync_adapter::SyncAdapter,
    state::{SharedState, update::GameUpdate},
};

/// Adapter over the installed document store, or [`ServiceError::Degraded`].
pub async fn adapter(state: &SharedState) -> Result<SyncAdapter, ServiceError> {
    state
        .game_store()
        .await
        .map(SyncAdapter::new)
        .ok_or(ServiceError::Degraded)
}

/// Start a game at round 1 in blind declaration.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<GameDetail, ServiceError> {
    let CreateGameRequest {
        name,
        players,
        decks,
        first_bidder,
    } = request;

    let players: Vec<String> = players.iter().map(|name| name.trim().to_owned()).collect();
    let first_bidder = match first_bidder {
        Some(seat) => seat,
        None if players.is_empty() => 0,
        None => rand::rng().random_range(0..players.len()),
    };
    let setup = GameSetup::new(players, decks, first_bidder)?;
    let game = Game::new(name.trim(), setup);

    let id = adapter(state).await?.create(game.clone()).await?;
    info!(
        game_id = %id,
        players = game.setup.player_count(),
        decks = game.setup.decks,
        max_rounds = game.setup.max_rounds,
        "game created"
    );
    Ok(GameDetail::from(&game))
}

/// Current document for `id`.
pub async fn get_game(state: &SharedState, id: Uuid) -> Result<GameDetail, ServiceError> {
    let game = adapter(state)
        .await?
        .read(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {id}")))?;
    Ok(GameDetail::from(&game))
}

/// Every stored game, newest first.
pub async fn list_games(state: &SharedState) -> Result<Vec<GameSummary>, ServiceError> {
    let store = state.game_store().await.ok_or(ServiceError::Degraded)?;
    let mut games = store.list_games().await?;
    games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(games.into_iter().map(GameSummary::from).collect())
}

/// Remove a game and its share code. Mounted viewers see it disappear.
pub async fn delete_game(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.game_store().await.ok_or(ServiceError::Degraded)?;
    if !store.delete_game(id).await? {
        return Err(ServiceError::NotFound(format!("game {id}")));
    }
    state.shares().remove_game(id).await;
    info!(game_id = %id, "game deleted");
    Ok(())
}

/// Stop a game early, dropping any round in progress.
pub async fn end_game(state: &SharedState, id: Uuid) -> Result<GameDetail, ServiceError> {
    let adapter = adapter(state).await?;
    let game = adapter
        .read(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {id}")))?;
    if game.is_completed() {
        return Err(ServiceError::InvalidState("the game is already over".into()));
    }

    adapter.patch(id, GameUpdate::end_game()).await?;
    info!(game_id = %id, rounds_played = game.rounds.len(), "game ended early");
    get_game(state, id).await
}

/// Share code for `game_id`, issuing one on first use.
pub async fn create_share(state: &SharedState, game_id: Uuid) -> Result<ShareResponse, ServiceError> {
    if adapter(state).await?.read(game_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("game {game_id}")));
    }

    let code = state.shares().code_or_issue(game_id, random_code).await;
    Ok(ShareResponse { code, game_id })
}

/// Game behind a share code.
pub async fn resolve_share(state: &SharedState, code: &str) -> Result<ShareResponse, ServiceError> {
    let record = state
        .shares()
        .resolve(code)
        .await
        .ok_or_else(|| ServiceError::NotFound(format!("share code {code}")))?;
    Ok(ShareResponse {
        code: code.to_owned(),
        game_id: record.game_id,
    })
}

fn random_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_CODE_LENGTH)
        .map(char::from)
        .collect()
}
