use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;
use validator::ValidationError;

use crate::{
    dto::{
        game::{CreateGameRequest, GameDetail, GameSummary, ShareResponse},
        validation::validate_share_code,
    },
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Game document and share link endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", get(list_games).post(create_game))
        .route("/games/{id}", get(get_game).delete(delete_game))
        .route("/games/{id}/end", post(end_game))
        .route("/games/{id}/share", post(create_share))
        .route("/share/{code}", get(resolve_share))
}

/// List stored games, newest first.
#[utoipa::path(
    get,
    path = "/games",
    tag = "game",
    responses((status = 200, description = "Stored games", body = [GameSummary]))
)]
pub async fn list_games(
    State(state): State<SharedState>,
) -> Result<Json<Vec<GameSummary>>, AppError> {
    Ok(Json(game_service::list_games(&state).await?))
}

/// Start a new game at round 1.
#[utoipa::path(
    post,
    path = "/games",
    tag = "game",
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = GameDetail),
        (status = 400, description = "Invalid table setup")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<(StatusCode, Json<GameDetail>), AppError> {
    let game = game_service::create_game(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

/// Fetch the full game document.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game document", body = GameDetail),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameDetail>, AppError> {
    Ok(Json(game_service::get_game(&state, id).await?))
}

/// Delete a game; viewers following it are told it no longer exists.
#[utoipa::path(
    delete,
    path = "/games/{id}",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 204, description = "Game deleted"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn delete_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    game_service::delete_game(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// End a game before its last round.
#[utoipa::path(
    post,
    path = "/games/{id}/end",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game ended", body = GameDetail),
        (status = 404, description = "Unknown game"),
        (status = 409, description = "Game already over")
    )
)]
pub async fn end_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameDetail>, AppError> {
    Ok(Json(game_service::end_game(&state, id).await?))
}

/// Issue (or reuse) the share code of a game.
#[utoipa::path(
    post,
    path = "/games/{id}/share",
    tag = "share",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Share code", body = ShareResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn create_share(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShareResponse>, AppError> {
    Ok(Json(game_service::create_share(&state, id).await?))
}

/// Resolve a share code to its game.
#[utoipa::path(
    get,
    path = "/share/{code}",
    tag = "share",
    params(("code" = String, Path, description = "Eight character share code")),
    responses(
        (status = 200, description = "Shared game", body = ShareResponse),
        (status = 400, description = "Malformed code"),
        (status = 404, description = "Unknown code")
    )
)]
pub async fn resolve_share(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<ShareResponse>, AppError> {
    validate_share_code(&code).map_err(share_code_error)?;
    Ok(Json(game_service::resolve_share(&state, &code).await?))
}

fn share_code_error(err: ValidationError) -> AppError {
    AppError::BadRequest(
        err.message
            .map(|message| message.into_owned())
            .unwrap_or_else(|| err.code.into_owned()),
    )
}
