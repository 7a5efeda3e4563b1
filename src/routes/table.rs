use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::table::{BidRequest, ResultRequest, TableView},
    error::AppError,
    services::{table_service, table_session::TableCommand},
    state::SharedState,
};

const VIEWER: &str = "/games/{id}/viewers/{viewer}";

/// Viewer sessions and the commands they accept.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/{id}/viewers", post(mount))
        .route(VIEWER, get(view).delete(unmount))
        .route(&format!("{VIEWER}/blind/{{seat}}/toggle"), post(toggle_blind))
        .route(&format!("{VIEWER}/blind/{{seat}}/bid"), post(set_blind_bid))
        .route(&format!("{VIEWER}/blind/proceed"), post(proceed_from_blind))
        .route(&format!("{VIEWER}/bids/{{seat}}"), post(set_bid))
        .route(&format!("{VIEWER}/bidding/complete"), post(complete_bidding))
        .route(&format!("{VIEWER}/results/{{seat}}"), post(record_result))
        .route(&format!("{VIEWER}/results/complete"), post(complete_results))
}

async fn run(
    state: &SharedState,
    id: Uuid,
    viewer: Uuid,
    command: TableCommand,
) -> Result<Json<TableView>, AppError> {
    Ok(Json(
        table_service::dispatch(state, id, viewer, command).await?,
    ))
}

/// Sit a new viewer at the table of a game.
#[utoipa::path(
    post,
    path = "/games/{id}/viewers",
    tag = "table",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 201, description = "Viewer mounted", body = TableView),
        (status = 404, description = "Unknown game"),
        (status = 503, description = "No document store")
    )
)]
pub async fn mount(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<TableView>), AppError> {
    let view = table_service::mount(&state, id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Current view of a viewer.
#[utoipa::path(
    get,
    path = "/games/{id}/viewers/{viewer}",
    tag = "table",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("viewer" = Uuid, Path, description = "Viewer identifier")
    ),
    responses(
        (status = 200, description = "Table view", body = TableView),
        (status = 404, description = "Unknown viewer")
    )
)]
pub async fn view(
    State(state): State<SharedState>,
    Path((id, viewer)): Path<(Uuid, Uuid)>,
) -> Result<Json<TableView>, AppError> {
    Ok(Json(table_service::view(&state, id, viewer)?))
}

/// Leave the table. Already pushed writes stay.
#[utoipa::path(
    delete,
    path = "/games/{id}/viewers/{viewer}",
    tag = "table",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("viewer" = Uuid, Path, description = "Viewer identifier")
    ),
    responses(
        (status = 204, description = "Viewer unmounted"),
        (status = 404, description = "Unknown viewer")
    )
)]
pub async fn unmount(
    State(state): State<SharedState>,
    Path((id, viewer)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    table_service::unmount(&state, id, viewer)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Flip a seat's blind flag during blind declaration.
#[utoipa::path(
    post,
    path = "/games/{id}/viewers/{viewer}/blind/{seat}/toggle",
    tag = "table",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("viewer" = Uuid, Path, description = "Viewer identifier"),
        ("seat" = usize, Path, description = "Seat index")
    ),
    responses(
        (status = 200, description = "Updated view", body = TableView),
        (status = 409, description = "Not in blind declaration")
    )
)]
pub async fn toggle_blind(
    State(state): State<SharedState>,
    Path((id, viewer, seat)): Path<(Uuid, Uuid, usize)>,
) -> Result<Json<TableView>, AppError> {
    run(&state, id, viewer, TableCommand::ToggleBlind { seat }).await
}

/// Enter a blind seat's bid. Published immediately.
#[utoipa::path(
    post,
    path = "/games/{id}/viewers/{viewer}/blind/{seat}/bid",
    tag = "table",
    request_body = BidRequest,
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("viewer" = Uuid, Path, description = "Viewer identifier"),
        ("seat" = usize, Path, description = "Seat index")
    ),
    responses(
        (status = 200, description = "Updated view", body = TableView),
        (status = 409, description = "Seat is not blind")
    )
)]
pub async fn set_blind_bid(
    State(state): State<SharedState>,
    Path((id, viewer, seat)): Path<(Uuid, Uuid, usize)>,
    Valid(Json(payload)): Valid<Json<BidRequest>>,
) -> Result<Json<TableView>, AppError> {
    let command = TableCommand::SetBlindBid {
        seat,
        bid: payload.bid,
    };
    run(&state, id, viewer, command).await
}

/// Leave blind declaration.
#[utoipa::path(
    post,
    path = "/games/{id}/viewers/{viewer}/blind/proceed",
    tag = "table",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("viewer" = Uuid, Path, description = "Viewer identifier")
    ),
    responses(
        (status = 200, description = "Updated view", body = TableView),
        (status = 409, description = "Blind bids missing or not allowed")
    )
)]
pub async fn proceed_from_blind(
    State(state): State<SharedState>,
    Path((id, viewer)): Path<(Uuid, Uuid)>,
) -> Result<Json<TableView>, AppError> {
    run(&state, id, viewer, TableCommand::ProceedFromBlind).await
}

/// Type a regular bid; it is pushed once typing settles.
#[utoipa::path(
    post,
    path = "/games/{id}/viewers/{viewer}/bids/{seat}",
    tag = "table",
    request_body = BidRequest,
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("viewer" = Uuid, Path, description = "Viewer identifier"),
        ("seat" = usize, Path, description = "Seat index")
    ),
    responses(
        (status = 200, description = "Updated view", body = TableView),
        (status = 409, description = "Not this seat's turn")
    )
)]
pub async fn set_bid(
    State(state): State<SharedState>,
    Path((id, viewer, seat)): Path<(Uuid, Uuid, usize)>,
    Valid(Json(payload)): Valid<Json<BidRequest>>,
) -> Result<Json<TableView>, AppError> {
    let command = TableCommand::SetBid {
        seat,
        bid: payload.bid,
    };
    run(&state, id, viewer, command).await
}

/// Finish bidding and open results entry.
#[utoipa::path(
    post,
    path = "/games/{id}/viewers/{viewer}/bidding/complete",
    tag = "table",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("viewer" = Uuid, Path, description = "Viewer identifier")
    ),
    responses(
        (status = 200, description = "Updated view", body = TableView),
        (status = 409, description = "Bids missing or equal to the tricks available")
    )
)]
pub async fn complete_bidding(
    State(state): State<SharedState>,
    Path((id, viewer)): Path<(Uuid, Uuid)>,
) -> Result<Json<TableView>, AppError> {
    run(&state, id, viewer, TableCommand::CompleteBidding).await
}

/// Record whether a seat made its bid.
#[utoipa::path(
    post,
    path = "/games/{id}/viewers/{viewer}/results/{seat}",
    tag = "table",
    request_body = ResultRequest,
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("viewer" = Uuid, Path, description = "Viewer identifier"),
        ("seat" = usize, Path, description = "Seat index")
    ),
    responses(
        (status = 200, description = "Updated view", body = TableView),
        (status = 409, description = "Results are not being recorded")
    )
)]
pub async fn record_result(
    State(state): State<SharedState>,
    Path((id, viewer, seat)): Path<(Uuid, Uuid, usize)>,
    Json(payload): Json<ResultRequest>,
) -> Result<Json<TableView>, AppError> {
    let command = TableCommand::RecordResult {
        seat,
        made: payload.made,
    };
    run(&state, id, viewer, command).await
}

/// Seal the round now instead of waiting for auto-completion.
#[utoipa::path(
    post,
    path = "/games/{id}/viewers/{viewer}/results/complete",
    tag = "table",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("viewer" = Uuid, Path, description = "Viewer identifier")
    ),
    responses(
        (status = 200, description = "Updated view", body = TableView),
        (status = 409, description = "Results missing")
    )
)]
pub async fn complete_results(
    State(state): State<SharedState>,
    Path((id, viewer)): Path<(Uuid, Uuid)>,
) -> Result<Json<TableView>, AppError> {
    run(&state, id, viewer, TableCommand::CompleteResults).await
}
