use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/games/{id}/viewers/{viewer}/events",
    tag = "sse",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("viewer" = Uuid, Path, description = "Viewer identifier")
    ),
    responses(
        (status = 200, description = "Table view stream (`handshake`, `table` and `system` events)", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown viewer")
    )
)]
/// Stream every view a viewer's table publishes.
pub async fn table_stream(
    State(state): State<SharedState>,
    Path((id, viewer)): Path<(Uuid, Uuid)>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let stream = sse_service::table_stream(&state, id, viewer)?;
    info!(game_id = %id, viewer_id = %viewer, "new table SSE connection");
    Ok(stream)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/games/{id}/viewers/{viewer}/events", get(table_stream))
}
