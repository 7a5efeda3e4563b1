use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the document store and report overall health.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage_reachable = match state.game_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "document store health check failed");
                false
            }
        },
        None => {
            warn!("no document store installed (degraded mode)");
            false
        }
    };

    HealthResponse::new(storage_reachable, state.is_degraded(), state.tables().len())
}
