use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Old Heck Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::list_games,
        crate::routes::game::create_game,
        crate::routes::game::get_game,
        crate::routes::game::delete_game,
        crate::routes::game::end_game,
        crate::routes::game::create_share,
        crate::routes::game::resolve_share,
        crate::routes::table::mount,
        crate::routes::table::view,
        crate::routes::table::unmount,
        crate::routes::table::toggle_blind,
        crate::routes::table::set_blind_bid,
        crate::routes::table::proceed_from_blind,
        crate::routes::table::set_bid,
        crate::routes::table::complete_bidding,
        crate::routes::table::record_result,
        crate::routes::table::complete_results,
        crate::routes::sse::table_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::GameSummary,
            crate::dto::game::GameDetail,
            crate::dto::game::RoundView,
            crate::dto::game::PlayerScoreView,
            crate::dto::game::ShareResponse,
            crate::dto::table::TableView,
            crate::dto::table::BidRequest,
            crate::dto::table::ResultRequest,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::domain::Standing,
            crate::domain::ValidationState,
            crate::domain::BlindValidation,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Game documents"),
        (name = "share", description = "Share links"),
        (name = "table", description = "Viewer sessions and table commands"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_command_is_documented() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/games/{id}/viewers/{viewer}/blind/{seat}/toggle",
            "/games/{id}/viewers/{viewer}/results/complete",
            "/games/{id}/viewers/{viewer}/events",
            "/share/{code}",
        ] {
            assert!(paths.contains_key(path), "{path} missing from the OpenAPI document");
        }
    }

    #[test]
    fn table_view_fields_carry_descriptions() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let properties = &doc["components"]["schemas"]["TableView"]["properties"];
        for field in ["viewer_id", "game_id", "name", "standings", "max_rounds"] {
            assert!(
                properties[field]["description"].is_string(),
                "{field} has no description"
            );
        }
        let bid = &doc["components"]["schemas"]["BidRequest"]["properties"]["bid"];
        assert!(bid["description"].is_string());
    }
}
