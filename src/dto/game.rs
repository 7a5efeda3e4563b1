use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::GameListItemEntity,
    domain::{
        BiddingPhase, Game, GamePhase, GameStatus, MAX_DECKS, PlayerScore, Round, Standing, Suit,
        standings,
    },
    dto::{format_system_time, validation::validate_player_names},
};

/// Payload used to start a new game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    /// Display name; surrounding whitespace is trimmed.
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    /// Player names in seat order.
    #[validate(length(min = 2), custom(function = "validate_player_names"))]
    pub players: Vec<String>,
    /// Number of 52-card decks.
    #[validate(range(min = 1, max = MAX_DECKS))]
    pub decks: u32,
    /// Seat bidding first in round 1. Chosen at random when omitted.
    #[serde(default)]
    pub first_bidder: Option<usize>,
}

/// Listing entry for a stored game.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameSummary {
    /// Game identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Creation time, RFC 3339.
    pub created_at: String,
    /// Last write, RFC 3339.
    pub updated_at: String,
    /// Player names in seat order.
    pub players: Vec<String>,
    /// Whether the game is still being played.
    pub status: GameStatus,
    /// Sealed rounds so far.
    pub rounds_played: usize,
    /// Rounds the game lasts.
    pub max_rounds: u32,
}

/// Full game document as exposed over REST.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameDetail {
    /// Game identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Creation time, RFC 3339.
    pub created_at: String,
    /// Last write, RFC 3339.
    pub updated_at: String,
    /// Player names in seat order.
    pub players: Vec<String>,
    /// Number of 52-card decks.
    pub decks: u32,
    /// Rounds the game lasts.
    pub max_rounds: u32,
    /// Whether the game is still being played.
    pub status: GameStatus,
    /// Bidding, results or completed.
    pub current_phase: GamePhase,
    /// Sub-phase of bidding, absent outside it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidding_phase: Option<BiddingPhase>,
    /// Sealed rounds, oldest first.
    pub rounds: Vec<RoundView>,
    /// Round being bid or scored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_progress_round: Option<RoundView>,
    /// Players ranked by running total.
    pub standings: Vec<Standing>,
}

/// One round as shown to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoundView {
    /// 1-based round number.
    pub round_number: u32,
    /// Cards dealt to each player.
    pub tricks_available: u32,
    /// Seat that bids first.
    pub first_bidder_index: usize,
    /// One entry per seat.
    pub scores: Vec<PlayerScoreView>,
}

/// One seat within a round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlayerScoreView {
    /// Player name.
    pub name: String,
    /// `null` until entered.
    pub bid: Option<u32>,
    /// `null` until a result is recorded.
    pub tricks: Option<u32>,
    /// Took exactly the bid.
    pub met: bool,
    /// Points for this round.
    pub score: i32,
    /// Bid declared before seeing the cards.
    pub blind_bid: bool,
    /// Suit shown for the seat.
    pub suit: Suit,
}

/// Share code issued for a game.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShareResponse {
    /// Eight character code.
    pub code: String,
    /// Game the code opens.
    pub game_id: Uuid,
}

impl From<&PlayerScore> for PlayerScoreView {
    fn from(value: &PlayerScore) -> Self {
        Self {
            name: value.name.clone(),
            bid: value.bid,
            tricks: value.tricks,
            met: value.met,
            score: value.score,
            blind_bid: value.blind_bid,
            suit: value.suit,
        }
    }
}

impl From<&Round> for RoundView {
    fn from(value: &Round) -> Self {
        Self {
            round_number: value.round_number,
            tricks_available: value.tricks_available(),
            first_bidder_index: value.first_bidder_index,
            scores: value.scores.iter().map(Into::into).collect(),
        }
    }
}

impl From<&Game> for GameDetail {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id,
            name: game.name.clone(),
            created_at: format_system_time(game.created_at),
            updated_at: format_system_time(game.updated_at),
            players: game.setup.players.clone(),
            decks: game.setup.decks,
            max_rounds: game.setup.max_rounds,
            status: game.status,
            current_phase: game.current_phase,
            bidding_phase: game.bidding_phase,
            rounds: game.rounds.iter().map(Into::into).collect(),
            in_progress_round: game.in_progress_round.as_ref().map(Into::into),
            standings: standings(&game.setup, &game.rounds),
        }
    }
}

impl From<GameListItemEntity> for GameSummary {
    fn from(value: GameListItemEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: format_system_time(value.created_at),
            updated_at: format_system_time(value.updated_at),
            players: value.players,
            status: value.status,
            rounds_played: value.rounds_played,
            max_rounds: value.max_rounds,
        }
    }
}
