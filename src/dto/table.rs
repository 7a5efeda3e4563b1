use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        BiddingPhase, GamePhase, GameStatus, MAX_DECKS, Standing, ValidationState,
        game::{CARDS_PER_DECK, MIN_PLAYERS},
    },
    dto::game::RoundView,
};

/// Largest bid a table can ever need: every card split between two players.
pub const MAX_BID: u32 = CARDS_PER_DECK * MAX_DECKS / MIN_PLAYERS as u32;

/// Everything one viewer needs to render the table.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct TableView {
    /// Session this view belongs to.
    pub viewer_id: Uuid,
    /// Game the session follows.
    pub game_id: Uuid,
    /// Display name of the game.
    pub name: String,
    /// Whether the game is still being played.
    pub status: GameStatus,
    /// Bidding, results or completed.
    pub current_phase: GamePhase,
    /// Sub-phase of bidding, absent outside it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidding_phase: Option<BiddingPhase>,
    /// In-progress round including this viewer's unsent bids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundView>,
    /// Seat whose turn it is during regular bidding.
    pub active_seat: Option<usize>,
    /// Seats whose bid input is usable.
    pub enabled_seats: Vec<usize>,
    /// Seats with typed bids that have not been pushed yet.
    pub pending_seats: Vec<usize>,
    /// Bid validation for the in-progress round while bidding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationState>,
    /// The round will seal itself shortly.
    pub auto_complete_pending: bool,
    /// Sealed rounds, oldest first.
    pub completed_rounds: Vec<RoundView>,
    /// Players ranked by running total.
    pub standings: Vec<Standing>,
    /// Rounds the game lasts.
    pub max_rounds: u32,
    /// Terminal error; the table no longer follows the game once set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Bid entered for a seat.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BidRequest {
    /// Tricks the seat expects to take.
    #[validate(range(max = MAX_BID))]
    pub bid: u32,
}

/// Whether a seat made its bid.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResultRequest {
    /// The seat took exactly its bid.
    pub made: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bids_are_bounded_by_the_largest_hand() {
        assert_eq!(MAX_BID, 104);
        assert!(BidRequest { bid: 104 }.validate().is_ok());
        assert!(BidRequest { bid: 105 }.validate().is_err());
    }
}
