//! Derived validity flags for a round's bids.
//!
//! The only forbidden state is a full set of bids whose total equals the
//! tricks available. Totals above the available tricks are legal, and bids
//! larger than the hand are flagged as advisory only.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::game::PlayerScore;

/// Flags derived from a round's bids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ValidationState {
    /// Sum of committed bids.
    pub total_bids: u32,
    /// Every seat has a committed bid.
    pub all_bids_entered: bool,
    /// The committed total equals the tricks available.
    pub bids_equal_tricks: bool,
    /// Bidding may be completed.
    pub can_proceed: bool,
    /// Seats whose bid exceeds the tricks available. Advisory.
    pub oversized_bids: Vec<usize>,
    /// Blind-phase flags, present when blind decisions were supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blind: Option<BlindValidation>,
}

/// Flags that only apply while blind bids are being declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct BlindValidation {
    /// Every blind seat has entered a bid.
    pub all_blind_bids_entered: bool,
    /// Every seat is blind.
    pub all_players_blind: bool,
    /// The blind phase may be left.
    pub can_proceed_from_blind_phase: bool,
}

impl ValidationState {
    /// Whether the blind phase may be left; `false` outside blind mode.
    pub fn can_proceed_from_blind_phase(&self) -> bool {
        self.blind
            .is_some_and(|blind| blind.can_proceed_from_blind_phase)
    }

    /// Whether every seat went blind; `false` outside blind mode.
    pub fn all_players_blind(&self) -> bool {
        self.blind.is_some_and(|blind| blind.all_players_blind)
    }
}

/// Compute the validation flags for `scores` against `tricks_available`.
///
/// Pass `blind` (one flag per seat) while blind bids are being declared.
pub fn validate(
    scores: &[PlayerScore],
    tricks_available: u32,
    blind: Option<&[bool]>,
) -> ValidationState {
    let total_bids = scores.iter().filter_map(|player| player.bid).sum();
    let all_bids_entered = scores.iter().all(PlayerScore::has_bid);
    let bids_equal_tricks = total_bids == tricks_available;
    let oversized_bids = scores
        .iter()
        .enumerate()
        .filter(|(_, player)| player.bid.is_some_and(|bid| bid > tricks_available))
        .map(|(seat, _)| seat)
        .collect();

    let blind = blind.map(|flags| {
        let is_blind = |seat: usize| flags.get(seat).copied().unwrap_or(false);
        let all_blind_bids_entered = scores
            .iter()
            .enumerate()
            .filter(|(seat, _)| is_blind(*seat))
            .all(|(_, player)| player.has_bid());
        let all_players_blind = (0..scores.len()).all(is_blind);

        BlindValidation {
            all_blind_bids_entered,
            all_players_blind,
            can_proceed_from_blind_phase: all_blind_bids_entered
                && (!all_players_blind || !bids_equal_tricks),
        }
    });

    ValidationState {
        total_bids,
        all_bids_entered,
        bids_equal_tricks,
        can_proceed: all_bids_entered && !bids_equal_tricks,
        oversized_bids,
        blind,
    }
}
