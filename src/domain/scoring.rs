use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::game::{CARDS_PER_DECK, GameSetup, Round};

/// Points for a bid: `(bid² + 10)`, negated when missed, doubled when blind.
pub fn score(bid: u32, met: bool, blind: bool) -> i32 {
    let base = (bid as i32) * (bid as i32) + 10;
    let signed = if met { base } else { -base };
    if blind { signed * 2 } else { signed }
}

/// Rounds playable before the decks run out: `floor(52 × decks / players)`.
pub fn max_rounds(decks: u32, players: u32) -> u32 {
    if players == 0 {
        return 0;
    }
    CARDS_PER_DECK * decks / players
}

/// A seat's running total across sealed rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Standing {
    /// Seat index.
    pub seat: usize,
    /// Player name.
    pub name: String,
    /// Sum of round scores.
    pub total: i32,
    /// Competition rank: equal totals share a rank and the next rank skips.
    pub rank: usize,
}

/// Totals table for the given sealed rounds, in seat order.
pub fn standings(setup: &GameSetup, rounds: &[Round]) -> Vec<Standing> {
    let totals: Vec<i32> = (0..setup.player_count())
        .map(|seat| {
            rounds
                .iter()
                .filter_map(|round| round.scores.get(seat))
                .map(|player| player.score)
                .sum()
        })
        .collect();

    setup
        .players
        .iter()
        .enumerate()
        .map(|(seat, name)| {
            let total = totals[seat];
            let ahead = totals.iter().filter(|other| **other > total).count();
            Standing {
                seat,
                name: name.clone(),
                total,
                rank: ahead + 1,
            }
        })
        .collect()
}
