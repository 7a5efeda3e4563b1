use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::scoring::max_rounds;

/// Cards in a single deck.
pub const CARDS_PER_DECK: u32 = 52;
/// Fewest players a game can be started with.
pub const MIN_PLAYERS: usize = 2;
/// Most decks a table can shuffle together.
pub const MAX_DECKS: u32 = 4;

/// Decorative marker shown next to a player, assigned round-robin by seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Suit {
    /// ♠
    Spades,
    /// ♥
    Hearts,
    /// ♦
    Diamonds,
    /// ♣
    Clubs,
}

impl Suit {
    const ORDER: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    /// Suit shown for the player sitting at `seat`.
    pub fn for_seat(seat: usize) -> Self {
        Self::ORDER[seat % Self::ORDER.len()]
    }
}

/// One player's state within a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerScore {
    /// Display name. Not required to be unique.
    pub name: String,
    /// Committed bid, `None` until entered.
    pub bid: Option<u32>,
    /// Recorded result, `None` until recorded; mirrors `bid` afterwards.
    pub tricks: Option<u32>,
    /// Whether the bid was fulfilled.
    pub met: bool,
    /// Points earned this round.
    pub score: i32,
    /// Whether the bid was declared blind.
    pub blind_bid: bool,
    /// Cosmetic marker.
    pub suit: Suit,
}

impl PlayerScore {
    /// Fresh entry for a player at the given seat.
    pub fn new(name: impl Into<String>, seat: usize) -> Self {
        Self {
            name: name.into(),
            bid: None,
            tricks: None,
            met: false,
            score: 0,
            blind_bid: false,
            suit: Suit::for_seat(seat),
        }
    }

    /// Whether this player has a committed bid.
    pub fn has_bid(&self) -> bool {
        self.bid.is_some()
    }

    /// Whether a result has been recorded for this player.
    pub fn has_result(&self) -> bool {
        self.tricks.is_some()
    }
}

/// A single deal: bids, results and scores for every seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    /// 1-based round number, also the number of tricks available.
    pub round_number: u32,
    /// Seat that bids first this round.
    pub first_bidder_index: usize,
    /// One entry per seat, in seat order.
    pub scores: Vec<PlayerScore>,
}

impl Round {
    /// Build an empty round for the given seats.
    pub fn new<S: AsRef<str>>(round_number: u32, first_bidder_index: usize, players: &[S]) -> Self {
        Self {
            round_number,
            first_bidder_index,
            scores: players
                .iter()
                .enumerate()
                .map(|(seat, name)| PlayerScore::new(name.as_ref(), seat))
                .collect(),
        }
    }

    /// Tricks available this round (one card dealt per round number).
    pub fn tricks_available(&self) -> u32 {
        self.round_number
    }

    /// Number of seats at the table.
    pub fn player_count(&self) -> usize {
        self.scores.len()
    }

    /// Per-seat blind flags.
    pub fn blind_decisions(&self) -> Vec<bool> {
        self.scores.iter().map(|player| player.blind_bid).collect()
    }

    /// Whether every seat has a recorded result.
    pub fn all_results_recorded(&self) -> bool {
        self.scores.iter().all(PlayerScore::has_result)
    }

    /// Seat that bids first next round.
    pub fn next_first_bidder(&self) -> usize {
        match self.player_count() {
            0 => 0,
            count => (self.first_bidder_index + 1) % count,
        }
    }
}

/// Stage of the in-progress round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Bids are being declared.
    Bidding,
    /// Players report whether they made their bids.
    Results,
    /// The game is over.
    Completed,
}

/// Sub-stage of bidding. Only meaningful while [`GamePhase::Bidding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BiddingPhase {
    /// Players may declare blind and enter blind bids.
    BlindDeclarationAndEntry,
    /// Remaining players bid in turn order.
    RegularBidEntry,
}

/// Terminal status of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Rounds are still being played.
    InProgress,
    /// No more rounds will be played.
    Completed,
}

/// Reasons a [`GameSetup`] cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// Fewer than [`MIN_PLAYERS`] seats.
    #[error("a game requires at least {MIN_PLAYERS} players (got {0})")]
    TooFewPlayers(usize),
    /// A seat has a blank name.
    #[error("player name at seat {0} must not be empty")]
    EmptyName(usize),
    /// Deck count outside `1..=MAX_DECKS`.
    #[error("deck count must be between 1 and {MAX_DECKS} (got {0})")]
    InvalidDeckCount(u32),
    /// First bidder is not a valid seat.
    #[error("first bidder seat {seat} is out of range for {players} players")]
    FirstBidderOutOfRange {
        /// Requested seat.
        seat: usize,
        /// Number of players.
        players: usize,
    },
}

/// Table configuration fixed when the game starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSetup {
    /// Player names in seat order.
    pub players: Vec<String>,
    /// Number of 52-card decks in play.
    pub decks: u32,
    /// Last playable round.
    pub max_rounds: u32,
    /// Seat that bids first in round 1.
    pub first_bidder: usize,
}

impl GameSetup {
    /// Validate the table and compute the round limit.
    pub fn new(players: Vec<String>, decks: u32, first_bidder: usize) -> Result<Self, SetupError> {
        if players.len() < MIN_PLAYERS {
            return Err(SetupError::TooFewPlayers(players.len()));
        }
        if let Some(seat) = players.iter().position(|name| name.trim().is_empty()) {
            return Err(SetupError::EmptyName(seat));
        }
        if decks == 0 || decks > MAX_DECKS {
            return Err(SetupError::InvalidDeckCount(decks));
        }
        if first_bidder >= players.len() {
            return Err(SetupError::FirstBidderOutOfRange {
                seat: first_bidder,
                players: players.len(),
            });
        }

        let max_rounds = max_rounds(decks, players.len() as u32);
        Ok(Self {
            players,
            decks,
            max_rounds,
            first_bidder,
        })
    }

    /// Number of seats.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

/// Whole game document as seen by the domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    /// Document identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub created_at: SystemTime,
    /// Last write time.
    pub updated_at: SystemTime,
    /// Immutable table configuration.
    pub setup: GameSetup,
    /// Sealed rounds, oldest first. Append-only.
    pub rounds: Vec<Round>,
    /// Round currently being bid or resolved.
    pub in_progress_round: Option<Round>,
    /// Stage of the in-progress round.
    pub current_phase: GamePhase,
    /// Bidding sub-stage, present only while bidding.
    pub bidding_phase: Option<BiddingPhase>,
    /// Whether the game is still being played.
    pub status: GameStatus,
}

impl Game {
    /// Start a new game at round 1, blind declaration.
    pub fn new(name: impl Into<String>, setup: GameSetup) -> Self {
        let now = SystemTime::now();
        let first_round = Round::new(1, setup.first_bidder, &setup.players);
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            setup,
            rounds: Vec::new(),
            in_progress_round: Some(first_round),
            current_phase: GamePhase::Bidding,
            bidding_phase: Some(BiddingPhase::BlindDeclarationAndEntry),
            status: GameStatus::InProgress,
        }
    }

    /// Whether the game has finished.
    pub fn is_completed(&self) -> bool {
        self.status == GameStatus::Completed
    }

    /// Whether a round with this number has already been sealed.
    pub fn has_sealed(&self, round_number: u32) -> bool {
        self.rounds
            .iter()
            .any(|round| round.round_number == round_number)
    }

    /// The most recently sealed round.
    pub fn last_sealed(&self) -> Option<&Round> {
        self.rounds.last()
    }

    /// Number of the round that follows the last sealed one.
    pub fn next_round_number(&self) -> u32 {
        self.last_sealed().map_or(1, |round| round.round_number + 1)
    }

    /// Build the round that follows the last sealed one, or `None` when the
    /// round limit has been reached.
    pub fn build_next_round(&self) -> Option<Round> {
        let number = self.next_round_number();
        if number > self.setup.max_rounds {
            return None;
        }
        let first_bidder = self
            .last_sealed()
            .map_or(self.setup.first_bidder, Round::next_first_bidder);
        Some(Round::new(number, first_bidder, &self.setup.players))
    }

    /// Whether the game is between rounds and waiting for the next one.
    pub fn awaiting_next_round(&self) -> bool {
        !self.is_completed()
            && self.in_progress_round.is_none()
            && self.next_round_number() <= self.setup.max_rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("P{i}")).collect()
    }

    #[test]
    fn suits_rotate_by_seat() {
        let round = Round::new(1, 0, &names(5));
        let suits: Vec<Suit> = round.scores.iter().map(|p| p.suit).collect();
        assert_eq!(
            suits,
            vec![
                Suit::Spades,
                Suit::Hearts,
                Suit::Diamonds,
                Suit::Clubs,
                Suit::Spades
            ]
        );
    }

    #[test]
    fn new_round_is_unset() {
        let round = Round::new(3, 1, &names(3));
        assert_eq!(round.tricks_available(), 3);
        assert!(round.scores.iter().all(|p| p.bid.is_none()
            && p.tricks.is_none()
            && !p.met
            && p.score == 0
            && !p.blind_bid));
    }

    #[test]
    fn setup_rejects_bad_tables() {
        assert_eq!(
            GameSetup::new(names(1), 1, 0),
            Err(SetupError::TooFewPlayers(1))
        );
        assert_eq!(
            GameSetup::new(vec!["A".into(), " ".into()], 1, 0),
            Err(SetupError::EmptyName(1))
        );
        assert_eq!(
            GameSetup::new(names(2), 0, 0),
            Err(SetupError::InvalidDeckCount(0))
        );
        assert!(matches!(
            GameSetup::new(names(2), 1, 2),
            Err(SetupError::FirstBidderOutOfRange { seat: 2, .. })
        ));
    }

    #[test]
    fn setup_computes_max_rounds() {
        let setup = GameSetup::new(names(4), 1, 0).unwrap();
        assert_eq!(setup.max_rounds, 13);
        let setup = GameSetup::new(names(6), 2, 5).unwrap();
        assert_eq!(setup.max_rounds, 17);
    }

    #[test]
    fn next_round_rotates_first_bidder() {
        let setup = GameSetup::new(names(3), 1, 2).unwrap();
        let mut game = Game::new("table", setup);
        let first = game.in_progress_round.take().unwrap();
        assert_eq!(first.first_bidder_index, 2);
        game.rounds.push(first);

        let next = game.build_next_round().unwrap();
        assert_eq!(next.round_number, 2);
        assert_eq!(next.first_bidder_index, 0);
        assert!(game.awaiting_next_round());
    }

    #[test]
    fn no_round_past_the_limit() {
        let setup = GameSetup::new(names(2), 1, 0).unwrap();
        let mut game = Game::new("table", setup);
        game.in_progress_round = None;
        for number in 1..=26 {
            game.rounds.push(Round::new(number, 0, &game.setup.players));
        }
        assert!(game.build_next_round().is_none());
        assert!(!game.awaiting_next_round());
        assert!(game.has_sealed(26));
    }
}
