use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    BiddingPhase, Game, GamePhase, GameSetup, GameStatus, PlayerScore, Round, Suit,
};

/// Stored value for a bid or trick count that has not been entered.
pub const UNSET: i32 = -1;

/// Field update carried by a [`GamePatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PatchField<T> {
    /// Leave the stored field untouched.
    #[default]
    Keep,
    /// Overwrite the stored field.
    Set(T),
    /// Delete the stored field.
    Remove,
}

impl<T> PatchField<T> {
    /// Convert the carried value, keeping the variant.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PatchField<U> {
        match self {
            PatchField::Keep => PatchField::Keep,
            PatchField::Set(value) => PatchField::Set(f(value)),
            PatchField::Remove => PatchField::Remove,
        }
    }

    /// Apply to an optional stored field.
    pub fn apply(self, field: &mut Option<T>) {
        match self {
            PatchField::Keep => {}
            PatchField::Set(value) => *field = Some(value),
            PatchField::Remove => *field = None,
        }
    }

    /// Whether the stored field stays as it is.
    pub fn is_keep(&self) -> bool {
        matches!(self, PatchField::Keep)
    }
}

/// Reasons a stored document cannot be turned into a [`Game`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// A bid or trick count below the unset sentinel.
    #[error("round {round} seat {seat}: `{field}` has invalid value {value}")]
    InvalidCount {
        /// Round number.
        round: u32,
        /// Seat index.
        seat: usize,
        /// Field name.
        field: &'static str,
        /// Stored value.
        value: i32,
    },
    /// A round does not have one entry per seat.
    #[error("round {round} has {actual} scores for {expected} players")]
    SeatCountMismatch {
        /// Round number.
        round: u32,
        /// Players in the setup.
        expected: usize,
        /// Scores in the round.
        actual: usize,
    },
}

/// Immutable table configuration as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameSetupEntity {
    /// Player names in seat order.
    pub players: Vec<String>,
    /// Number of decks.
    pub decks: u32,
    /// Last playable round.
    pub max_rounds: u32,
    /// Seat bidding first in round 1.
    pub first_bidder: usize,
}

/// One seat within a stored round. Unset counts are stored as [`UNSET`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerScoreEntity {
    /// Display name.
    pub name: String,
    /// Bid or [`UNSET`].
    pub bid: i32,
    /// Tricks or [`UNSET`].
    pub tricks: i32,
    /// Whether the bid was made.
    pub met: bool,
    /// Round score.
    pub score: i32,
    /// Whether the bid was blind.
    pub blind_bid: bool,
    /// Cosmetic suit marker.
    pub suit: Suit,
}

/// A stored round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundEntity {
    /// 1-based round number.
    pub round_number: u32,
    /// Seat bidding first.
    pub first_bidder_index: usize,
    /// One entry per seat.
    pub scores: Vec<PlayerScoreEntity>,
}

/// Shared game document persisted by the storage layer.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Display name of the table.
    pub name: String,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the document was written.
    pub updated_at: SystemTime,
    /// Table configuration.
    pub setup: GameSetupEntity,
    /// Completed rounds, oldest first.
    #[serde(default)]
    pub rounds: Vec<RoundEntity>,
    /// Round being bid or resolved.
    pub in_progress_round: Option<RoundEntity>,
    /// Stage of the in-progress round.
    pub current_phase: GamePhase,
    /// Bidding sub-stage.
    pub bidding_phase: Option<BiddingPhase>,
    /// Whether the game is still being played.
    pub status: GameStatus,
}

/// Summary of a stored game, used for listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameListItemEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Display name of the table.
    pub name: String,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last write timestamp.
    pub updated_at: SystemTime,
    /// Player names in seat order.
    pub players: Vec<String>,
    /// Game status.
    pub status: GameStatus,
    /// Number of completed rounds.
    pub rounds_played: usize,
    /// Last playable round.
    pub max_rounds: u32,
}

/// Partial update of a [`GameEntity`]. Unset fields are left as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePatch {
    /// Replacement for the completed round list.
    pub rounds: Option<Vec<RoundEntity>>,
    /// In-progress round update.
    pub in_progress_round: PatchField<RoundEntity>,
    /// New round stage.
    pub current_phase: Option<GamePhase>,
    /// Bidding sub-stage update.
    pub bidding_phase: PatchField<BiddingPhase>,
    /// New status.
    pub status: Option<GameStatus>,
    /// Write timestamp.
    pub updated_at: SystemTime,
}

impl GamePatch {
    /// Patch that only bumps the write timestamp.
    pub fn touch() -> Self {
        Self {
            rounds: None,
            in_progress_round: PatchField::Keep,
            current_phase: None,
            bidding_phase: PatchField::Keep,
            status: None,
            updated_at: SystemTime::now(),
        }
    }

    /// Apply the patch in place.
    pub fn apply_to(self, entity: &mut GameEntity) {
        if let Some(rounds) = self.rounds {
            entity.rounds = rounds;
        }
        self.in_progress_round.apply(&mut entity.in_progress_round);
        if let Some(phase) = self.current_phase {
            entity.current_phase = phase;
        }
        self.bidding_phase.apply(&mut entity.bidding_phase);
        if let Some(status) = self.status {
            entity.status = status;
        }
        entity.updated_at = self.updated_at;
    }
}

fn encode_count(value: Option<u32>) -> i32 {
    value.map_or(UNSET, |count| i32::try_from(count).unwrap_or(i32::MAX))
}

fn decode_count(
    value: i32,
    round: u32,
    seat: usize,
    field: &'static str,
) -> Result<Option<u32>, DocumentError> {
    match value {
        UNSET => Ok(None),
        count if count >= 0 => Ok(Some(count as u32)),
        value => Err(DocumentError::InvalidCount {
            round,
            seat,
            field,
            value,
        }),
    }
}

impl From<PlayerScore> for PlayerScoreEntity {
    fn from(value: PlayerScore) -> Self {
        Self {
            name: value.name,
            bid: encode_count(value.bid),
            tricks: encode_count(value.tricks),
            met: value.met,
            score: value.score,
            blind_bid: value.blind_bid,
            suit: value.suit,
        }
    }
}

impl From<Round> for RoundEntity {
    fn from(value: Round) -> Self {
        Self {
            round_number: value.round_number,
            first_bidder_index: value.first_bidder_index,
            scores: value.scores.into_iter().map(Into::into).collect(),
        }
    }
}

impl RoundEntity {
    fn decode(self, players: usize) -> Result<Round, DocumentError> {
        let round = self.round_number;
        if self.scores.len() != players {
            return Err(DocumentError::SeatCountMismatch {
                round,
                expected: players,
                actual: self.scores.len(),
            });
        }
        let scores = self
            .scores
            .into_iter()
            .enumerate()
            .map(|(seat, player)| {
                Ok(PlayerScore {
                    name: player.name,
                    bid: decode_count(player.bid, round, seat, "bid")?,
                    tricks: decode_count(player.tricks, round, seat, "tricks")?,
                    met: player.met,
                    score: player.score,
                    blind_bid: player.blind_bid,
                    suit: player.suit,
                })
            })
            .collect::<Result<_, DocumentError>>()?;

        Ok(Round {
            round_number: round,
            first_bidder_index: self.first_bidder_index,
            scores,
        })
    }
}

impl From<GameSetup> for GameSetupEntity {
    fn from(value: GameSetup) -> Self {
        Self {
            players: value.players,
            decks: value.decks,
            max_rounds: value.max_rounds,
            first_bidder: value.first_bidder,
        }
    }
}

impl From<GameSetupEntity> for GameSetup {
    fn from(value: GameSetupEntity) -> Self {
        Self {
            players: value.players,
            decks: value.decks,
            max_rounds: value.max_rounds,
            first_bidder: value.first_bidder,
        }
    }
}

impl From<Game> for GameEntity {
    fn from(value: Game) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: value.created_at,
            updated_at: value.updated_at,
            setup: value.setup.into(),
            rounds: value.rounds.into_iter().map(Into::into).collect(),
            in_progress_round: value.in_progress_round.map(Into::into),
            current_phase: value.current_phase,
            bidding_phase: value.bidding_phase,
            status: value.status,
        }
    }
}

impl TryFrom<GameEntity> for Game {
    type Error = DocumentError;

    fn try_from(value: GameEntity) -> Result<Self, Self::Error> {
        let players = value.setup.players.len();
        let rounds = value
            .rounds
            .into_iter()
            .map(|round| round.decode(players))
            .collect::<Result<_, _>>()?;
        let in_progress_round = value
            .in_progress_round
            .map(|round| round.decode(players))
            .transpose()?;

        Ok(Self {
            id: value.id,
            name: value.name,
            created_at: value.created_at,
            updated_at: value.updated_at,
            setup: value.setup.into(),
            rounds,
            in_progress_round,
            current_phase: value.current_phase,
            bidding_phase: value.bidding_phase,
            status: value.status,
        })
    }
}

impl From<GameEntity> for GameListItemEntity {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: value.created_at,
            updated_at: value.updated_at,
            rounds_played: value.rounds.len(),
            max_rounds: value.setup.max_rounds,
            players: value.setup.players,
            status: value.status,
        }
    }
}
