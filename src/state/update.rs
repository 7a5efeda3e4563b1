//! Domain-level document updates produced by the table machines.

use std::time::SystemTime;

use crate::{
    dao::models::{GamePatch, PatchField},
    domain::{BiddingPhase, Game, GamePhase, GameStatus, Round},
    state::{bidding::BiddingCommit, round_lifecycle::LifecycleCommit},
};

/// Change to a [`Game`] expressed field by field, mirroring [`GamePatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameUpdate {
    /// Replacement for the completed rounds.
    pub rounds: Option<Vec<Round>>,
    /// In-progress round update.
    pub in_progress_round: PatchField<Round>,
    /// New round stage.
    pub current_phase: Option<GamePhase>,
    /// Bidding sub-stage update.
    pub bidding_phase: PatchField<BiddingPhase>,
    /// New status.
    pub status: Option<GameStatus>,
}

impl GameUpdate {
    /// Overwrite the in-progress round only.
    pub fn round(round: Round) -> Self {
        Self {
            in_progress_round: PatchField::Set(round),
            ..Self::default()
        }
    }

    /// End the game now, dropping any unfinished round.
    pub fn end_game() -> Self {
        Self {
            in_progress_round: PatchField::Remove,
            current_phase: Some(GamePhase::Completed),
            bidding_phase: PatchField::Remove,
            status: Some(GameStatus::Completed),
            ..Self::default()
        }
    }

    /// Update for a bidding commit other than [`BiddingCommit::Completed`],
    /// which has to go through the round lifecycle first.
    pub fn from_bidding(commit: BiddingCommit) -> Result<Self, Round> {
        match commit {
            BiddingCommit::Round(round) => Ok(Self::round(round)),
            BiddingCommit::PhaseChanged { phase, round } => Ok(Self {
                in_progress_round: PatchField::Set(round),
                bidding_phase: PatchField::Set(phase),
                ..Self::default()
            }),
            BiddingCommit::Completed(round) => Err(round),
        }
    }

    /// Apply to a local copy of the document.
    pub fn apply_to(&self, game: &mut Game, at: SystemTime) {
        if let Some(rounds) = &self.rounds {
            game.rounds = rounds.clone();
        }
        self.in_progress_round
            .clone()
            .apply(&mut game.in_progress_round);
        if let Some(phase) = self.current_phase {
            game.current_phase = phase;
        }
        self.bidding_phase.clone().apply(&mut game.bidding_phase);
        if let Some(status) = self.status {
            game.status = status;
        }
        game.updated_at = at;
    }

    /// Storage form of this update.
    pub fn into_patch(self, at: SystemTime) -> GamePatch {
        GamePatch {
            rounds: self
                .rounds
                .map(|rounds| rounds.into_iter().map(Into::into).collect()),
            in_progress_round: self.in_progress_round.map(Into::into),
            current_phase: self.current_phase,
            bidding_phase: self.bidding_phase,
            status: self.status,
            updated_at: at,
        }
    }
}

impl From<LifecycleCommit> for GameUpdate {
    fn from(commit: LifecycleCommit) -> Self {
        match commit {
            LifecycleCommit::EnterResults(round) => Self {
                in_progress_round: PatchField::Set(round),
                current_phase: Some(GamePhase::Results),
                bidding_phase: PatchField::Remove,
                ..Self::default()
            },
            LifecycleCommit::Round(round) => Self::round(round),
            LifecycleCommit::Sealed { rounds } => Self {
                rounds: Some(rounds),
                in_progress_round: PatchField::Remove,
                ..Self::default()
            },
            LifecycleCommit::GameCompleted { rounds } => Self {
                rounds: Some(rounds),
                ..Self::end_game()
            },
            LifecycleCommit::NextRound(round) => Self {
                in_progress_round: PatchField::Set(round),
                current_phase: Some(GamePhase::Bidding),
                bidding_phase: PatchField::Set(BiddingPhase::BlindDeclarationAndEntry),
                ..Self::default()
            },
        }
    }
}
