//! Round sequencing after bidding: results entry, sealing, dealing the next round.

use std::time::Duration;

use tracing::{debug, warn};

use crate::{
    domain::{Game, GamePhase, Round, score},
    state::timer::{TimerFired, TimerHandle, TimerKind, TimerQueue},
};

/// Where the current round stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStage {
    /// Bids are still being collected.
    Bidding,
    /// Players are reporting made/missed.
    Results,
    /// The round is in the completed history.
    Sealed,
}

/// Writes the controller wants pushed to the shared document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCommit {
    /// Results entry opened with every result reset.
    EnterResults(Round),
    /// A result was recorded on the in-progress round.
    Round(Round),
    /// The round joined the history; another round follows.
    Sealed {
        /// Full completed history including the sealed round.
        rounds: Vec<Round>,
    },
    /// The round joined the history and the game is over.
    GameCompleted {
        /// Full completed history including the sealed round.
        rounds: Vec<Round>,
    },
    /// The next round was dealt.
    NextRound(Round),
}

/// Delays used by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleDelays {
    /// Wait after the last result before sealing automatically.
    pub auto_complete: Duration,
    /// Pause between sealing a round and dealing the next.
    pub next_round: Duration,
    /// Wait before a viewer that did not seal the round deals the next one.
    pub recovery: Duration,
}

/// Drives one viewer's round through results and sealing.
#[derive(Debug)]
pub struct RoundLifecycle {
    stage: RoundStage,
    auto_complete: Option<TimerHandle>,
    next_round: Option<TimerHandle>,
    delays: LifecycleDelays,
    timers: TimerQueue,
}

impl RoundLifecycle {
    /// Controller starting in [`RoundStage::Bidding`].
    pub fn new(timers: TimerQueue, delays: LifecycleDelays) -> Self {
        Self {
            stage: RoundStage::Bidding,
            auto_complete: None,
            next_round: None,
            delays,
            timers,
        }
    }

    /// Current stage.
    pub fn stage(&self) -> RoundStage {
        self.stage
    }

    /// Whether an automatic seal is pending.
    pub fn auto_complete_pending(&self) -> bool {
        self.auto_complete.is_some()
    }

    /// Whether the next deal is pending.
    pub fn next_round_pending(&self) -> bool {
        self.next_round.is_some()
    }

    /// Open results entry for a round whose bidding just finished.
    pub fn enter_results(&mut self, mut round: Round) -> LifecycleCommit {
        for player in &mut round.scores {
            player.tricks = None;
            player.met = false;
            player.score = 0;
        }
        self.stage = RoundStage::Results;
        self.auto_complete = None;
        LifecycleCommit::EnterResults(round)
    }

    /// Record whether `seat` made its bid. Arms the auto-complete timer once
    /// every seat has a result.
    pub fn record_result(&mut self, game: &Game, seat: usize, made: bool) -> Option<LifecycleCommit> {
        if self.stage != RoundStage::Results {
            return None;
        }
        let mut round = game.in_progress_round.clone()?;
        let player = round.scores.get_mut(seat)?;
        let Some(bid) = player.bid else {
            warn!(seat, round = round.round_number, "cannot record a result without a bid");
            return None;
        };

        player.tricks = Some(bid);
        player.met = made;
        player.score = score(bid, made, player.blind_bid);

        if round.all_results_recorded() {
            self.auto_complete = Some(
                self.timers
                    .arm(TimerKind::AutoComplete, self.delays.auto_complete),
            );
        }
        Some(LifecycleCommit::Round(round))
    }

    /// Seal the round right away. Only possible once every result is in.
    pub fn complete_now(&mut self, game: &Game) -> Option<LifecycleCommit> {
        if self.stage != RoundStage::Results {
            return None;
        }
        self.auto_complete = None;
        self.seal(game)
    }

    /// Handle an elapsed auto-complete or next-round timer.
    pub fn on_timer(&mut self, fired: &TimerFired, game: &Game) -> Option<LifecycleCommit> {
        match fired.kind {
            TimerKind::AutoComplete => {
                if !take_if_matches(&mut self.auto_complete, fired) {
                    return None;
                }
                if self.stage != RoundStage::Results {
                    return None;
                }
                self.seal(game)
            }
            TimerKind::NextRound => {
                if !take_if_matches(&mut self.next_round, fired) {
                    return None;
                }
                if !game.awaiting_next_round() {
                    debug!(game_id = %game.id, "next round already dealt elsewhere");
                    return None;
                }
                let round = game.build_next_round()?;
                self.stage = RoundStage::Bidding;
                Some(LifecycleCommit::NextRound(round))
            }
            TimerKind::BidAdvance => None,
        }
    }

    /// Deal the next round after the recovery delay unless a deal is already
    /// pending. Used when the game is found between rounds.
    pub fn schedule_recovery(&mut self) {
        if self.next_round.is_none() {
            self.next_round = Some(self.timers.arm(TimerKind::NextRound, self.delays.recovery));
        }
    }

    /// Drop every pending timer.
    pub fn cancel_timers(&mut self) {
        self.auto_complete = None;
        self.next_round = None;
    }

    /// Follow the stage recorded in the shared document.
    pub fn apply_remote(&mut self, game: &Game) {
        let stage = match (&game.in_progress_round, game.current_phase) {
            (_, GamePhase::Completed) | (None, _) => RoundStage::Sealed,
            (Some(_), GamePhase::Results) => RoundStage::Results,
            (Some(_), GamePhase::Bidding) => RoundStage::Bidding,
        };

        if stage != RoundStage::Results {
            self.auto_complete = None;
        } else if !game
            .in_progress_round
            .as_ref()
            .is_some_and(Round::all_results_recorded)
        {
            self.auto_complete = None;
        }
        if game.is_completed() || game.in_progress_round.is_some() {
            self.next_round = None;
        }
        self.stage = stage;
    }

    fn seal(&mut self, game: &Game) -> Option<LifecycleCommit> {
        let round = game.in_progress_round.clone()?;
        if !round.all_results_recorded() {
            return None;
        }
        if game.has_sealed(round.round_number) {
            debug!(round = round.round_number, "round already sealed");
            self.stage = RoundStage::Sealed;
            return None;
        }

        let number = round.round_number;
        let mut rounds = game.rounds.clone();
        rounds.push(round);
        self.stage = RoundStage::Sealed;

        if number + 1 > game.setup.max_rounds {
            self.next_round = None;
            Some(LifecycleCommit::GameCompleted { rounds })
        } else {
            self.next_round = Some(self.timers.arm(TimerKind::NextRound, self.delays.next_round));
            Some(LifecycleCommit::Sealed { rounds })
        }
    }
}

fn take_if_matches(slot: &mut Option<TimerHandle>, fired: &TimerFired) -> bool {
    if slot.as_ref().is_some_and(|handle| handle.matches(fired)) {
        slot.take();
        true
    } else {
        false
    }
}
