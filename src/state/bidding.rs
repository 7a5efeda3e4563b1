//! Client-side bidding protocol: blind declaration, regular bidding, completion.
//!
//! The round is held as two layers. `mirror` is an exact copy of the shared
//! document's in-progress round, including every blind flag and committed
//! bid. `overlay` holds regular bids typed on this client that have not been
//! pushed yet; it is folded into the mirror when the advance timer fires and
//! discarded whenever the bidding phase changes underneath us.

use std::{collections::BTreeMap, time::Duration};

use tracing::debug;

use crate::{
    domain::{
        BiddingPhase, GamePhase, Round, ValidationState, next_bidder, ordered_seats,
        seat_enabled, validate,
    },
    state::timer::{TimerFired, TimerHandle, TimerKind, TimerQueue},
};

/// Stage of the bidding protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiddingStage {
    /// Players may go blind and enter blind bids.
    BlindDeclaration,
    /// Remaining players bid in turn order.
    RegularBidding,
    /// Bidding is over; the round belongs to the lifecycle controller.
    Complete,
}

impl BiddingStage {
    /// Stage implied by a document's phase tags.
    pub fn from_document(phase: GamePhase, bidding: Option<BiddingPhase>) -> Self {
        match (phase, bidding) {
            (GamePhase::Bidding, Some(BiddingPhase::RegularBidEntry)) => Self::RegularBidding,
            (GamePhase::Bidding, _) => Self::BlindDeclaration,
            (GamePhase::Results | GamePhase::Completed, _) => Self::Complete,
        }
    }
}

/// Writes the machine wants pushed to the shared document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BiddingCommit {
    /// Push the in-progress round.
    Round(Round),
    /// Push the in-progress round together with a new bidding sub-phase.
    PhaseChanged {
        /// New sub-phase.
        phase: BiddingPhase,
        /// Round at the moment of the change.
        round: Round,
    },
    /// Bidding finished; the round moves on to results.
    Completed(Round),
}

/// Bidding state for one viewer of one round.
#[derive(Debug)]
pub struct BiddingStateMachine {
    stage: BiddingStage,
    mirror: Round,
    overlay: BTreeMap<usize, u32>,
    active: Option<usize>,
    advance: Option<TimerHandle>,
    advance_delay: Duration,
    timers: TimerQueue,
}

impl BiddingStateMachine {
    /// Start following `round` at the given stage.
    pub fn new(
        round: Round,
        stage: BiddingStage,
        timers: TimerQueue,
        advance_delay: Duration,
    ) -> Self {
        let mut machine = Self {
            stage,
            mirror: round,
            overlay: BTreeMap::new(),
            active: None,
            advance: None,
            advance_delay,
            timers,
        };
        machine.refresh_active();
        machine
    }

    /// Current stage.
    pub fn stage(&self) -> BiddingStage {
        self.stage
    }

    /// Seat whose turn it is during regular bidding.
    pub fn active_seat(&self) -> Option<usize> {
        self.active
    }

    /// Round number being bid.
    pub fn round_number(&self) -> u32 {
        self.mirror.round_number
    }

    /// The last known shared state of the round.
    pub fn mirror(&self) -> &Round {
        &self.mirror
    }

    /// Seats with a locally typed bid that has not been pushed yet.
    pub fn pending_seats(&self) -> Vec<usize> {
        self.overlay.keys().copied().collect()
    }

    /// Whether a commit is waiting on the advance delay.
    pub fn has_pending_advance(&self) -> bool {
        self.advance.is_some()
    }

    /// The round as this viewer sees it: shared state with local edits on top.
    pub fn effective_round(&self) -> Round {
        let mut round = self.mirror.clone();
        for (&seat, &bid) in &self.overlay {
            if let Some(player) = round.scores.get_mut(seat) {
                player.bid = Some(bid);
            }
        }
        round
    }

    /// Validation flags for the effective round.
    ///
    /// Blind-phase flags are only computed while blind bids are being declared.
    pub fn validation(&self) -> ValidationState {
        let round = self.effective_round();
        match self.stage {
            BiddingStage::BlindDeclaration => {
                let blind = round.blind_decisions();
                validate(&round.scores, round.tricks_available(), Some(&blind))
            }
            _ => validate(&round.scores, round.tricks_available(), None),
        }
    }

    /// Whether the bid input for `seat` is usable right now.
    pub fn seat_enabled(&self, seat: usize) -> bool {
        match self.stage {
            BiddingStage::BlindDeclaration => seat < self.mirror.player_count(),
            BiddingStage::RegularBidding => {
                seat_enabled(seat, self.active, &self.effective_round().scores)
            }
            BiddingStage::Complete => false,
        }
    }

    /// Flip a seat's blind flag. Unchecking also clears the seat's bid.
    pub fn toggle_blind(&mut self, seat: usize) -> Option<BiddingCommit> {
        if self.stage != BiddingStage::BlindDeclaration {
            debug!(seat, stage = ?self.stage, "ignoring blind toggle outside blind declaration");
            return None;
        }
        let player = self.mirror.scores.get_mut(seat)?;
        if player.blind_bid {
            player.blind_bid = false;
            player.bid = None;
        } else {
            player.blind_bid = true;
        }
        self.overlay.remove(&seat);
        Some(BiddingCommit::Round(self.mirror.clone()))
    }

    /// Enter a blind bid. Blind bids are public immediately.
    pub fn set_blind_bid(&mut self, seat: usize, bid: u32) -> Option<BiddingCommit> {
        if self.stage == BiddingStage::Complete {
            return None;
        }
        let player = self.mirror.scores.get_mut(seat)?;
        if !player.blind_bid {
            debug!(seat, "ignoring blind bid for a seat that is not blind");
            return None;
        }
        player.bid = Some(bid);
        self.refresh_active();
        Some(BiddingCommit::Round(self.mirror.clone()))
    }

    /// Leave blind declaration, skipping straight to completion when every
    /// seat went blind.
    pub fn proceed_from_blind_phase(&mut self) -> Option<BiddingCommit> {
        if self.stage != BiddingStage::BlindDeclaration {
            return None;
        }
        if self.validation().all_players_blind() {
            self.stage = BiddingStage::Complete;
            self.active = None;
            return Some(BiddingCommit::Completed(self.mirror.clone()));
        }

        self.stage = BiddingStage::RegularBidding;
        self.overlay.clear();
        self.refresh_active();
        Some(BiddingCommit::PhaseChanged {
            phase: BiddingPhase::RegularBidEntry,
            round: self.mirror.clone(),
        })
    }

    /// Type a regular bid. It stays local until the advance delay elapses
    /// without another edit; every edit restarts the single shared timer.
    ///
    /// Blind seats keep their immediate-push behaviour.
    pub fn set_regular_bid(&mut self, seat: usize, bid: u32) -> Option<BiddingCommit> {
        if self.stage != BiddingStage::RegularBidding || seat >= self.mirror.player_count() {
            return None;
        }
        if self.mirror.scores[seat].blind_bid {
            return self.set_blind_bid(seat, bid);
        }

        self.overlay.insert(seat, bid);
        self.advance = Some(self.timers.arm(TimerKind::BidAdvance, self.advance_delay));
        None
    }

    /// Handle an elapsed advance timer: push the typed bids and move the turn.
    pub fn on_timer(&mut self, fired: &TimerFired) -> Option<BiddingCommit> {
        if !self
            .advance
            .as_ref()
            .is_some_and(|handle| handle.matches(fired))
        {
            return None;
        }
        self.advance = None;
        if self.stage != BiddingStage::RegularBidding || self.overlay.is_empty() {
            return None;
        }

        self.flush_overlay();
        self.refresh_active();
        Some(BiddingCommit::Round(self.mirror.clone()))
    }

    /// Finish regular bidding. Typed-but-unpushed bids are included.
    pub fn complete(&mut self) -> Option<BiddingCommit> {
        if self.stage != BiddingStage::RegularBidding {
            return None;
        }
        self.advance = None;
        self.flush_overlay();
        self.stage = BiddingStage::Complete;
        self.active = None;
        Some(BiddingCommit::Completed(self.mirror.clone()))
    }

    /// Merge a round observed in the shared document.
    ///
    /// Blind flags and committed bids always follow the document. A phase
    /// different from ours is adopted and drops local edits. A different
    /// round number restarts the machine on that round.
    pub fn apply_remote(&mut self, round: &Round, phase: GamePhase, bidding: Option<BiddingPhase>) {
        let remote_stage = BiddingStage::from_document(phase, bidding);

        if round.round_number != self.mirror.round_number || remote_stage != self.stage {
            debug!(
                round = round.round_number,
                from = ?self.stage,
                to = ?remote_stage,
                "following remote bidding phase"
            );
            self.stage = remote_stage;
            self.overlay.clear();
            self.advance = None;
        }

        self.mirror = round.clone();
        let blind = self.mirror.blind_decisions();
        self.overlay
            .retain(|seat, _| !blind.get(*seat).copied().unwrap_or(false));
        if self.overlay.is_empty() {
            self.advance = None;
        }
        self.refresh_active();
    }

    fn flush_overlay(&mut self) {
        for (seat, bid) in std::mem::take(&mut self.overlay) {
            if let Some(player) = self.mirror.scores.get_mut(seat) {
                player.bid = Some(bid);
            }
        }
    }

    fn refresh_active(&mut self) {
        self.active = match self.stage {
            BiddingStage::RegularBidding => {
                let order = ordered_seats(
                    self.mirror.first_bidder_index,
                    self.mirror.player_count(),
                );
                next_bidder(&order, &self.mirror.scores, &self.mirror.blind_decisions())
            }
            _ => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    const DELAY: Duration = Duration::from_secs(2);

    fn machine(
        round_number: u32,
        first: usize,
        players: usize,
    ) -> (BiddingStateMachine, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let names: Vec<String> = (0..players).map(|i| format!("P{i}")).collect();
        let round = Round::new(round_number, first, &names);
        let machine = BiddingStateMachine::new(
            round,
            BiddingStage::BlindDeclaration,
            TimerQueue::new(tx),
            DELAY,
        );
        (machine, rx)
    }

    fn committed_round(commit: Option<BiddingCommit>) -> Round {
        match commit {
            Some(BiddingCommit::Round(round)) => round,
            other => panic!("expected a round push, got {other:?}"),
        }
    }

    #[test]
    fn toggling_blind_pushes_and_unchecking_clears_bid() {
        let (mut sm, _rx) = machine(3, 0, 3);

        let round = committed_round(sm.toggle_blind(1));
        assert!(round.scores[1].blind_bid);

        let round = committed_round(sm.set_blind_bid(1, 2));
        assert_eq!(round.scores[1].bid, Some(2));

        let round = committed_round(sm.toggle_blind(1));
        assert!(!round.scores[1].blind_bid);
        assert_eq!(round.scores[1].bid, None);
    }

    #[test]
    fn blind_bid_requires_blind_flag() {
        let (mut sm, _rx) = machine(3, 0, 3);
        assert!(sm.set_blind_bid(0, 1).is_none());
        assert_eq!(sm.mirror().scores[0].bid, None);
    }

    #[test]
    fn proceeding_picks_first_non_blind_seat() {
        let (mut sm, _rx) = machine(4, 2, 4);
        sm.toggle_blind(2);
        sm.set_blind_bid(2, 1);

        let commit = sm.proceed_from_blind_phase();
        assert!(matches!(
            commit,
            Some(BiddingCommit::PhaseChanged {
                phase: BiddingPhase::RegularBidEntry,
                ..
            })
        ));
        assert_eq!(sm.stage(), BiddingStage::RegularBidding);
        assert_eq!(sm.active_seat(), Some(3));
    }

    #[test]
    fn everyone_blind_skips_regular_bidding() {
        let (mut sm, _rx) = machine(2, 0, 2);
        sm.toggle_blind(0);
        sm.toggle_blind(1);
        sm.set_blind_bid(0, 1);
        sm.set_blind_bid(1, 0);
        assert!(sm.validation().can_proceed_from_blind_phase());

        let commit = sm.proceed_from_blind_phase();
        assert!(matches!(commit, Some(BiddingCommit::Completed(_))));
        assert_eq!(sm.stage(), BiddingStage::Complete);
    }

    #[test]
    fn rule_violations_show_in_validation_instead_of_rejecting() {
        let (mut sm, _rx) = machine(2, 0, 2);
        sm.toggle_blind(0);
        sm.toggle_blind(1);
        sm.set_blind_bid(0, 1);
        sm.set_blind_bid(1, 1);
        assert!(!sm.validation().can_proceed_from_blind_phase());
    }

    #[tokio::test(start_paused = true)]
    async fn regular_bids_stay_local_until_the_delay_elapses() {
        let (mut sm, mut rx) = machine(3, 0, 3);
        sm.proceed_from_blind_phase();
        assert_eq!(sm.active_seat(), Some(0));

        assert!(sm.set_regular_bid(0, 1).is_none());
        assert_eq!(sm.mirror().scores[0].bid, None);
        assert_eq!(sm.effective_round().scores[0].bid, Some(1));
        assert_eq!(sm.pending_seats(), vec![0]);
        assert_eq!(sm.active_seat(), Some(0));

        let fired = rx.recv().await.unwrap();
        let round = committed_round(sm.on_timer(&fired));
        assert_eq!(round.scores[0].bid, Some(1));
        assert_eq!(sm.active_seat(), Some(1));
        assert!(sm.pending_seats().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_collapse_into_one_commit() {
        let (mut sm, mut rx) = machine(3, 0, 3);
        sm.proceed_from_blind_phase();

        sm.set_regular_bid(0, 3);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        sm.set_regular_bid(0, 2);

        let fired = rx.recv().await.unwrap();
        let round = committed_round(sm.on_timer(&fired));
        assert_eq!(round.scores[0].bid, Some(2));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_fire_is_ignored() {
        let (mut sm, _rx) = machine(3, 0, 3);
        sm.proceed_from_blind_phase();
        sm.set_regular_bid(0, 1);

        let stale = TimerFired {
            kind: TimerKind::BidAdvance,
            generation: 0,
        };
        assert!(sm.on_timer(&stale).is_none());
        assert!(sm.has_pending_advance());
    }

    #[test]
    fn only_the_active_seat_is_enabled_for_new_bids() {
        let (mut sm, _rx) = machine(3, 1, 3);
        sm.toggle_blind(0);
        sm.set_blind_bid(0, 0);
        sm.proceed_from_blind_phase();

        assert_eq!(sm.active_seat(), Some(1));
        assert!(sm.seat_enabled(0));
        assert!(sm.seat_enabled(1));
        assert!(!sm.seat_enabled(2));
    }

    #[tokio::test(start_paused = true)]
    async fn completing_folds_pending_bids() {
        let (mut sm, _rx) = machine(1, 0, 2);
        sm.proceed_from_blind_phase();
        sm.set_regular_bid(0, 1);
        sm.set_regular_bid(1, 1);

        match sm.complete() {
            Some(BiddingCommit::Completed(round)) => {
                assert_eq!(round.scores[0].bid, Some(1));
                assert_eq!(round.scores[1].bid, Some(1));
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(!sm.has_pending_advance());
        assert_eq!(sm.stage(), BiddingStage::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_phase_change_discards_overlay() {
        let (mut sm, _rx) = machine(3, 0, 3);
        sm.proceed_from_blind_phase();
        sm.set_regular_bid(0, 2);

        let remote = sm.mirror().clone();
        sm.apply_remote(&remote, GamePhase::Results, None);

        assert_eq!(sm.stage(), BiddingStage::Complete);
        assert!(sm.pending_seats().is_empty());
        assert!(!sm.has_pending_advance());
    }

    #[test]
    fn remote_blind_flags_are_mirrored() {
        let (mut sm, _rx) = machine(3, 0, 3);
        let mut remote = sm.mirror().clone();
        remote.scores[2].blind_bid = true;
        remote.scores[2].bid = Some(1);

        sm.apply_remote(
            &remote,
            GamePhase::Bidding,
            Some(BiddingPhase::BlindDeclarationAndEntry),
        );
        assert!(sm.mirror().scores[2].blind_bid);
        assert_eq!(sm.mirror().scores[2].bid, Some(1));
        assert_eq!(sm.stage(), BiddingStage::BlindDeclaration);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_regular_phase_recomputes_active_seat() {
        let (mut sm, _rx) = machine(3, 2, 3);
        let mut remote = sm.mirror().clone();
        remote.scores[2].bid = Some(0);

        sm.apply_remote(&remote, GamePhase::Bidding, Some(BiddingPhase::RegularBidEntry));
        assert_eq!(sm.stage(), BiddingStage::RegularBidding);
        assert_eq!(sm.active_seat(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_echo_keeps_local_edits() {
        let (mut sm, _rx) = machine(3, 0, 3);
        sm.proceed_from_blind_phase();
        sm.set_regular_bid(0, 2);

        let echo = sm.mirror().clone();
        sm.apply_remote(&echo, GamePhase::Bidding, Some(BiddingPhase::RegularBidEntry));
        assert_eq!(sm.effective_round().scores[0].bid, Some(2));
        assert!(sm.has_pending_advance());
    }

    #[test]
    fn new_round_resets_the_machine() {
        let (mut sm, _rx) = machine(3, 0, 3);
        sm.proceed_from_blind_phase();

        let names = ["P0", "P1", "P2"];
        let next = Round::new(4, 1, &names);
        sm.apply_remote(
            &next,
            GamePhase::Bidding,
            Some(BiddingPhase::BlindDeclarationAndEntry),
        );
        assert_eq!(sm.round_number(), 4);
        assert_eq!(sm.stage(), BiddingStage::BlindDeclaration);
        assert_eq!(sm.active_seat(), None);
    }
}
