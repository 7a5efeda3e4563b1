//! One viewer's client runtime for a game table.
//!
//! A session is an actor: commands, document snapshots and timer fires all
//! land in one inbox and are handled in order on a single task. The session
//! owns the bidding machine and the round lifecycle controller, pushes their
//! commits to the shared document and publishes a [`TableView`] after every
//! event.

use std::time::{Duration, SystemTime};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::storage::StorageError,
    domain::{Game, Round, standings},
    dto::{game::RoundView, table::TableView},
    error::ServiceError,
    services::sync_adapter::{RemoteEvent, Subscription, SyncAdapter},
    state::{
        bidding::{BiddingCommit, BiddingStage, BiddingStateMachine},
        round_lifecycle::{LifecycleCommit, RoundLifecycle, RoundStage},
        timer::{TimerFired, TimerKind, TimerQueue},
        update::GameUpdate,
    },
};

/// Action a viewer can take at the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableCommand {
    /// Flip a seat's blind flag.
    ToggleBlind { seat: usize },
    /// Enter a blind seat's bid.
    SetBlindBid { seat: usize, bid: u32 },
    /// Leave blind declaration.
    ProceedFromBlind,
    /// Type a regular bid.
    SetBid { seat: usize, bid: u32 },
    /// Finish bidding and open results entry.
    CompleteBidding,
    /// Record whether a seat made its bid.
    RecordResult { seat: usize, made: bool },
    /// Seal the round without waiting for the auto-complete delay.
    CompleteResults,
}

type Reply = oneshot::Sender<Result<TableView, ServiceError>>;

/// Everything that can wake a session up.
#[derive(Debug)]
pub enum TableEvent {
    /// A viewer command awaiting its reply.
    Command { command: TableCommand, reply: Reply },
    /// News from the shared document.
    Remote(RemoteEvent),
    /// One of the session's timers elapsed.
    Timer(TimerFired),
}

impl From<TimerFired> for TableEvent {
    fn from(value: TimerFired) -> Self {
        TableEvent::Timer(value)
    }
}

impl From<RemoteEvent> for TableEvent {
    fn from(value: RemoteEvent) -> Self {
        TableEvent::Remote(value)
    }
}

/// Handle to a running session. Dropping it unmounts the session; writes
/// already pushed stay in the document.
#[derive(Debug)]
pub struct TableHandle {
    viewer_id: Uuid,
    game_id: Uuid,
    inbox: mpsc::UnboundedSender<TableEvent>,
    view: watch::Receiver<TableView>,
    task: JoinHandle<()>,
}

impl TableHandle {
    /// Load `game_id` and start a session following it.
    pub async fn mount(
        adapter: SyncAdapter,
        game_id: Uuid,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let game = adapter
            .read(game_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?;

        let (inbox, receiver) = mpsc::unbounded_channel();
        let subscription = adapter
            .subscribe(game_id, inbox.clone())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?;

        let viewer_id = Uuid::new_v4();
        let timers = TimerQueue::new(inbox.clone());
        let mut session = TableSession {
            viewer_id,
            game_id,
            lifecycle: RoundLifecycle::new(timers.clone(), config.lifecycle_delays()),
            bidding: None,
            bid_advance_delay: config.bid_advance_delay,
            timers,
            adapter,
            subscription: Some(subscription),
            newest_stored: game.updated_at,
            error: None,
            game,
        };
        session.follow_document();

        let (view_tx, view) = watch::channel(session.view());
        let task = tokio::spawn(session.run(receiver, view_tx));
        info!(game_id = %game_id, viewer_id = %viewer_id, "table mounted");

        Ok(Self {
            viewer_id,
            game_id,
            inbox,
            view,
            task,
        })
    }

    /// Viewer id of this session.
    pub fn viewer_id(&self) -> Uuid {
        self.viewer_id
    }

    /// Game this session follows.
    pub fn game_id(&self) -> Uuid {
        self.game_id
    }

    /// Latest published view.
    pub fn view(&self) -> TableView {
        self.view.borrow().clone()
    }

    /// Follow every published view.
    pub fn subscribe(&self) -> watch::Receiver<TableView> {
        self.view.clone()
    }

    /// Sender half of the session inbox, usable after the handle is released.
    pub fn dispatcher(&self) -> TableDispatcher {
        TableDispatcher {
            inbox: self.inbox.clone(),
        }
    }

    /// Run `command` and return the view right after it was applied.
    pub async fn dispatch(&self, command: TableCommand) -> Result<TableView, ServiceError> {
        self.dispatcher().dispatch(command).await
    }
}

/// Cloneable command sender for a running session.
#[derive(Debug, Clone)]
pub struct TableDispatcher {
    inbox: mpsc::UnboundedSender<TableEvent>,
}

impl TableDispatcher {
    /// Run `command` and return the view right after it was applied.
    pub async fn dispatch(&self, command: TableCommand) -> Result<TableView, ServiceError> {
        let stopped = || ServiceError::InvalidState("table is no longer running".into());
        let (reply, response) = oneshot::channel();
        self.inbox
            .send(TableEvent::Command { command, reply })
            .map_err(|_| stopped())?;
        response.await.map_err(|_| stopped())?
    }
}

impl Drop for TableHandle {
    fn drop(&mut self) {
        self.task.abort();
        debug!(game_id = %self.game_id, viewer_id = %self.viewer_id, "table unmounted");
    }
}

struct TableSession {
    viewer_id: Uuid,
    game_id: Uuid,
    game: Game,
    bidding: Option<BiddingStateMachine>,
    lifecycle: RoundLifecycle,
    bid_advance_delay: Duration,
    timers: TimerQueue,
    adapter: SyncAdapter,
    subscription: Option<Subscription>,
    /// Stamp of the newest stored document seen or written.
    newest_stored: SystemTime,
    error: Option<String>,
}

impl TableSession {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<TableEvent>,
        view: watch::Sender<TableView>,
    ) {
        while let Some(event) = inbox.recv().await {
            match event {
                TableEvent::Command { command, reply } => {
                    let result = self.handle_command(command).await;
                    if let Err(err) = &result {
                        debug!(game_id = %self.game_id, ?command, error = %err, "command rejected");
                    }
                    let _ = reply.send(result.map(|()| self.view()));
                }
                TableEvent::Remote(RemoteEvent::Snapshot(game)) => self.on_snapshot(*game),
                TableEvent::Remote(RemoteEvent::Deleted) => {
                    self.fail("game no longer exists".into());
                }
                TableEvent::Timer(fired) => self.on_timer(fired).await,
            }
            view.send_replace(self.view());
        }
    }

    fn on_snapshot(&mut self, game: Game) {
        if self.error.is_some() {
            return;
        }
        if game.updated_at < self.newest_stored {
            debug!(game_id = %self.game_id, "skipping snapshot older than the newest one seen");
            return;
        }
        self.newest_stored = game.updated_at;
        self.game = game;
        self.follow_document();
    }

    async fn on_timer(&mut self, fired: TimerFired) {
        if self.error.is_some() {
            return;
        }
        let update = match fired.kind {
            TimerKind::BidAdvance => self
                .bidding
                .as_mut()
                .and_then(|machine| machine.on_timer(&fired))
                .map(|commit| self.bidding_update(commit)),
            TimerKind::AutoComplete | TimerKind::NextRound => self
                .lifecycle
                .on_timer(&fired, &self.game)
                .map(GameUpdate::from),
        };
        if let Some(update) = update {
            self.commit(update).await;
        }
    }

    async fn handle_command(&mut self, command: TableCommand) -> Result<(), ServiceError> {
        if let Some(error) = &self.error {
            return Err(ServiceError::NotFound(error.clone()));
        }
        if self.game.is_completed() {
            return Err(ServiceError::InvalidState("the game is over".into()));
        }

        let update = match command {
            TableCommand::ToggleBlind { seat } => {
                let machine = self.bidding_at(&[BiddingStage::BlindDeclaration])?;
                check_seat(machine.mirror().player_count(), seat)?;
                machine.toggle_blind(seat)
            }
            TableCommand::SetBlindBid { seat, bid } => {
                let machine = self.bidding_at(&[
                    BiddingStage::BlindDeclaration,
                    BiddingStage::RegularBidding,
                ])?;
                check_seat(machine.mirror().player_count(), seat)?;
                if !machine.mirror().scores[seat].blind_bid {
                    return Err(ServiceError::InvalidState(format!(
                        "seat {seat} has not declared blind"
                    )));
                }
                machine.set_blind_bid(seat, bid)
            }
            TableCommand::ProceedFromBlind => {
                let machine = self.bidding_at(&[BiddingStage::BlindDeclaration])?;
                if !machine.validation().can_proceed_from_blind_phase() {
                    return Err(ServiceError::InvalidState(
                        "blind bids are missing, or every seat is blind and the bids total the tricks available".into(),
                    ));
                }
                machine.proceed_from_blind_phase()
            }
            TableCommand::SetBid { seat, bid } => {
                let machine = self.bidding_at(&[BiddingStage::RegularBidding])?;
                check_seat(machine.mirror().player_count(), seat)?;
                if !machine.seat_enabled(seat) {
                    return Err(ServiceError::InvalidState(format!(
                        "seat {seat} cannot bid yet"
                    )));
                }
                machine.set_regular_bid(seat, bid)
            }
            TableCommand::CompleteBidding => {
                let machine = self.bidding_at(&[BiddingStage::RegularBidding])?;
                if !machine.validation().can_proceed {
                    return Err(ServiceError::InvalidState(
                        "every seat must bid and the total must not equal the tricks available"
                            .into(),
                    ));
                }
                machine.complete()
            }
            TableCommand::RecordResult { seat, made } => {
                let round = self.round_in_results()?;
                check_seat(round.player_count(), seat)?;
                if !round.scores[seat].has_bid() {
                    return Err(ServiceError::InvalidState(format!("seat {seat} has no bid")));
                }
                let commit = self.lifecycle.record_result(&self.game, seat, made);
                return self.commit_lifecycle(commit).await;
            }
            TableCommand::CompleteResults => {
                if !self.round_in_results()?.all_results_recorded() {
                    return Err(ServiceError::InvalidState(
                        "every seat needs a result first".into(),
                    ));
                }
                let commit = self.lifecycle.complete_now(&self.game);
                return self.commit_lifecycle(commit).await;
            }
        };

        if let Some(commit) = update {
            let update = self.bidding_update(commit);
            self.commit(update).await;
        }
        Ok(())
    }

    async fn commit_lifecycle(
        &mut self,
        commit: Option<LifecycleCommit>,
    ) -> Result<(), ServiceError> {
        if let Some(commit) = commit {
            self.commit(commit.into()).await;
        }
        Ok(())
    }

    /// Turn a bidding commit into a document update, routing completion
    /// through the lifecycle controller.
    fn bidding_update(&mut self, commit: BiddingCommit) -> GameUpdate {
        match GameUpdate::from_bidding(commit) {
            Ok(update) => update,
            Err(round) => self.lifecycle.enter_results(round).into(),
        }
    }

    /// Apply `update` locally and push it. Failed writes keep the local state.
    async fn commit(&mut self, update: GameUpdate) {
        update.apply_to(&mut self.game, SystemTime::now());
        self.follow_document();

        match self.adapter.patch(self.game_id, update).await {
            Ok(written) => {
                self.newest_stored = self.newest_stored.max(written);
                self.game.updated_at = written;
            }
            Err(StorageError::Missing { .. }) => self.fail("game no longer exists".into()),
            Err(err) => {
                warn!(
                    game_id = %self.game_id,
                    viewer_id = %self.viewer_id,
                    error = %err,
                    "failed to push table update; keeping local state"
                );
            }
        }
    }

    /// Bring both machines in line with `self.game`.
    fn follow_document(&mut self) {
        if let Some(round) = &self.game.in_progress_round {
            match &mut self.bidding {
                Some(machine) => {
                    machine.apply_remote(round, self.game.current_phase, self.game.bidding_phase)
                }
                None => {
                    self.bidding = Some(BiddingStateMachine::new(
                        round.clone(),
                        BiddingStage::from_document(
                            self.game.current_phase,
                            self.game.bidding_phase,
                        ),
                        self.timers.clone(),
                        self.bid_advance_delay,
                    ));
                }
            }
        }

        self.lifecycle.apply_remote(&self.game);
        if self.game.awaiting_next_round() {
            self.lifecycle.schedule_recovery();
        }
    }

    fn fail(&mut self, message: String) {
        warn!(game_id = %self.game_id, viewer_id = %self.viewer_id, %message, "table stopped");
        self.error = Some(message);
        self.subscription = None;
        self.bidding = None;
        self.lifecycle.cancel_timers();
    }

    fn bidding_at(
        &mut self,
        stages: &[BiddingStage],
    ) -> Result<&mut BiddingStateMachine, ServiceError> {
        if self.game.in_progress_round.is_none() {
            return Err(ServiceError::InvalidState("no round is being bid".into()));
        }
        let machine = self
            .bidding
            .as_mut()
            .ok_or_else(|| ServiceError::InvalidState("no round is being bid".into()))?;
        if !stages.contains(&machine.stage()) {
            return Err(ServiceError::InvalidState(format!(
                "not allowed during {:?}",
                machine.stage()
            )));
        }
        Ok(machine)
    }

    fn round_in_results(&self) -> Result<&Round, ServiceError> {
        if self.lifecycle.stage() != RoundStage::Results {
            return Err(ServiceError::InvalidState(
                "results are not being recorded".into(),
            ));
        }
        self.game
            .in_progress_round
            .as_ref()
            .ok_or_else(|| ServiceError::InvalidState("no round in progress".into()))
    }

    fn view(&self) -> TableView {
        let in_progress = self.game.in_progress_round.as_ref();
        let machine = self
            .bidding
            .as_ref()
            .filter(|machine| {
                in_progress.is_some_and(|round| round.round_number == machine.round_number())
            });
        let bidding = machine.filter(|machine| machine.stage() != BiddingStage::Complete);

        let round = match machine {
            Some(machine) => Some(RoundView::from(&machine.effective_round())),
            None => in_progress.map(RoundView::from),
        };
        let enabled_seats = match bidding {
            Some(machine) => (0..machine.mirror().player_count())
                .filter(|seat| machine.seat_enabled(*seat))
                .collect(),
            None => Vec::new(),
        };

        TableView {
            viewer_id: self.viewer_id,
            game_id: self.game_id,
            name: self.game.name.clone(),
            status: self.game.status,
            current_phase: self.game.current_phase,
            bidding_phase: self.game.bidding_phase,
            round,
            active_seat: bidding.and_then(BiddingStateMachine::active_seat),
            enabled_seats,
            pending_seats: bidding.map(|m| m.pending_seats()).unwrap_or_default(),
            validation: bidding.map(BiddingStateMachine::validation),
            auto_complete_pending: self.lifecycle.auto_complete_pending(),
            completed_rounds: self.game.rounds.iter().map(RoundView::from).collect(),
            standings: standings(&self.game.setup, &self.game.rounds),
            max_rounds: self.game.setup.max_rounds,
            error: self.error.clone(),
        }
    }
}

fn check_seat(players: usize, seat: usize) -> Result<(), ServiceError> {
    if seat >= players {
        return Err(ServiceError::InvalidInput(format!(
            "seat {seat} does not exist at a table of {players}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dao::game_store::{GameStore, memory::MemoryGameStore},
        domain::{BiddingPhase, GamePhase, GameSetup, GameStatus},
    };

    async fn table(players: &[&str]) -> (Arc<MemoryGameStore>, SyncAdapter, Uuid) {
        let store = Arc::new(MemoryGameStore::new(16));
        let adapter = SyncAdapter::new(store.clone());
        let setup = GameSetup::new(players.iter().map(|p| p.to_string()).collect(), 1, 0).unwrap();
        let id = adapter.create(Game::new("friday", setup)).await.unwrap();
        (store, adapter, id)
    }

    async fn mount(adapter: &SyncAdapter, id: Uuid) -> TableHandle {
        TableHandle::mount(adapter.clone(), id, &AppConfig::default())
            .await
            .unwrap()
    }

    async fn wait_for(handle: &TableHandle, check: impl Fn(&TableView) -> bool) -> TableView {
        let mut views = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                let view = views.borrow_and_update().clone();
                if check(&view) {
                    return view;
                }
                views.changed().await.unwrap();
            }
        })
        .await
        .expect("table never reached the expected view")
    }

    fn bid(view: &TableView, seat: usize) -> Option<u32> {
        view.round.as_ref().and_then(|round| round.scores[seat].bid)
    }

    #[tokio::test(start_paused = true)]
    async fn full_round_ties_both_players_at_ten() {
        let (_store, adapter, id) = table(&["Ann", "Bob"]).await;
        let table = mount(&adapter, id).await;

        let view = table.dispatch(TableCommand::ProceedFromBlind).await.unwrap();
        assert_eq!(view.active_seat, Some(0));
        assert_eq!(view.enabled_seats, vec![0]);

        let view = table
            .dispatch(TableCommand::SetBid { seat: 0, bid: 0 })
            .await
            .unwrap();
        assert_eq!(view.pending_seats, vec![0]);
        assert_eq!(bid(&view, 0), Some(0));
        wait_for(&table, |view| view.active_seat == Some(1)).await;

        table
            .dispatch(TableCommand::SetBid { seat: 1, bid: 0 })
            .await
            .unwrap();
        let view = wait_for(&table, |view| {
            view.pending_seats.is_empty()
                && view.validation.as_ref().is_some_and(|v| v.can_proceed)
        })
        .await;
        assert_eq!(bid(&view, 1), Some(0));

        let view = table.dispatch(TableCommand::CompleteBidding).await.unwrap();
        assert_eq!(view.current_phase, GamePhase::Results);
        assert!(view.validation.is_none());

        table
            .dispatch(TableCommand::RecordResult { seat: 0, made: true })
            .await
            .unwrap();
        let view = table
            .dispatch(TableCommand::RecordResult { seat: 1, made: true })
            .await
            .unwrap();
        assert!(view.auto_complete_pending);

        let view = wait_for(&table, |view| {
            view.round.as_ref().is_some_and(|round| round.round_number == 2)
        })
        .await;
        assert_eq!(view.completed_rounds.len(), 1);
        assert_eq!(view.completed_rounds[0].scores[0].score, 10);
        assert_eq!(view.round.as_ref().unwrap().first_bidder_index, 1);
        assert_eq!(view.bidding_phase, Some(BiddingPhase::BlindDeclarationAndEntry));
        assert!(view.standings.iter().all(|s| s.total == 10 && s.rank == 1));

        let stored = adapter.read(id).await.unwrap().unwrap();
        assert_eq!(stored.rounds.len(), 1);
        assert_eq!(stored.in_progress_round.unwrap().round_number, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn viewers_see_each_others_blind_flags() {
        let (_store, adapter, id) = table(&["Ann", "Bob", "Cy"]).await;
        let first = mount(&adapter, id).await;
        let second = mount(&adapter, id).await;
        assert_ne!(first.viewer_id(), second.viewer_id());

        first
            .dispatch(TableCommand::ToggleBlind { seat: 2 })
            .await
            .unwrap();
        first
            .dispatch(TableCommand::SetBlindBid { seat: 2, bid: 1 })
            .await
            .unwrap();

        let view = wait_for(&second, |view| bid(view, 2) == Some(1)).await;
        assert!(view.round.as_ref().unwrap().scores[2].blind_bid);

        second.dispatch(TableCommand::ProceedFromBlind).await.unwrap();
        let view = wait_for(&first, |view| view.active_seat == Some(0)).await;
        assert_eq!(
            view.bidding_phase,
            Some(BiddingPhase::RegularBidEntry)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_checked_against_the_stage() {
        let (_store, adapter, id) = table(&["Ann", "Bob"]).await;
        let table = mount(&adapter, id).await;

        let err = table
            .dispatch(TableCommand::SetBid { seat: 0, bid: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let err = table
            .dispatch(TableCommand::ToggleBlind { seat: 5 })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let err = table
            .dispatch(TableCommand::SetBlindBid { seat: 0, bid: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let err = table
            .dispatch(TableCommand::RecordResult { seat: 0, made: true })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        table.dispatch(TableCommand::ProceedFromBlind).await.unwrap();
        let err = table
            .dispatch(TableCommand::SetBid { seat: 1, bid: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let err = table
            .dispatch(TableCommand::CompleteBidding)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn bids_totalling_the_tricks_cannot_complete() {
        let (_store, adapter, id) = table(&["Ann", "Bob"]).await;
        let table = mount(&adapter, id).await;
        table.dispatch(TableCommand::ProceedFromBlind).await.unwrap();

        table
            .dispatch(TableCommand::SetBid { seat: 0, bid: 1 })
            .await
            .unwrap();
        wait_for(&table, |view| view.active_seat == Some(1)).await;
        table
            .dispatch(TableCommand::SetBid { seat: 1, bid: 0 })
            .await
            .unwrap();
        let view = wait_for(&table, |view| view.pending_seats.is_empty()).await;
        let validation = view.validation.unwrap();
        assert!(validation.all_bids_entered);
        assert!(validation.bids_equal_tricks);

        let err = table
            .dispatch(TableCommand::CompleteBidding)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn late_snapshots_never_roll_a_viewer_back() {
        let (store, adapter, id) = table(&["Ann", "Bob"]).await;
        let writer = mount(&adapter, id).await;
        let follower = mount(&adapter, id).await;
        let before = store.find_game(id).await.unwrap().unwrap();
        let is_blind = |view: &TableView| {
            view.round
                .as_ref()
                .is_some_and(|round| round.scores[0].blind_bid)
        };

        writer
            .dispatch(TableCommand::ToggleBlind { seat: 0 })
            .await
            .unwrap();
        wait_for(&follower, is_blind).await;

        store.hub().publish(&before);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(is_blind(&writer.view()));
        assert!(is_blind(&follower.view()));

        adapter.patch(id, GameUpdate::end_game()).await.unwrap();
        wait_for(&follower, |view| view.status == GameStatus::Completed).await;

        store.hub().publish(&before);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let view = follower.view();
        assert_eq!(view.status, GameStatus::Completed);
        assert!(view.round.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn another_viewer_deals_when_the_sealer_leaves() {
        let config = AppConfig::default();
        let (_store, adapter, id) = table(&["Ann", "Bob"]).await;
        let sealer = mount(&adapter, id).await;
        let follower = mount(&adapter, id).await;

        for seat in 0..2 {
            sealer
                .dispatch(TableCommand::ToggleBlind { seat })
                .await
                .unwrap();
            sealer
                .dispatch(TableCommand::SetBlindBid { seat, bid: 0 })
                .await
                .unwrap();
        }
        let view = sealer.dispatch(TableCommand::ProceedFromBlind).await.unwrap();
        assert_eq!(view.current_phase, GamePhase::Results);
        for seat in 0..2 {
            sealer
                .dispatch(TableCommand::RecordResult { seat, made: true })
                .await
                .unwrap();
        }
        let view = sealer.dispatch(TableCommand::CompleteResults).await.unwrap();
        assert_eq!(view.completed_rounds.len(), 1);
        assert!(view.round.is_none());

        let started = tokio::time::Instant::now();
        drop(sealer);

        let view = wait_for(&follower, |view| {
            view.round.as_ref().is_some_and(|round| round.round_number == 2)
        })
        .await;
        assert!(started.elapsed() >= config.recovery_delay);
        assert_eq!(view.round.as_ref().unwrap().first_bidder_index, 1);

        let stored = adapter.read(id).await.unwrap().unwrap();
        assert_eq!(stored.rounds.len(), 1);
        let round = stored.in_progress_round.unwrap();
        assert_eq!(round.round_number, 2);
        assert_eq!(round.first_bidder_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_games_stop_the_table() {
        let (store, adapter, id) = table(&["Ann", "Bob"]).await;
        let table = mount(&adapter, id).await;

        store.delete_game(id).await.unwrap();
        let view = wait_for(&table, |view| view.error.is_some()).await;
        assert_eq!(view.error.as_deref(), Some("game no longer exists"));

        let err = table
            .dispatch(TableCommand::ProceedFromBlind)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn ended_games_reject_commands() {
        let (_store, adapter, id) = table(&["Ann", "Bob"]).await;
        let table = mount(&adapter, id).await;

        adapter.patch(id, GameUpdate::end_game()).await.unwrap();
        let view = wait_for(&table, |view| view.status == GameStatus::Completed).await;
        assert!(view.round.is_none());
        assert!(view.enabled_seats.is_empty());

        let err = table
            .dispatch(TableCommand::ToggleBlind { seat: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn missing_games_cannot_be_mounted() {
        let (_store, adapter, _id) = table(&["Ann", "Bob"]).await;
        let err = TableHandle::mount(adapter, Uuid::new_v4(), &AppConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
