//! The async shell around `RoomState` (component C4/C5 wiring).
//!
//! Exactly one task owns a room's state. Every client intent and every
//! timer firing arrives as a `RoomCommand` on the same mpsc queue, so no
//! operation on a room is ever observed interleaved with another — the
//! serialization a shared room needs falls out of single ownership rather
//! than per-field locks.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::RoomError;
use crate::protocol::{
    AutoAdvanceScheduled, BettingEndReason, BettingPhaseEnded, BettingPhaseStarted, BettingTick,
    MembersUpdate, RoomEvent, SyncMode,
};
use crate::room::state::{
    BettingExitOutcome, BettingTickOutcome, PostDealOutcome, RoomState, AUTO_ADVANCE_DELAY_MS,
    BETTING_DURATION_MS, DEALING_ANIMATION_DELAY_MS, NO_BETS_RESTART_DELAY_MS,
};

/// Monotonic clock abstraction, mockable so timer-driven transitions can
/// be tested without a real delay.
/// Production uses wall-clock milliseconds; tests can substitute a fixed
/// or stepping implementation without touching `RoomState`.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

pub enum RoomCommand {
    Join {
        display_name: String,
        reply: oneshot::Sender<String>,
    },
    Leave {
        seat_id: String,
    },
    /// Registers a socket's unicast channel so command handlers can reply
    /// to just that connection (confirmations, rejections, sync replies)
    /// instead of the room-wide broadcast.
    RegisterConnection {
        seat_id: String,
        tx: mpsc::UnboundedSender<RoomEvent>,
    },
    Start {
        seat_id: String,
        reply: Reply<()>,
    },
    Restart {
        seat_id: String,
        reply: Reply<()>,
    },
    PlaceBet {
        seat_id: String,
        amount: i64,
        reply: Reply<()>,
    },
    ClearBet {
        seat_id: String,
        reply: Reply<()>,
    },
    Ready {
        seat_id: String,
        reply: Reply<()>,
    },
    Hit {
        seat_id: String,
        reply: Reply<()>,
    },
    Stand {
        seat_id: String,
        reply: Reply<()>,
    },
    RequestSync {
        seat_id: String,
        last_seen_round_id: Option<Uuid>,
        mode: SyncMode,
    },
    // Internal timer firings. No reply: their effect is observed only
    // through broadcast events.
    BettingTick,
    DealingAnimationDone,
    AutoAdvanceFired,
    NoBetsRestartFired,
}

#[derive(Clone)]
pub struct RoomHandle {
    pub code: String,
    cmd_tx: mpsc::UnboundedSender<RoomCommand>,
    events: broadcast::Sender<RoomEvent>,
}

impl RoomHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, RoomError>>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(make(tx));
        rx.await
            .unwrap_or_else(|_| Err(RoomError::room_not_found(&self.code)))
    }

    pub async fn join(&self, display_name: String) -> String {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(RoomCommand::Join { display_name, reply: tx });
        rx.await.unwrap_or_default()
    }

    pub fn leave(&self, seat_id: String) {
        let _ = self.cmd_tx.send(RoomCommand::Leave { seat_id });
    }

    /// Register a socket's unicast channel so it can receive confirmations,
    /// rejections, and sync replies addressed only to it.
    pub fn register_connection(&self, seat_id: String) -> mpsc::UnboundedReceiver<RoomEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.cmd_tx.send(RoomCommand::RegisterConnection { seat_id, tx });
        rx
    }

    pub async fn start(&self, seat_id: String) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Start { seat_id, reply }).await
    }

    pub async fn restart(&self, seat_id: String) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Restart { seat_id, reply }).await
    }

    pub async fn place_bet(&self, seat_id: String, amount: i64) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::PlaceBet { seat_id, amount, reply }).await
    }

    pub async fn clear_bet(&self, seat_id: String) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::ClearBet { seat_id, reply }).await
    }

    pub async fn ready(&self, seat_id: String) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Ready { seat_id, reply }).await
    }

    pub async fn hit(&self, seat_id: String) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Hit { seat_id, reply }).await
    }

    pub async fn stand(&self, seat_id: String) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Stand { seat_id, reply }).await
    }

    /// Fire-and-forget: the reply is delivered asynchronously as a unicast
    /// `RoomEvent::SyncReply` over the channel from `register_connection`.
    pub fn request_sync(&self, seat_id: String, mode: SyncMode, last_seen_round_id: Option<Uuid>) {
        let _ = self
            .cmd_tx
            .send(RoomCommand::RequestSync { seat_id, last_seen_round_id, mode });
    }
}

struct RoomActor<C: Clock> {
    state: RoomState,
    clock: C,
    events: broadcast::Sender<RoomEvent>,
    cmd_tx: mpsc::UnboundedSender<RoomCommand>,
    cmd_rx: mpsc::UnboundedReceiver<RoomCommand>,
    betting_ticker: Option<JoinHandle<()>>,
    deadline_timer: Option<JoinHandle<()>>,
    /// Per-seat unicast channels, registered by `ws.rs` right after a
    /// socket joins, used for confirmations/rejections/sync replies that
    /// must reach only the requesting connection rather than the whole room.
    connections: HashMap<String, mpsc::UnboundedSender<RoomEvent>>,
}

/// Spawn a room actor with the given code and founding creator, returning a
/// cloneable handle plus the creator's seat id.
pub fn spawn(code: impl Into<String>, creator_display_name: String) -> (RoomHandle, String) {
    spawn_with_clock(code, creator_display_name, SystemClock)
}

pub fn spawn_with_clock<C: Clock>(
    code: impl Into<String>,
    creator_display_name: String,
    clock: C,
) -> (RoomHandle, String) {
    let (mut state, creator_id) = RoomState::new_with_creator(code.into(), creator_display_name);
    let code = state.code.clone();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(256);

    let handle = RoomHandle {
        code: code.clone(),
        cmd_tx: cmd_tx.clone(),
        events: events.clone(),
    };

    // Emit the initial membership snapshot before anyone else connects so a
    // late-subscribing creator socket can still request a sync.
    let _ = state.snapshot(clock.now_ms());

    let actor = RoomActor {
        state,
        clock,
        events,
        cmd_tx,
        cmd_rx,
        betting_ticker: None,
        deadline_timer: None,
        connections: HashMap::new(),
    };
    tokio::spawn(actor.run());

    (handle, creator_id)
}

impl<C: Clock> RoomActor<C> {
    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    fn emit(&self, event: RoomEvent) {
        let _ = self.events.send(event);
    }

    /// Send `event` only to the connection registered for `seat_id`. Drops
    /// the registration if the socket has gone away.
    fn unicast(&mut self, seat_id: &str, event: RoomEvent) {
        let dead = match self.connections.get(seat_id) {
            Some(tx) => tx.send(event).is_err(),
            None => false,
        };
        if dead {
            self.connections.remove(seat_id);
        }
    }

    fn emit_snapshot(&mut self) {
        let now = self.now();
        let snap = self.state.snapshot(now);
        self.emit(RoomEvent::Snapshot(snap));
    }

    fn emit_members_update(&self) {
        let seats = self
            .state
            .seats
            .iter()
            .enumerate()
            .map(|(i, s)| crate::protocol::SeatView {
                id: s.id.clone(),
                position: i as u32,
                display_name: s.display_name.clone(),
                hand: s.hand.clone(),
                total: s.total,
                natural: s.natural,
                bust: s.bust,
                standing: s.standing,
                outcome: s.outcome,
                balance: self.state.ledger.balance(&s.id).unwrap_or(0),
                current_bet: self
                    .state
                    .ledger
                    .snapshot(&s.id)
                    .map(|a| a.current_bet)
                    .unwrap_or(0),
                has_placed_bet: self
                    .state
                    .ledger
                    .snapshot(&s.id)
                    .map(|a| a.has_placed_bet)
                    .unwrap_or(false),
                stats: self.state.ledger.stats(&s.id).ok().cloned().unwrap_or_default(),
            })
            .collect();
        self.emit(RoomEvent::MembersUpdate(MembersUpdate {
            seats,
            creator_id: self.state.creator_id.clone(),
        }));
    }

    async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            self.handle(cmd);
            if self.state.is_empty() {
                self.teardown();
                break;
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(h) = self.betting_ticker.take() {
            h.abort();
        }
        if let Some(h) = self.deadline_timer.take() {
            h.abort();
        }
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { display_name, reply } => {
                let seat_id = self.state.join(display_name);
                let _ = reply.send(seat_id);
                self.emit_members_update();
                self.emit_snapshot();
            }
            RoomCommand::Leave { seat_id } => {
                let was_betting_turn = self.state.phase == crate::room::state::Phase::Playing;
                self.connections.remove(&seat_id);
                if self.state.leave(&seat_id).is_ok() {
                    self.emit_members_update();
                    if !self.state.is_empty() {
                        self.emit_snapshot();
                        if was_betting_turn
                            && self.state.phase == crate::room::state::Phase::DealerTurn
                        {
                            self.run_dealer_turn_and_result();
                        }
                    }
                }
            }
            RoomCommand::RegisterConnection { seat_id, tx } => {
                self.connections.insert(seat_id, tx);
            }
            RoomCommand::Start { seat_id, reply } => {
                let result = self.state.start_round(&seat_id, self.now());
                self.finish_reply(&seat_id, reply, result, |me| me.on_entered_betting());
            }
            RoomCommand::Restart { seat_id, reply } => {
                let result = self.state.restart_round(&seat_id, self.now());
                self.finish_reply(&seat_id, reply, result, |me| {
                    me.emit(RoomEvent::AutoAdvanceCancelled);
                    me.on_entered_betting();
                });
            }
            RoomCommand::PlaceBet { seat_id, amount, reply } => {
                let result = self.state.place_bet(&seat_id, amount);
                match &result {
                    Ok(()) => {
                        let snap = self.state.ledger.snapshot(&seat_id).ok();
                        if let Some(snap) = snap {
                            self.unicast(&seat_id, RoomEvent::BetConfirmed {
                                current_bet: snap.current_bet,
                                balance: snap.balance,
                            });
                        }
                        self.emit_snapshot();
                        self.maybe_end_betting_early();
                    }
                    Err(e) => self.unicast(&seat_id, RoomEvent::BetRejected(e.into())),
                }
                let _ = reply.send(result);
            }
            RoomCommand::ClearBet { seat_id, reply } => {
                let result = self.state.clear_bet(&seat_id);
                match &result {
                    Ok(()) => {
                        let balance = self.state.ledger.balance(&seat_id).unwrap_or(0);
                        self.unicast(&seat_id, RoomEvent::BetCleared { balance });
                        self.emit_snapshot();
                    }
                    Err(e) => self.unicast(&seat_id, RoomEvent::BetRejected(e.into())),
                }
                let _ = reply.send(result);
            }
            RoomCommand::Ready { seat_id, reply } => {
                let result = self.state.ready(&seat_id);
                match result {
                    Ok(early_end) => {
                        let _ = reply.send(Ok(()));
                        if early_end {
                            self.end_betting(BettingEndReason::AllReady);
                        }
                    }
                    Err(e) => {
                        self.unicast(&seat_id, RoomEvent::RoomError((&e).into()));
                        let _ = reply.send(Err(e));
                    }
                }
            }
            RoomCommand::Hit { seat_id, reply } => {
                let mut rng = rand::thread_rng();
                let result = self.state.hit(&seat_id, &mut rng);
                self.finish_reply(&seat_id, reply, result, |me| me.after_action());
            }
            RoomCommand::Stand { seat_id, reply } => {
                let result = self.state.stand(&seat_id);
                self.finish_reply(&seat_id, reply, result, |me| me.after_action());
            }
            RoomCommand::RequestSync { seat_id, last_seen_round_id, mode: _ } => {
                let now = self.now();
                let current_round = self.state.round_id;
                let snapshot = self.state.snapshot(now);
                let stale = last_seen_round_id.map(|r| r != current_round).unwrap_or(true);
                self.unicast(&seat_id, RoomEvent::SyncReply { snapshot, stale });
            }
            RoomCommand::BettingTick => self.on_betting_tick(),
            RoomCommand::DealingAnimationDone => self.on_dealing_animation_done(),
            RoomCommand::AutoAdvanceFired => self.on_auto_advance_fired(),
            RoomCommand::NoBetsRestartFired => {
                self.state.enter_betting(self.now());
                self.on_entered_betting();
            }
        }
    }

    fn finish_reply<T>(
        &mut self,
        seat_id: &str,
        reply: Reply<T>,
        result: Result<T, RoomError>,
        on_ok: impl FnOnce(&mut Self),
    ) where
        T: Clone,
    {
        match &result {
            Ok(_) => {
                self.emit_snapshot();
                on_ok(self);
            }
            Err(e) => self.unicast(seat_id, RoomEvent::RoomError(e.into())),
        }
        let _ = reply.send(result);
    }

    fn after_action(&mut self) {
        if self.state.phase == crate::room::state::Phase::DealerTurn {
            self.run_dealer_turn_and_result();
        }
    }

    fn maybe_end_betting_early(&mut self) {
        if self.state.phase == crate::room::state::Phase::Betting && self.state.all_seats_have_bet() {
            self.end_betting(BettingEndReason::AllReady);
        }
    }

    fn on_entered_betting(&mut self) {
        if let Some(h) = self.deadline_timer.take() {
            h.abort();
        }
        let deadline = self.state.betting_deadline_ms.unwrap_or(self.now() + BETTING_DURATION_MS);
        self.emit(RoomEvent::BettingPhaseStarted(BettingPhaseStarted {
            round_id: self.state.round_id,
            min_bet: self.state.min_bet(),
            max_bet: self.state.max_bet(),
            betting_deadline_ms: deadline,
        }));
        self.emit_snapshot();
        self.start_betting_ticker();
    }

    fn start_betting_ticker(&mut self) {
        if let Some(h) = self.betting_ticker.take() {
            h.abort();
        }
        let tx = self.cmd_tx.clone();
        self.betting_ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                if tx.send(RoomCommand::BettingTick).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_betting_ticker(&mut self) {
        if let Some(h) = self.betting_ticker.take() {
            h.abort();
        }
    }

    fn on_betting_tick(&mut self) {
        if self.state.phase != crate::room::state::Phase::Betting {
            self.stop_betting_ticker();
            return;
        }
        match self.state.tick_betting(self.now()) {
            BettingTickOutcome::StillWaiting {
                remaining_seconds,
                urgency,
                players_ready,
                total_players,
            } => {
                self.emit(RoomEvent::BettingTick(BettingTick {
                    remaining_seconds,
                    urgency,
                    players_ready,
                    total_players,
                }));
            }
            BettingTickOutcome::End(reason) => self.end_betting(reason),
        }
    }

    fn end_betting(&mut self, reason: BettingEndReason) {
        self.stop_betting_ticker();
        self.emit(RoomEvent::BettingPhaseEnded(BettingPhaseEnded { reason }));
        match self.state.end_betting_phase() {
            BettingExitOutcome::NoBetsPlaced => {
                self.emit(RoomEvent::NoBetsPlaced);
                self.schedule_no_bets_restart();
            }
            BettingExitOutcome::Dealing => {
                self.emit_snapshot();
                let mut rng = rand::thread_rng();
                match self.state.deal(&mut rng) {
                    Ok(()) => {
                        self.emit_snapshot();
                        self.schedule_dealing_animation();
                    }
                    Err(e) => self.handle_deck_exhausted(e),
                }
            }
        }
    }

    fn schedule_no_bets_restart(&mut self) {
        if let Some(h) = self.deadline_timer.take() {
            h.abort();
        }
        let tx = self.cmd_tx.clone();
        self.deadline_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(NO_BETS_RESTART_DELAY_MS)).await;
            let _ = tx.send(RoomCommand::NoBetsRestartFired);
        }));
    }

    fn schedule_dealing_animation(&mut self) {
        if let Some(h) = self.deadline_timer.take() {
            h.abort();
        }
        let tx = self.cmd_tx.clone();
        self.deadline_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(DEALING_ANIMATION_DELAY_MS)).await;
            let _ = tx.send(RoomCommand::DealingAnimationDone);
        }));
    }

    fn on_dealing_animation_done(&mut self) {
        match self.state.finish_dealing() {
            PostDealOutcome::Playing => self.emit_snapshot(),
            PostDealOutcome::SkipToDealerTurn => {
                self.emit_snapshot();
                self.run_dealer_turn_and_result();
            }
        }
    }

    fn run_dealer_turn_and_result(&mut self) {
        match self.state.run_dealer_turn() {
            Ok(_records) => {
                self.emit_snapshot();
                self.state.schedule_auto_advance(self.now());
                self.emit(RoomEvent::AutoAdvanceScheduled(AutoAdvanceScheduled {
                    delay_ms: AUTO_ADVANCE_DELAY_MS,
                }));
                self.schedule_auto_advance_timer();
            }
            Err(e) => self.handle_deck_exhausted(e),
        }
    }

    fn schedule_auto_advance_timer(&mut self) {
        if let Some(h) = self.deadline_timer.take() {
            h.abort();
        }
        let tx = self.cmd_tx.clone();
        self.deadline_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(AUTO_ADVANCE_DELAY_MS)).await;
            let _ = tx.send(RoomCommand::AutoAdvanceFired);
        }));
    }

    fn on_auto_advance_fired(&mut self) {
        self.state.enter_betting(self.now());
        self.on_entered_betting();
    }

    /// A `DeckExhausted` mid-round cannot be salvaged: refund every
    /// escrowed bet and fall back to `lobby`.
    fn handle_deck_exhausted(&mut self, err: RoomError) {
        tracing::error!(room = %self.state.code, "deck exhausted mid-round: {err}");
        let round_id = self.state.round_id;
        let seat_ids: Vec<String> = self.state.seats.iter().map(|s| s.id.clone()).collect();
        for seat_id in seat_ids {
            let _ = self.state.ledger.clear_bet(&seat_id, round_id);
        }
        self.state.phase = crate::room::state::Phase::Lobby;
        self.stop_betting_ticker();
        if let Some(h) = self.deadline_timer.take() {
            h.abort();
        }
        self.emit(RoomEvent::RoomError((&err).into()));
        self.emit_snapshot();
    }
}
