//! The room state machine (component C4): phases, turn advancement, dealer
//! auto-play, and the pure logic behind every timed transition.
//!
//! Deliberately synchronous and free of I/O so it can be driven directly
//! from tests, the same way the deck and hand evaluator are pure.
//! `room::actor` is the async shell that owns the clock, the mpsc queue,
//! and the broadcast channel around one `RoomState`.

use std::collections::HashSet;

use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::card::{evaluate, Card, Deck, HandValue};
use crate::error::RoomError;
use crate::ledger::{Ledger, TransactionType, INITIAL_BALANCE, MIN_BET};
use crate::protocol::{
    BettingEndReason, DealerView, RoomSnapshot, SeatView,
};
use crate::settlement::{self, settle_seat, Outcome};

pub const BETTING_DURATION_MS: u64 = 15_000;
pub const AUTO_ADVANCE_DELAY_MS: u64 = 12_500;
pub const NO_BETS_RESTART_DELAY_MS: u64 = 3_000;
pub const DEALING_ANIMATION_DELAY_MS: u64 = 2_000;
pub const ROOM_CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_LEN: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Lobby,
    Betting,
    Dealing,
    Playing,
    DealerTurn,
    Result,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    High,
    Critical,
}

#[derive(Clone, Debug)]
pub struct Seat {
    pub id: String,
    pub display_name: String,
    pub hand: Vec<Card>,
    pub total: u8,
    pub natural: bool,
    pub bust: bool,
    pub standing: bool,
    pub outcome: Outcome,
}

impl Seat {
    fn new(id: String, display_name: String, mid_round: bool) -> Self {
        Seat {
            id,
            display_name,
            hand: Vec::new(),
            total: 0,
            natural: false,
            bust: false,
            standing: mid_round,
            outcome: Outcome::Standing,
        }
    }

    fn reset_for_round(&mut self) {
        self.hand.clear();
        self.total = 0;
        self.natural = false;
        self.bust = false;
        self.standing = false;
        self.outcome = Outcome::Standing;
    }

    fn reevaluate(&mut self) {
        let v: HandValue = evaluate(&self.hand);
        self.total = v.total;
        self.natural = v.is_natural;
        self.bust = v.is_bust;
    }
}

#[derive(Clone, Debug, Default)]
pub struct Dealer {
    pub hand: Vec<Card>,
    pub hole_card: Option<Card>,
    pub total: u8,
    pub is_bust: bool,
    pub is_natural: bool,
}

impl Dealer {
    fn reset(&mut self) {
        self.hand.clear();
        self.hole_card = None;
        self.total = 0;
        self.is_bust = false;
        self.is_natural = false;
    }

    fn reevaluate_visible(&mut self) {
        let v = evaluate(&self.hand);
        self.total = v.total;
        self.is_bust = v.is_bust;
        self.is_natural = v.is_natural;
    }
}

/// What happened when a betting-phase tick or deadline fired.
pub enum BettingTickOutcome {
    StillWaiting {
        remaining_seconds: u64,
        urgency: Urgency,
        players_ready: usize,
        total_players: usize,
    },
    End(BettingEndReason),
}

/// What happened after the betting phase's auto-bet-and-exit step ran.
pub enum BettingExitOutcome {
    /// No seat ended up with a bet; the room will restart betting after a
    /// short delay.
    NoBetsPlaced,
    /// At least one seat has a bet; the room moved to `dealing`.
    Dealing,
}

/// What happened after dealing finished its animation delay.
pub enum PostDealOutcome {
    /// At least one seat still needs to act; `turn_index` is set.
    Playing,
    /// No seat needs to act (all natural/bust/non-participating); the
    /// dealer plays immediately.
    SkipToDealerTurn,
}

pub struct SeatSettlementRecord {
    pub seat_id: String,
    pub outcome: Outcome,
    pub payout: u64,
    pub balance_after: u64,
}

pub struct RoomState {
    pub code: String,
    pub creator_id: String,
    pub seats: Vec<Seat>,
    pub ready_members: HashSet<String>,
    pub phase: Phase,
    pub round_id: Uuid,
    pub turn_index: Option<usize>,
    pub deck: Deck,
    pub dealer: Dealer,
    pub betting_deadline_ms: Option<u64>,
    pub auto_advance_deadline_ms: Option<u64>,
    pub ledger: Ledger,
    sync_id: u64,
}

impl RoomState {
    pub fn new(code: impl Into<String>, creator_id: impl Into<String>) -> Self {
        let code = code.into();
        RoomState {
            ledger: Ledger::new(code.clone()),
            code,
            creator_id: creator_id.into(),
            seats: Vec::new(),
            ready_members: HashSet::new(),
            phase: Phase::Lobby,
            round_id: Uuid::new_v4(),
            turn_index: None,
            deck: Deck::default(),
            dealer: Dealer::default(),
            betting_deadline_ms: None,
            auto_advance_deadline_ms: None,
            sync_id: 0,
        }
    }

    /// Create a room and seat its founding member in one step, returning
    /// the new seat id so the caller can record it as `creator_id`.
    pub fn new_with_creator(code: impl Into<String>, display_name: impl Into<String>) -> (Self, String) {
        let mut room = RoomState::new(code, "");
        let creator = room.join(display_name);
        room.creator_id = creator.clone();
        (room, creator)
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn min_bet(&self) -> u64 {
        MIN_BET
    }

    pub fn max_bet(&self) -> u64 {
        self.seats
            .iter()
            .filter_map(|s| self.ledger.balance(&s.id).ok())
            .max()
            .unwrap_or(MIN_BET)
    }

    pub fn total_pot(&self) -> u64 {
        self.seats
            .iter()
            .map(|s| self.ledger.snapshot(&s.id).map(|a| a.current_bet).unwrap_or(0))
            .sum()
    }

    fn seat_index(&self, seat_id: &str) -> Result<usize, RoomError> {
        self.seats
            .iter()
            .position(|s| s.id == seat_id)
            .ok_or_else(|| RoomError::player_not_found(seat_id))
    }

    // ---- Membership (§4.4.6) -------------------------------------------

    pub fn join(&mut self, display_name: impl Into<String>) -> String {
        let seat_id = Uuid::new_v4().to_string();
        let mid_round = self.phase != Phase::Lobby;
        self.seats
            .push(Seat::new(seat_id.clone(), display_name.into(), mid_round));
        self.ledger.init(&seat_id, self.round_id, INITIAL_BALANCE);
        seat_id
    }

    /// Remove a seat. If it held the active turn, advance as if it had
    /// stood. Caller is responsible for tearing the room down (and
    /// cancelling timers) once `is_empty()` becomes true.
    pub fn leave(&mut self, seat_id: &str) -> Result<(), RoomError> {
        let idx = self.seat_index(seat_id)?;
        let was_active_turn = self.turn_index == Some(idx);
        self.seats.remove(idx);
        self.ready_members.remove(seat_id);
        self.ledger.remove(seat_id);

        // Indices after `idx` shifted down by one; turn_index must follow.
        if let Some(turn) = self.turn_index {
            if turn > idx {
                self.turn_index = Some(turn - 1);
            } else if was_active_turn {
                self.turn_index = Some(idx);
                self.advance_turn_from(idx);
            }
        }
        if self.phase == Phase::Betting && self.creator_id == seat_id {
            // Creator leaving does not reassign creatorship in this core;
            // only join-order creators exist, out of scope beyond §4.4.6.
        }
        Ok(())
    }

    pub fn ready(&mut self, seat_id: &str) -> Result<bool, RoomError> {
        self.seat_index(seat_id)?;
        self.ready_members.insert(seat_id.to_string());
        if self.phase != Phase::Betting {
            return Ok(false);
        }
        let all_ready = self.seats.iter().all(|s| self.ready_members.contains(&s.id));
        let all_bet = self.all_seats_have_bet();
        Ok(all_ready && all_bet)
    }

    pub fn all_seats_have_bet(&self) -> bool {
        !self.seats.is_empty()
            && self
                .seats
                .iter()
                .all(|s| self.ledger.snapshot(&s.id).map(|a| a.has_placed_bet).unwrap_or(false))
    }

    // ---- Betting phase (§4.4.1) -----------------------------------------

    /// Only the creator may start (`Lobby -> Betting`) or restart
    /// (`Result -> Betting`).
    pub fn start_round(&mut self, by: &str, now_ms: u64) -> Result<(), RoomError> {
        if by != self.creator_id {
            return Err(RoomError::not_authorized("start the round"));
        }
        if self.phase != Phase::Lobby {
            return Err(RoomError::wrong_phase("lobby", self.phase_name()));
        }
        self.enter_betting(now_ms);
        Ok(())
    }

    pub fn restart_round(&mut self, by: &str, now_ms: u64) -> Result<(), RoomError> {
        if by != self.creator_id {
            return Err(RoomError::not_authorized("restart the round"));
        }
        if self.phase != Phase::Result {
            return Err(RoomError::wrong_phase("result", self.phase_name()));
        }
        self.auto_advance_deadline_ms = None;
        self.enter_betting(now_ms);
        Ok(())
    }

    pub fn enter_betting(&mut self, now_ms: u64) {
        for seat in &mut self.seats {
            seat.reset_for_round();
            let _ = self.ledger.clear_bet(&seat.id, self.round_id);
        }
        self.round_id = Uuid::new_v4();
        self.ready_members.clear();
        self.dealer.reset();
        self.turn_index = None;
        self.phase = Phase::Betting;
        self.betting_deadline_ms = Some(now_ms + BETTING_DURATION_MS);
        self.auto_advance_deadline_ms = None;
    }

    pub fn place_bet(&mut self, seat_id: &str, amount: i64) -> Result<(), RoomError> {
        if self.phase != Phase::Betting {
            return Err(RoomError::wrong_phase("betting", self.phase_name()));
        }
        self.seat_index(seat_id)?;
        if amount <= 0 {
            return Err(RoomError::invalid_bet_amount("bet amount must be positive"));
        }
        self.ledger.revise_bet(seat_id, self.round_id, amount as u64)
    }

    pub fn clear_bet(&mut self, seat_id: &str) -> Result<(), RoomError> {
        if self.phase != Phase::Betting {
            return Err(RoomError::wrong_phase("betting", self.phase_name()));
        }
        self.seat_index(seat_id)?;
        self.ledger.clear_bet(seat_id, self.round_id)
    }

    /// Called once a second while in `betting`. Returns `End` once either
    /// every seat has bet or the deadline has passed.
    pub fn tick_betting(&self, now_ms: u64) -> BettingTickOutcome {
        if self.all_seats_have_bet() {
            return BettingTickOutcome::End(BettingEndReason::AllReady);
        }
        let deadline = self.betting_deadline_ms.unwrap_or(now_ms);
        if now_ms >= deadline {
            return BettingTickOutcome::End(BettingEndReason::Timeout);
        }
        let remaining_ms = deadline.saturating_sub(now_ms);
        let remaining_seconds = remaining_ms.div_ceil(1000);
        let urgency = if remaining_seconds <= 5 {
            Urgency::Critical
        } else if remaining_seconds <= 10 {
            Urgency::High
        } else {
            Urgency::Normal
        };
        let players_ready = self
            .seats
            .iter()
            .filter(|s| self.ledger.snapshot(&s.id).map(|a| a.has_placed_bet).unwrap_or(false))
            .count();
        BettingTickOutcome::StillWaiting {
            remaining_seconds,
            urgency,
            players_ready,
            total_players: self.seats.len(),
        }
    }

    /// Auto-bet the minimum for anyone who hasn't placed a bet and can
    /// afford it, then decide whether to proceed to dealing or restart.
    pub fn end_betting_phase(&mut self) -> BettingExitOutcome {
        self.betting_deadline_ms = None;
        let seat_ids: Vec<String> = self.seats.iter().map(|s| s.id.clone()).collect();
        for seat_id in seat_ids {
            let already_bet = self
                .ledger
                .snapshot(&seat_id)
                .map(|a| a.has_placed_bet)
                .unwrap_or(false);
            if already_bet {
                continue;
            }
            let balance = self.ledger.balance(&seat_id).unwrap_or(0);
            if balance >= MIN_BET {
                let _ = self.ledger.revise_bet(&seat_id, self.round_id, MIN_BET);
            }
        }

        if self.total_pot() == 0 {
            BettingExitOutcome::NoBetsPlaced
        } else {
            self.phase = Phase::Dealing;
            BettingExitOutcome::Dealing
        }
    }

    // ---- Dealing (§4.4.2) -------------------------------------------------

    fn participating_indices(&self) -> Vec<usize> {
        (0..self.seats.len())
            .filter(|&i| {
                self.ledger
                    .snapshot(&self.seats[i].id)
                    .map(|a| a.current_bet > 0)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Deal the "authentic" order: one card to each participating seat, one
    /// to the dealer, a second card to each seat, then the dealer's hole
    /// card. Marks non-participating seats as standing (I7) and naturals.
    pub fn deal(&mut self, rng: &mut impl Rng) -> Result<(), RoomError> {
        self.deck = Deck::new_shuffled(rng);
        let participating = self.participating_indices();

        for i in 0..self.seats.len() {
            if !participating.contains(&i) {
                self.seats[i].standing = true;
            }
        }

        for &i in &participating {
            let card = self.deck.draw()?;
            self.seats[i].hand.push(card);
        }
        let dealer_up = self.deck.draw()?;
        self.dealer.hand.push(dealer_up);
        for &i in &participating {
            let card = self.deck.draw()?;
            self.seats[i].hand.push(card);
        }
        let hole = self.deck.draw()?;
        self.dealer.hole_card = Some(hole);

        for &i in &participating {
            self.seats[i].reevaluate();
            if self.seats[i].natural {
                self.seats[i].outcome = Outcome::Natural;
                self.seats[i].standing = true;
            }
        }
        self.dealer.reevaluate_visible();
        Ok(())
    }

    /// Called after the dealing-animation delay. Picks the first seat that
    /// still needs to act, or signals that the dealer should play directly.
    pub fn finish_dealing(&mut self) -> PostDealOutcome {
        self.phase = Phase::Playing;
        match self.first_actionable_seat(0) {
            Some(idx) => {
                self.turn_index = Some(idx);
                PostDealOutcome::Playing
            }
            None => {
                self.turn_index = None;
                self.phase = Phase::DealerTurn;
                PostDealOutcome::SkipToDealerTurn
            }
        }
    }

    fn is_actionable(&self, idx: usize) -> bool {
        let seat = &self.seats[idx];
        if seat.standing {
            return false;
        }
        self.ledger
            .snapshot(&seat.id)
            .map(|a| a.current_bet > 0)
            .unwrap_or(false)
    }

    fn first_actionable_seat(&self, from: usize) -> Option<usize> {
        (from..self.seats.len()).find(|&i| self.is_actionable(i))
    }

    // ---- Playing (§4.4.3) -------------------------------------------------

    pub fn hit(&mut self, seat_id: &str, rng: &mut impl Rng) -> Result<(), RoomError> {
        let idx = self.active_seat_index(seat_id)?;
        let card = self.deck.draw()?;
        self.seats[idx].hand.push(card);
        self.seats[idx].reevaluate();
        if self.seats[idx].bust {
            self.seats[idx].standing = true;
            self.seats[idx].outcome = Outcome::Bust;
        }
        let _ = rng; // reserved for symmetry with `deal`'s signature
        self.advance_turn_from(idx);
        Ok(())
    }

    pub fn stand(&mut self, seat_id: &str) -> Result<(), RoomError> {
        let idx = self.active_seat_index(seat_id)?;
        self.seats[idx].standing = true;
        self.advance_turn_from(idx);
        Ok(())
    }

    fn active_seat_index(&self, seat_id: &str) -> Result<usize, RoomError> {
        if self.phase != Phase::Playing {
            return Err(RoomError::wrong_phase("playing", self.phase_name()));
        }
        let idx = self.seat_index(seat_id)?;
        if self.turn_index != Some(idx) {
            return Err(RoomError::not_your_turn());
        }
        Ok(idx)
    }

    /// Advance from `idx` to the next actionable seat (circularly). If none
    /// remain, transition to `dealerTurn`.
    fn advance_turn_from(&mut self, idx: usize) {
        if self.seats.is_empty() {
            self.turn_index = None;
            if self.phase == Phase::Playing {
                self.phase = Phase::DealerTurn;
            }
            return;
        }
        let n = self.seats.len();
        for step in 1..=n {
            let candidate = (idx + step) % n;
            if self.is_actionable(candidate) {
                self.turn_index = Some(candidate);
                return;
            }
        }
        self.turn_index = None;
        if self.phase == Phase::Playing {
            self.phase = Phase::DealerTurn;
        }
    }

    // ---- Dealer turn & settlement (§4.4.4, §4.3) --------------------------

    /// Reveal the hole card, draw while `< 17` (stands on any total >= 17,
    /// soft or hard), then settle every participating seat.
    pub fn run_dealer_turn(&mut self) -> Result<Vec<SeatSettlementRecord>, RoomError> {
        if let Some(hole) = self.dealer.hole_card.take() {
            self.dealer.hand.push(hole);
        }
        self.dealer.reevaluate_visible();

        while self.dealer.total < 17 {
            let card = self.deck.draw()?;
            self.dealer.hand.push(card);
            self.dealer.reevaluate_visible();
        }

        let dealer_value = HandValue {
            total: self.dealer.total,
            is_natural: self.dealer.is_natural,
            is_bust: self.dealer.is_bust,
        };

        let mut records = Vec::new();
        for seat in &mut self.seats {
            let bet = self.ledger.snapshot(&seat.id).map(|a| a.current_bet).unwrap_or(0);
            if bet == 0 {
                continue;
            }
            let seat_value = HandValue {
                total: seat.total,
                is_natural: seat.natural,
                is_bust: seat.bust,
            };
            let result = settle_seat(seat_value, dealer_value, bet);
            seat.outcome = result.outcome;

            self.ledger.settle_payout(&seat.id, self.round_id, result.payout)?;
            let stats = self.ledger.stats_mut(&seat.id)?;
            settlement::apply_stats(stats, result.outcome, seat.natural, bet, result.payout);

            records.push(SeatSettlementRecord {
                seat_id: seat.id.clone(),
                outcome: result.outcome,
                payout: result.payout,
                balance_after: self.ledger.balance(&seat.id)?,
            });
        }

        self.phase = Phase::Result;
        Ok(records)
    }

    pub fn schedule_auto_advance(&mut self, now_ms: u64) {
        self.auto_advance_deadline_ms = Some(now_ms + AUTO_ADVANCE_DELAY_MS);
    }

    // ---- Views -------------------------------------------------------------

    fn phase_name(&self) -> &'static str {
        match self.phase {
            Phase::Lobby => "lobby",
            Phase::Betting => "betting",
            Phase::Dealing => "dealing",
            Phase::Playing => "playing",
            Phase::DealerTurn => "dealerTurn",
            Phase::Result => "result",
        }
    }

    fn seat_view(&self, seat: &Seat) -> SeatView {
        let snap = self.ledger.snapshot(&seat.id).unwrap_or(crate::ledger::AccountSnapshot {
            balance: 0,
            current_bet: 0,
            has_placed_bet: false,
        });
        let stats = self.ledger.stats(&seat.id).ok().cloned().unwrap_or_default();
        SeatView {
            id: seat.id.clone(),
            position: self.seats.iter().position(|s| s.id == seat.id).unwrap_or(0) as u32,
            display_name: seat.display_name.clone(),
            hand: seat.hand.clone(),
            total: seat.total,
            natural: seat.natural,
            bust: seat.bust,
            standing: seat.standing,
            outcome: seat.outcome,
            balance: snap.balance,
            current_bet: snap.current_bet,
            has_placed_bet: snap.has_placed_bet,
            stats,
        }
    }

    fn dealer_view(&self) -> DealerView {
        let hide_hole = matches!(self.phase, Phase::Dealing | Phase::Playing);
        let hand = self.dealer.hand.clone();
        let v = evaluate(&hand);
        DealerView {
            hand,
            total: v.total,
            bust: v.is_bust,
            natural: v.is_natural,
            hole_card_hidden: hide_hole && self.dealer.hole_card.is_some(),
        }
    }

    /// Build the canonical broadcast snapshot (§4.5). Always safe to call;
    /// never includes the hole card before the dealer's turn.
    pub fn snapshot(&mut self, now_ms: u64) -> RoomSnapshot {
        self.sync_id += 1;
        RoomSnapshot {
            room_code: self.code.clone(),
            round_id: self.round_id,
            phase: self.phase,
            turn_index: self.turn_index,
            betting_deadline_ms: self.betting_deadline_ms,
            min_bet: self.min_bet(),
            max_bet: self.max_bet(),
            total_pot: self.total_pot(),
            seats: self.seats.iter().map(|s| self.seat_view(s)).collect(),
            dealer: self.dealer_view(),
            server_timestamp_ms: now_ms,
            sync_id: self.sync_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Rank, Suit};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn seeded(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn new_room() -> (RoomState, String) {
        let mut room = RoomState::new("ABCD", "");
        let creator = room.join("creator");
        room.creator_id = creator.clone();
        (room, creator)
    }

    #[test]
    fn join_initializes_balance_to_two_thousand() {
        let (room, creator) = new_room();
        assert_eq!(room.ledger.balance(&creator).unwrap(), INITIAL_BALANCE);
    }

    #[test]
    fn only_creator_may_start() {
        let (mut room, _creator) = new_room();
        let bob = room.join("bob");
        let err = room.start_round(&bob, 0).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotAuthorized);
    }

    #[test]
    fn starting_round_enters_betting_with_deadline() {
        let (mut room, creator) = new_room();
        room.start_round(&creator, 1_000).unwrap();
        assert_eq!(room.phase, Phase::Betting);
        assert_eq!(room.betting_deadline_ms, Some(1_000 + BETTING_DURATION_MS));
    }

    #[test]
    fn seats_joining_mid_round_start_standing_with_no_bet() {
        let (mut room, creator) = new_room();
        room.start_round(&creator, 0).unwrap();
        let late = room.join("late");
        let seat = room.seats.iter().find(|s| s.id == late).unwrap();
        assert!(seat.standing);
        assert_eq!(room.ledger.snapshot(&late).unwrap().current_bet, 0);
    }

    #[test]
    fn betting_timeout_with_partial_participation_auto_bets_minimum() {
        let mut room = RoomState::new("ABCD", "");
        let p = room.join("p");
        let q = room.join("q");
        let r = room.join("r");
        room.creator_id = p.clone();
        room.start_round(&p, 0).unwrap();

        room.place_bet(&p, 300).unwrap();
        room.place_bet(&q, 50).unwrap();
        room.clear_bet(&q).unwrap();

        match room.tick_betting(BETTING_DURATION_MS) {
            BettingTickOutcome::End(BettingEndReason::Timeout) => {}
            _ => panic!("expected timeout"),
        }
        match room.end_betting_phase() {
            BettingExitOutcome::Dealing => {}
            _ => panic!("expected dealing"),
        }
        assert_eq!(room.total_pot(), 300 + 25 + 25);
        assert_eq!(room.phase, Phase::Dealing);
        let _ = r;
    }

    #[test]
    fn no_bets_placed_when_nobody_can_afford_the_minimum() {
        let mut room = RoomState::new("ABCD", "");
        let only = room.join("only");
        room.creator_id = only.clone();
        // Drain the seat's balance below MIN_BET.
        room.ledger.debit(&only, room.round_id, INITIAL_BALANCE - 10).unwrap();
        room.start_round(&only, 0).unwrap();

        match room.end_betting_phase() {
            BettingExitOutcome::NoBetsPlaced => {}
            _ => panic!("expected no bets placed"),
        }
        assert_eq!(room.total_pot(), 0);
    }

    #[test]
    fn all_ready_ends_betting_early() {
        let mut room = RoomState::new("ABCD", "");
        let a = room.join("a");
        let b = room.join("b");
        room.creator_id = a.clone();
        room.start_round(&a, 0).unwrap();
        room.place_bet(&a, 100).unwrap();
        room.place_bet(&b, 100).unwrap();

        match room.tick_betting(500) {
            BettingTickOutcome::End(BettingEndReason::AllReady) => {}
            _ => panic!("expected all ready"),
        }
    }

    #[test]
    fn non_participating_seat_is_dealt_no_cards_and_marked_standing() {
        let mut room = RoomState::new("ABCD", "");
        let a = room.join("a");
        let b = room.join("b");
        room.creator_id = a.clone();
        room.start_round(&a, 0).unwrap();
        room.place_bet(&a, 100).unwrap();
        // `b` never bets and can't afford the auto-bet.
        room.ledger.debit(&b, room.round_id, INITIAL_BALANCE - 10).unwrap();
        room.end_betting_phase();

        let mut rng = seeded(1);
        room.deal(&mut rng).unwrap();

        let seat_b = room.seats.iter().find(|s| s.id == b).unwrap();
        assert!(seat_b.hand.is_empty());
        assert!(seat_b.standing);
    }

    #[test]
    fn dealing_order_gives_each_seat_two_cards_and_dealer_one_plus_hole() {
        let mut room = RoomState::new("ABCD", "");
        let a = room.join("a");
        let b = room.join("b");
        room.creator_id = a.clone();
        room.start_round(&a, 0).unwrap();
        room.place_bet(&a, 100).unwrap();
        room.place_bet(&b, 100).unwrap();
        room.end_betting_phase();

        let mut rng = seeded(2);
        room.deal(&mut rng).unwrap();

        for seat in &room.seats {
            assert_eq!(seat.hand.len(), 2);
        }
        assert_eq!(room.dealer.hand.len(), 1);
        assert!(room.dealer.hole_card.is_some());
    }

    #[test]
    fn hole_card_never_appears_in_dealer_view_before_dealer_turn() {
        let mut room = RoomState::new("ABCD", "");
        let a = room.join("a");
        room.creator_id = a.clone();
        room.start_round(&a, 0).unwrap();
        room.place_bet(&a, 100).unwrap();
        room.end_betting_phase();
        let mut rng = seeded(3);
        room.deal(&mut rng).unwrap();
        room.finish_dealing();

        let view = room.dealer_view();
        assert_eq!(view.hand.len(), 1);
        assert!(view.hole_card_hidden);
    }

    #[test]
    fn playing_turn_advances_circularly_and_skips_standing_seats() {
        let mut room = RoomState::new("ABCD", "");
        let a = room.join("a");
        let b = room.join("b");
        let c = room.join("c");
        room.creator_id = a.clone();
        room.start_round(&a, 0).unwrap();
        room.place_bet(&a, 100).unwrap();
        room.place_bet(&b, 100).unwrap();
        room.place_bet(&c, 100).unwrap();
        room.end_betting_phase();
        let mut rng = seeded(4);
        room.deal(&mut rng).unwrap();
        if let PostDealOutcome::Playing = room.finish_dealing() {
            // fine, continue
        }

        // Force seat b to have already stood (simulating a natural) so the
        // turn must skip it.
        let b_idx = room.seats.iter().position(|s| s.id == b).unwrap();
        room.seats[b_idx].standing = true;

        let first = room.turn_index;
        assert!(first.is_some());
        let first_id = room.seats[first.unwrap()].id.clone();
        room.stand(&first_id).unwrap();

        // turn must have skipped b if b comes right after first in order
        if let Some(idx) = room.turn_index {
            assert_ne!(room.seats[idx].id, b);
        }
        let _ = c;
    }

    #[test]
    fn not_your_turn_is_rejected() {
        let mut room = RoomState::new("ABCD", "");
        let a = room.join("a");
        let b = room.join("b");
        room.creator_id = a.clone();
        room.start_round(&a, 0).unwrap();
        room.place_bet(&a, 100).unwrap();
        room.place_bet(&b, 100).unwrap();
        room.end_betting_phase();
        let mut rng = seeded(5);
        room.deal(&mut rng).unwrap();
        room.finish_dealing();

        let not_current = if room.turn_index == Some(0) { b } else { a };
        let err = room.stand(&not_current).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotYourTurn);
    }

    #[test]
    fn dealer_stands_on_soft_seventeen() {
        let mut room = RoomState::new("ABCD", "");
        let a = room.join("a");
        room.creator_id = a.clone();
        room.start_round(&a, 0).unwrap();
        room.place_bet(&a, 100).unwrap();
        room.end_betting_phase();

        // Hand-build a deck so the dealer draws to a soft 17 (A + 6).
        room.deck = Deck::default();
        room.dealer.hand.clear();
        room.dealer.hole_card = Some(Card { suit: Suit::Clubs, rank: Rank::Six });
        room.dealer.hand.push(Card { suit: Suit::Hearts, rank: Rank::Ace });
        let a_idx = room.seats.iter().position(|s| s.id == a).unwrap();
        room.seats[a_idx].hand = vec![
            Card { suit: Suit::Spades, rank: Rank::Ten },
            Card { suit: Suit::Diamonds, rank: Rank::Eight },
        ];
        room.seats[a_idx].reevaluate();
        room.phase = Phase::DealerTurn;

        let records = room.run_dealer_turn().unwrap();
        assert_eq!(room.dealer.total, 17);
        assert_eq!(room.dealer.hand.len(), 2);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, Outcome::Winner);
    }

    #[test]
    fn round_id_is_stable_across_a_round_and_changes_on_restart() {
        let mut room = RoomState::new("ABCD", "");
        let a = room.join("a");
        room.creator_id = a.clone();
        room.start_round(&a, 0).unwrap();
        let round_during_betting = room.round_id;
        room.place_bet(&a, 100).unwrap();
        assert_eq!(room.round_id, round_during_betting);
        room.end_betting_phase();
        assert_eq!(room.round_id, round_during_betting);

        room.phase = Phase::Result;
        room.restart_round(&a, 0).unwrap();
        assert_ne!(room.round_id, round_during_betting);
    }

    #[test]
    fn leaving_the_active_seat_advances_turn_as_if_stood() {
        let mut room = RoomState::new("ABCD", "");
        let a = room.join("a");
        let b = room.join("b");
        room.creator_id = a.clone();
        room.start_round(&a, 0).unwrap();
        room.place_bet(&a, 100).unwrap();
        room.place_bet(&b, 100).unwrap();
        room.end_betting_phase();
        let mut rng = seeded(6);
        room.deal(&mut rng).unwrap();
        room.finish_dealing();

        let active_id = room.seats[room.turn_index.unwrap()].id.clone();
        room.leave(&active_id).unwrap();
        // Either the other seat now has the turn, or play moved to dealerTurn.
        assert!(room.turn_index.is_none() || room.seats[room.turn_index.unwrap()].id != active_id);
    }

    #[test]
    fn room_destroyed_when_last_member_leaves() {
        let (mut room, creator) = new_room();
        room.leave(&creator).unwrap();
        assert!(room.is_empty());
    }
}
