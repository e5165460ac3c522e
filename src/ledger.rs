//! Per-player balance and transaction log (component C2).
//!
//! Owns every mutation to `balance` and `currentBet`. Lives inside the
//! single-owner room actor (see `room::actor`), so no locking is needed
//! here: the actor's mpsc queue is what serializes concurrent requests
//! against the same player.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RoomError;

pub const INITIAL_BALANCE: u64 = 2000;
pub const MIN_BET: u64 = 25;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionType {
    Initial,
    Bet,
    Refund,
    Payout,
    Correction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceTransaction {
    pub id: Uuid,
    pub room_code: String,
    pub player_id: String,
    pub round_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: u64,
    pub balance_before: u64,
    pub balance_after: u64,
    pub timestamp_ms: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LifetimeStats {
    pub wins: u64,
    pub naturals: u64,
    /// `wins + naturals`, kept up to date by `settlement::apply_stats` so
    /// clients don't have to add the two themselves.
    pub victories: u64,
    pub losses: u64,
    pub pushes: u64,
    pub busts: u64,
    pub total_gains: u64,
    pub total_losses: u64,
}

/// One player's ledger account: balance, escrowed bet, and lifetime stats.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub balance: u64,
    pub current_bet: u64,
    pub has_placed_bet: bool,
    pub stats: LifetimeStats,
}

impl Account {
    fn new(balance: u64) -> Self {
        Account {
            balance,
            current_bet: 0,
            has_placed_bet: false,
            stats: LifetimeStats::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: u64,
    pub current_bet: u64,
    pub has_placed_bet: bool,
}

/// The ledger for one room: every seated player's account plus an
/// append-only audit log of transactions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Ledger {
    room_code: String,
    accounts: std::collections::HashMap<String, Account>,
    log: Vec<BalanceTransaction>,
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Ledger {
    pub fn new(room_code: impl Into<String>) -> Self {
        Ledger {
            room_code: room_code.into(),
            accounts: std::collections::HashMap::new(),
            log: Vec::new(),
        }
    }

    fn append(
        &mut self,
        player_id: &str,
        round_id: Uuid,
        kind: TransactionType,
        amount: u64,
        balance_before: u64,
        balance_after: u64,
    ) {
        let entry = BalanceTransaction {
            id: Uuid::new_v4(),
            room_code: self.room_code.clone(),
            player_id: player_id.to_string(),
            round_id,
            kind,
            amount,
            balance_before,
            balance_after,
            timestamp_ms: now_ms(),
        };
        tracing::debug!(
            player = player_id,
            ?kind,
            amount,
            balance_after,
            "ledger transaction"
        );
        self.log.push(entry);
    }

    /// Initialize (or reinitialize) a player's account.
    pub fn init(&mut self, player_id: &str, round_id: Uuid, amount: u64) {
        self.accounts
            .insert(player_id.to_string(), Account::new(amount));
        self.append(player_id, round_id, TransactionType::Initial, amount, 0, amount);
    }

    fn account(&self, player_id: &str) -> Result<&Account, RoomError> {
        self.accounts
            .get(player_id)
            .ok_or_else(|| RoomError::player_not_found(player_id))
    }

    fn account_mut(&mut self, player_id: &str) -> Result<&mut Account, RoomError> {
        self.accounts
            .get_mut(player_id)
            .ok_or_else(|| RoomError::player_not_found(player_id))
    }

    /// Debit `amount` from the player's balance, recorded with `kind`
    /// (the core only ever calls this with `TransactionType::Bet`).
    /// Fails with `InsufficientFunds` if `amount > balance`.
    pub fn debit(
        &mut self,
        player_id: &str,
        round_id: Uuid,
        amount: u64,
    ) -> Result<(), RoomError> {
        let account = self.account_mut(player_id)?;
        if amount > account.balance {
            return Err(RoomError::insufficient_funds());
        }
        let before = account.balance;
        account.balance -= amount;
        self.append(player_id, round_id, TransactionType::Bet, amount, before, before - amount);
        Ok(())
    }

    /// Credit `amount` to the player's balance. `amount == 0` is a valid
    /// no-op that still appends an entry.
    pub fn credit(
        &mut self,
        player_id: &str,
        round_id: Uuid,
        amount: u64,
        kind: TransactionType,
    ) -> Result<(), RoomError> {
        let account = self.account_mut(player_id)?;
        let before = account.balance;
        account.balance += amount;
        self.append(player_id, round_id, kind, amount, before, before + amount);
        Ok(())
    }

    /// Atomically revise the player's bet for the round: conceptually a
    /// refund of the old bet followed by a debit of the new one, performed
    /// as one unit so that a failing debit leaves the prior bet untouched.
    pub fn revise_bet(
        &mut self,
        player_id: &str,
        round_id: Uuid,
        new_bet: u64,
    ) -> Result<(), RoomError> {
        if new_bet == 0 {
            return Err(RoomError::invalid_bet_amount("bet amount must be positive"));
        }
        if new_bet < MIN_BET {
            return Err(RoomError::invalid_bet_amount(&format!(
                "bet must be at least {MIN_BET}"
            )));
        }

        let account = self.account(player_id)?;
        let affordable = account.balance + account.current_bet;
        if new_bet > affordable {
            return Err(RoomError::insufficient_funds());
        }

        let old_bet = account.current_bet;
        let balance_before_refund = account.balance;

        // Refund the old bet, then debit the new one. Since both legs were
        // already proven affordable against `balance + current_bet`, the
        // debit below cannot fail: refund can't be "rolled back" because it
        // never had a chance to leave the player worse off.
        let account = self.account_mut(player_id)?;
        account.balance = balance_before_refund + old_bet;
        account.current_bet = 0;
        if old_bet > 0 {
            self.append(
                player_id,
                round_id,
                TransactionType::Refund,
                old_bet,
                balance_before_refund,
                balance_before_refund + old_bet,
            );
        }

        self.debit(player_id, round_id, new_bet)?;

        let account = self.account_mut(player_id)?;
        account.current_bet = new_bet;
        account.has_placed_bet = true;
        Ok(())
    }

    /// Refund any active bet and clear the bet flags.
    pub fn clear_bet(&mut self, player_id: &str, round_id: Uuid) -> Result<(), RoomError> {
        let account = self.account(player_id)?;
        let bet = account.current_bet;
        if bet > 0 {
            self.credit(player_id, round_id, bet, TransactionType::Refund)?;
        }
        let account = self.account_mut(player_id)?;
        account.current_bet = 0;
        account.has_placed_bet = false;
        Ok(())
    }

    /// Pay out a round's winnings/refund and record the bet as spent.
    /// Called once per participating seat by the settlement engine; the
    /// bet itself was already debited during the betting phase.
    pub fn settle_payout(
        &mut self,
        player_id: &str,
        round_id: Uuid,
        payout: u64,
    ) -> Result<(), RoomError> {
        self.credit(player_id, round_id, payout, TransactionType::Payout)?;
        let account = self.account_mut(player_id)?;
        account.current_bet = 0;
        account.has_placed_bet = false;
        Ok(())
    }

    pub fn snapshot(&self, player_id: &str) -> Result<AccountSnapshot, RoomError> {
        let account = self.account(player_id)?;
        Ok(AccountSnapshot {
            balance: account.balance,
            current_bet: account.current_bet,
            has_placed_bet: account.has_placed_bet,
        })
    }

    pub fn balance(&self, player_id: &str) -> Result<u64, RoomError> {
        Ok(self.account(player_id)?.balance)
    }

    pub fn stats(&self, player_id: &str) -> Result<&LifetimeStats, RoomError> {
        Ok(&self.account(player_id)?.stats)
    }

    pub fn stats_mut(&mut self, player_id: &str) -> Result<&mut LifetimeStats, RoomError> {
        Ok(&mut self.account_mut(player_id)?.stats)
    }

    pub fn remove(&mut self, player_id: &str) {
        self.accounts.remove(player_id);
    }

    pub fn transactions(&self) -> &[BalanceTransaction] {
        &self.log
    }

    pub fn sum_of_transactions(&self, player_id: &str) -> i64 {
        self.log
            .iter()
            .filter(|t| t.player_id == player_id)
            .map(|t| match t.kind {
                TransactionType::Bet => -(t.amount as i64),
                _ => t.amount as i64,
            })
            .sum()
    }
}
