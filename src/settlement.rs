//! Per-seat outcome classification and payout (component C3).

use serde::{Deserialize, Serialize};

use crate::card::HandValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Playing,
    Standing,
    Bust,
    Natural,
    Winner,
    Loser,
    Push,
}

pub const PAYOUT_MULTIPLIER_WIN: u64 = 2;
pub const PAYOUT_MULTIPLIER_PUSH: u64 = 1;

/// Result of settling a single seat against the final dealer hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeatSettlement {
    pub outcome: Outcome,
    pub payout: u64,
}

/// Classify a seat's final outcome against the dealer's, then compute the
/// payout owed on its `bet` (already escrowed out of the balance during
/// betting). Checks run in order; the first match wins.
pub fn settle_seat(seat: HandValue, dealer: HandValue, bet: u64) -> SeatSettlement {
    let outcome = if seat.is_bust {
        Outcome::Bust
    } else if dealer.is_natural && !seat.is_natural {
        Outcome::Loser
    } else if seat.is_natural && !dealer.is_natural {
        Outcome::Winner
    } else if seat.is_natural && dealer.is_natural {
        Outcome::Push
    } else if dealer.is_bust {
        Outcome::Winner
    } else if seat.total > dealer.total {
        Outcome::Winner
    } else if seat.total < dealer.total {
        Outcome::Loser
    } else {
        Outcome::Push
    };

    let is_natural_win = outcome == Outcome::Winner && seat.is_natural;
    let payout = match outcome {
        Outcome::Winner if is_natural_win => (bet as f64 * 2.5).floor() as u64,
        Outcome::Winner => bet * PAYOUT_MULTIPLIER_WIN,
        Outcome::Push => bet * PAYOUT_MULTIPLIER_PUSH,
        Outcome::Loser | Outcome::Bust => 0,
        Outcome::Playing | Outcome::Standing | Outcome::Natural => {
            unreachable!("settle_seat never produces a pre-round outcome")
        }
    };

    SeatSettlement { outcome, payout }
}

/// Bump a seat's lifetime stats and money counters after settlement.
/// `seat_is_natural` distinguishes a natural win (`naturals += 1`) from a
/// regular win (`wins += 1`); the outcome tag alone can't tell them apart.
pub fn apply_stats(
    stats: &mut crate::ledger::LifetimeStats,
    outcome: Outcome,
    seat_is_natural: bool,
    bet: u64,
    payout: u64,
) {
    match outcome {
        Outcome::Winner if seat_is_natural => {
            stats.naturals += 1;
            stats.victories += 1;
        }
        Outcome::Winner => {
            stats.wins += 1;
            stats.victories += 1;
        }
        Outcome::Push => stats.pushes += 1,
        Outcome::Loser => stats.losses += 1,
        Outcome::Bust => {
            stats.busts += 1;
            stats.losses += 1;
        }
        Outcome::Playing | Outcome::Standing | Outcome::Natural => {}
    }

    if payout > bet {
        stats.total_gains += payout - bet;
    } else if payout < bet {
        stats.total_losses += bet - payout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LifetimeStats;

    fn hv(total: u8, is_natural: bool, is_bust: bool) -> HandValue {
        HandValue { total, is_natural, is_bust }
    }

    #[test]
    fn natural_beats_non_natural_dealer() {
        let s = settle_seat(hv(21, true, false), hv(17, false, false), 100);
        assert_eq!(s.outcome, Outcome::Winner);
        assert_eq!(s.payout, 250); // floor(100 * 2.5)
    }

    #[test]
    fn regular_win_pays_double() {
        let s = settle_seat(hv(19, false, false), hv(17, false, false), 100);
        assert_eq!(s.outcome, Outcome::Winner);
        assert_eq!(s.payout, 200);
    }

    #[test]
    fn bust_always_loses_regardless_of_dealer() {
        let s = settle_seat(hv(25, false, true), hv(0, false, false), 50);
        assert_eq!(s.outcome, Outcome::Bust);
        assert_eq!(s.payout, 0);
    }

    #[test]
    fn natural_vs_natural_is_a_push() {
        let s = settle_seat(hv(21, true, false), hv(21, true, false), 200);
        assert_eq!(s.outcome, Outcome::Push);
        assert_eq!(s.payout, 200);
    }

    #[test]
    fn dealer_bust_is_a_win_for_any_standing_seat() {
        let s = settle_seat(hv(18, false, false), hv(24, false, true), 40);
        assert_eq!(s.outcome, Outcome::Winner);
        assert_eq!(s.payout, 80);
    }

    #[test]
    fn equal_totals_push() {
        let s = settle_seat(hv(18, false, false), hv(18, false, false), 40);
        assert_eq!(s.outcome, Outcome::Push);
        assert_eq!(s.payout, 40);
    }

    #[test]
    fn natural_payout_floors_on_odd_bets() {
        let s = settle_seat(hv(21, true, false), hv(20, false, false), 101);
        assert_eq!(s.payout, 252); // floor(101 * 2.5) = floor(252.5)
    }

    #[test]
    fn sum_of_payouts_never_exceeds_two_point_five_times_the_pot() {
        let bets = [25u64, 100, 250, 999];
        let dealer = hv(17, false, false);
        let total_pot: u64 = bets.iter().sum();
        let total_payout: u64 = bets
            .iter()
            .map(|&bet| settle_seat(hv(21, true, false), dealer, bet).payout)
            .sum();
        assert!((total_payout as f64) <= (total_pot as f64) * 2.5);
    }

    #[test]
    fn pushes_conserve_every_players_balance() {
        let bets = [25u64, 100, 250];
        let dealer = hv(20, false, false);
        for &bet in &bets {
            let s = settle_seat(hv(20, false, false), dealer, bet);
            assert_eq!(s.outcome, Outcome::Push);
            assert_eq!(s.payout, bet);
        }
    }

    #[test]
    fn natural_win_increments_naturals_not_wins() {
        let mut stats = LifetimeStats::default();
        apply_stats(&mut stats, Outcome::Winner, true, 100, 250);
        assert_eq!(stats.naturals, 1);
        assert_eq!(stats.wins, 0);
        assert_eq!(stats.total_gains, 150);
        assert_eq!(stats.victories, 1);
    }

    #[test]
    fn victories_sums_regular_and_natural_wins() {
        let mut stats = LifetimeStats::default();
        apply_stats(&mut stats, Outcome::Winner, false, 100, 200);
        apply_stats(&mut stats, Outcome::Winner, true, 100, 250);
        apply_stats(&mut stats, Outcome::Loser, false, 100, 0);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.naturals, 1);
        assert_eq!(stats.victories, 2);
    }

    #[test]
    fn bust_increments_both_busts_and_losses() {
        let mut stats = LifetimeStats::default();
        apply_stats(&mut stats, Outcome::Bust, false, 50, 0);
        assert_eq!(stats.busts, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.total_losses, 50);
    }
}
