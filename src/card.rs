//! Deck construction and hand evaluation (component C1).
//!
//! Pure and side-effect free by design: a shuffled deck is a value, drawing
//! mutates only that value, and evaluation is a total function over any
//! multiset of cards. This is what makes the rest of the room state machine
//! easy to unit test without a running clock or network.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::RoomError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

pub const ALL_SUITS: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "uppercase")]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

pub const ALL_RANKS: [Rank; 13] = [
    Rank::Ace,
    Rank::Two,
    Rank::Three,
    Rank::Four,
    Rank::Five,
    Rank::Six,
    Rank::Seven,
    Rank::Eight,
    Rank::Nine,
    Rank::Ten,
    Rank::Jack,
    Rank::Queen,
    Rank::King,
];

impl Rank {
    /// Base value before the soft-ace reduction rule is applied.
    fn base_value(self) -> u8 {
        match self {
            Rank::Ace => 11,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 10,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

pub const DECK_SIZE: usize = 52;

/// An ordered shoe of cards. The top of the deck is the end of the `Vec`
/// so `draw` is an O(1) pop.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Build a fresh 52-card deck and shuffle it with the given RNG.
    ///
    /// Takes an injectable RNG so callers can seed deterministically in
    /// tests (P7) while production code passes `rand::thread_rng()`.
    pub fn new_shuffled(rng: &mut impl Rng) -> Self {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for suit in ALL_SUITS {
            for rank in ALL_RANKS {
                cards.push(Card { suit, rank });
            }
        }
        cards.shuffle(rng);
        Deck { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Remove and return the top card. Fails with `DeckExhausted` if empty.
    pub fn draw(&mut self) -> Result<Card, RoomError> {
        self.cards.pop().ok_or_else(RoomError::deck_exhausted)
    }
}

/// Outcome of evaluating a hand's cards, independent of game-level outcome
/// classification (winner/loser/push), which is the settlement engine's job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandValue {
    pub total: u8,
    pub is_natural: bool,
    pub is_bust: bool,
}

/// Evaluate a hand's cards using the soft-ace rule.
///
/// Base sum treats every ace as 11; while the sum exceeds 21 and at least
/// one ace is still counted as 11, one ace is reduced to 1 (i.e. 10 is
/// subtracted from the running total). The empty hand evaluates to
/// `{0, false, false}`.
pub fn evaluate(cards: &[Card]) -> HandValue {
    if cards.is_empty() {
        return HandValue::default();
    }

    let mut total: i32 = 0;
    let mut aces_as_eleven: i32 = 0;
    for card in cards {
        total += card.rank.base_value() as i32;
        if card.rank == Rank::Ace {
            aces_as_eleven += 1;
        }
    }

    while total > 21 && aces_as_eleven > 0 {
        total -= 10;
        aces_as_eleven -= 1;
    }

    let total = total.max(0) as u8;
    HandValue {
        total,
        is_natural: cards.len() == 2 && total == 21,
        is_bust: total > 21,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn card(suit: Suit, rank: Rank) -> Card {
        Card { suit, rank }
    }

    #[test]
    fn shuffle_is_a_permutation_of_the_canonical_deck() {
        let mut rng = StdRng::seed_from_u64(7);
        let deck = Deck::new_shuffled(&mut rng);
        assert_eq!(deck.len(), DECK_SIZE);

        let mut canonical = HashSet::new();
        for suit in ALL_SUITS {
            for rank in ALL_RANKS {
                canonical.insert(card(suit, rank));
            }
        }
        let drawn: HashSet<Card> = deck.cards.iter().copied().collect();
        assert_eq!(drawn, canonical);
    }

    #[test]
    fn two_seeds_produce_different_orders() {
        let mut a = StdRng::seed_from_u64(1);
        let mut b = StdRng::seed_from_u64(2);
        let deck_a = Deck::new_shuffled(&mut a);
        let deck_b = Deck::new_shuffled(&mut b);
        assert_ne!(deck_a.cards, deck_b.cards);
    }

    #[test]
    fn draw_removes_the_top_card_and_shrinks_the_deck() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut deck = Deck::new_shuffled(&mut rng);
        let before = deck.len();
        let top = *deck.cards.last().unwrap();
        let drawn = deck.draw().unwrap();
        assert_eq!(drawn, top);
        assert_eq!(deck.len(), before - 1);
    }

    #[test]
    fn draw_from_empty_deck_is_deck_exhausted() {
        let mut deck = Deck { cards: vec![] };
        let err = deck.draw().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::DeckExhausted);
    }

    #[test]
    fn empty_hand_evaluates_to_zero() {
        let v = evaluate(&[]);
        assert_eq!(v, HandValue { total: 0, is_natural: false, is_bust: false });
    }

    #[test]
    fn ace_king_is_a_natural_twenty_one() {
        let v = evaluate(&[card(Suit::Spades, Rank::Ace), card(Suit::Diamonds, Rank::King)]);
        assert_eq!(v.total, 21);
        assert!(v.is_natural);
        assert!(!v.is_bust);
    }

    #[test]
    fn three_card_twenty_one_is_not_natural() {
        let v = evaluate(&[
            card(Suit::Spades, Rank::Seven),
            card(Suit::Diamonds, Rank::Seven),
            card(Suit::Clubs, Rank::Seven),
        ]);
        assert_eq!(v.total, 21);
        assert!(!v.is_natural);
    }

    #[test]
    fn soft_ace_reduces_on_bust() {
        // A + 6 + 8 = 11 + 6 + 8 = 25 -> reduce ace to 1 -> 15
        let v = evaluate(&[
            card(Suit::Hearts, Rank::Ace),
            card(Suit::Hearts, Rank::Six),
            card(Suit::Clubs, Rank::Eight),
        ]);
        assert_eq!(v.total, 15);
        assert!(!v.is_bust);
    }

    #[test]
    fn two_aces_reduce_in_turn() {
        // A + A + 9 = 11 + 11 + 9 = 31 -> reduce both -> 1 + 1 + 9 = 11
        let v = evaluate(&[
            card(Suit::Hearts, Rank::Ace),
            card(Suit::Spades, Rank::Ace),
            card(Suit::Clubs, Rank::Nine),
        ]);
        assert_eq!(v.total, 11);
    }

    #[test]
    fn ten_value_bust_is_detected() {
        let v = evaluate(&[
            card(Suit::Hearts, Rank::King),
            card(Suit::Spades, Rank::Queen),
            card(Suit::Clubs, Rank::Two),
        ]);
        assert_eq!(v.total, 22);
        assert!(v.is_bust);
    }

    #[test]
    fn adding_a_ten_value_card_to_a_non_soft_hand_adds_exactly_ten() {
        let base = evaluate(&[card(Suit::Hearts, Rank::Nine), card(Suit::Spades, Rank::Five)]);
        assert_eq!(base.total, 14);
        let mut cards = vec![card(Suit::Hearts, Rank::Nine), card(Suit::Spades, Rank::Five)];
        cards.push(card(Suit::Clubs, Rank::King));
        let after = evaluate(&cards);
        assert_eq!(after.total, base.total + 10);
    }
}
