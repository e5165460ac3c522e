//! Error taxonomy shared by the ledger and the room state machine.
//!
//! Every client-facing failure carries a `kind`, an optional `hint`, and a
//! `recoverable` flag so the transport layer can turn it into a directed
//! confirmation without inspecting error internals.

use thiserror::Error;

/// The stable identifier a client can match on. Mirrors the taxonomy in the
/// error handling design laid out for this service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    RoomNotFound,
    PlayerNotFound,
    NotAuthorized,
    WrongPhase,
    NotYourTurn,
    BetValidationInvalidAmount,
    BetValidationInsufficientFunds,
    DeckExhausted,
}

#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct RoomError {
    pub kind: ErrorKind,
    pub message: String,
    pub hint: Option<String>,
    pub recoverable: bool,
}

impl RoomError {
    fn new(kind: ErrorKind, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
            recoverable,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn room_not_found(code: &str) -> Self {
        Self::new(
            ErrorKind::RoomNotFound,
            format!("room '{code}' does not exist"),
            false,
        )
    }

    pub fn player_not_found(seat_id: &str) -> Self {
        Self::new(
            ErrorKind::PlayerNotFound,
            format!("seat '{seat_id}' is not a member of this room"),
            false,
        )
    }

    pub fn not_authorized(action: &str) -> Self {
        Self::new(
            ErrorKind::NotAuthorized,
            format!("only the room creator may {action}"),
            false,
        )
    }

    pub fn wrong_phase(expected: &str, actual: &str) -> Self {
        Self::new(
            ErrorKind::WrongPhase,
            format!("expected phase {expected}, room is in {actual}"),
            true,
        )
        .with_hint(format!("wait for phase {expected}"))
    }

    pub fn not_your_turn() -> Self {
        Self::new(
            ErrorKind::NotYourTurn,
            "it is not your turn",
            true,
        )
    }

    pub fn invalid_bet_amount(reason: &str) -> Self {
        Self::new(ErrorKind::BetValidationInvalidAmount, reason, true)
            .with_hint("submit a valid positive integer bet")
    }

    pub fn insufficient_funds() -> Self {
        Self::new(
            ErrorKind::BetValidationInsufficientFunds,
            "bet exceeds available balance",
            true,
        )
        .with_hint("reduce the bet amount")
    }

    pub fn deck_exhausted() -> Self {
        Self::new(
            ErrorKind::DeckExhausted,
            "the shoe ran out of cards mid-round",
            false,
        )
    }
}
