//! Client <-> room message catalog (component of C4/C5 wiring).
//!
//! These types are transport-agnostic: the core only knows about
//! `ClientIntent` and `RoomEvent`. `ws.rs` is the only place that knows
//! these are serialized as JSON over a WebSocket.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::card::Card;
use crate::error::ErrorKind;
use crate::ledger::LifetimeStats;
use crate::room::state::{Phase, Urgency};
use crate::settlement::Outcome;

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientIntent {
    CreateRoom { display_name: String },
    JoinRoom { code: String, display_name: String },
    LeaveRoom,
    StartRound,
    RestartRound,
    PlaceBet { amount: i64 },
    ClearBet,
    Ready,
    Hit,
    Stand,
    RequestSync {
        mode: SyncMode,
        last_seen_round_id: Option<Uuid>,
    },
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SyncMode {
    Full,
    Partial,
    TimerOnly,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    pub id: String,
    pub position: u32,
    pub display_name: String,
    pub hand: Vec<Card>,
    pub total: u8,
    pub natural: bool,
    pub bust: bool,
    pub standing: bool,
    pub outcome: Outcome,
    pub balance: u64,
    pub current_bet: u64,
    pub has_placed_bet: bool,
    pub stats: LifetimeStats,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerView {
    pub hand: Vec<Card>,
    pub total: u8,
    pub bust: bool,
    pub natural: bool,
    /// Always `false` until the dealer's turn; the hole card is simply
    /// never placed in `hand` before then.
    pub hole_card_hidden: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_code: String,
    pub round_id: Uuid,
    pub phase: Phase,
    pub turn_index: Option<usize>,
    pub betting_deadline_ms: Option<u64>,
    pub min_bet: u64,
    pub max_bet: u64,
    pub total_pot: u64,
    pub seats: Vec<SeatView>,
    pub dealer: DealerView,
    pub server_timestamp_ms: u64,
    pub sync_id: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersUpdate {
    pub seats: Vec<SeatView>,
    pub creator_id: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingPhaseStarted {
    pub round_id: Uuid,
    pub min_bet: u64,
    pub max_bet: u64,
    pub betting_deadline_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingTick {
    pub remaining_seconds: u64,
    pub urgency: Urgency,
    pub players_ready: usize,
    pub total_players: usize,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BettingEndReason {
    AllReady,
    Timeout,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingPhaseEnded {
    pub reason: BettingEndReason,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoAdvanceScheduled {
    pub delay_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomError {
    pub kind: ErrorKind,
    pub message: String,
    pub hint: Option<String>,
    pub recoverable: bool,
}

impl From<&crate::error::RoomError> for RoomError {
    fn from(e: &crate::error::RoomError) -> Self {
        RoomError {
            kind: e.kind,
            message: e.message.clone(),
            hint: e.hint.clone(),
            recoverable: e.recoverable,
        }
    }
}

/// Every message the room can emit, whether broadcast to the whole room or
/// unicast to the socket that triggered it. The broadcaster (`ws.rs`)
/// decides the fan-out based on which API produced the event; the event
/// shape itself does not encode that.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RoomEvent {
    RoomCreated { code: String },
    RoomJoined { code: String, seat_id: String },
    RoomError(RoomError),
    MembersUpdate(MembersUpdate),
    BettingPhaseStarted(BettingPhaseStarted),
    BettingTick(BettingTick),
    BettingPhaseEnded(BettingPhaseEnded),
    Snapshot(RoomSnapshot),
    /// Unicast reply to `requestSync`, carrying whether the caller's last
    /// known round is stale relative to the one in `snapshot`.
    SyncReply { snapshot: RoomSnapshot, stale: bool },
    BetConfirmed { current_bet: u64, balance: u64 },
    BetRejected(RoomError),
    BetCleared { balance: u64 },
    AutoAdvanceScheduled(AutoAdvanceScheduled),
    AutoAdvanceCancelled,
    NoBetsPlaced,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_bet_rejects_non_integer_payloads_at_the_boundary() {
        // Non-integer JSON numbers fail to deserialize as `i64` before any
        // room logic runs.
        let err = serde_json::from_str::<ClientIntent>(
            r#"{"type":"placeBet","amount":12.5}"#,
        )
        .unwrap_err();
        assert!(err.to_string().len() > 0);

        let err = serde_json::from_str::<ClientIntent>(
            r#"{"type":"placeBet","amount":"NaN"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().len() > 0);
    }

    #[test]
    fn place_bet_accepts_negative_integers_for_downstream_validation() {
        // Negative/zero integers parse fine; `RoomError::invalid_bet_amount`
        // is what rejects them once they reach `room::state`.
        let intent: ClientIntent =
            serde_json::from_str(r#"{"type":"placeBet","amount":-1}"#).unwrap();
        match intent {
            ClientIntent::PlaceBet { amount } => assert_eq!(amount, -1),
            _ => panic!("wrong variant"),
        }
    }
}
