//! WebSocket transport: the only place that knows `ClientIntent`/`RoomEvent`
//! travel as JSON text frames.
//!
//! `GET /ws` upgrades unconditionally; the first frame the client sends must
//! be a `createRoom` or `joinRoom` intent, matching the inbound event
//! catalog. Every frame after that is a `ClientIntent`; every frame sent
//! back is a `RoomEvent`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};

use crate::error::RoomError;
use crate::protocol::{ClientIntent, RoomEvent};
use crate::registry::{ConnectionRegistry, RoomRegistry};
use crate::room::actor::RoomHandle;

#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomRegistry,
    pub connections: ConnectionRegistry,
    pub idle_timeout: Duration,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

pub async fn healthz() -> &'static str {
    "ok"
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = state.connections.register().await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (handle, seat_id, greeting) = match await_handshake(&state, &mut ws_rx).await {
        Ok(triple) => triple,
        Err(err) => {
            send_event(&mut ws_tx, &RoomEvent::RoomError((&err).into())).await;
            state.connections.unregister(conn_id).await;
            return;
        }
    };
    send_event(&mut ws_tx, &greeting).await;

    tracing::info!(room = %handle.code, seat = %seat_id, "socket connected");

    let mut events = handle.subscribe();
    let mut unicast = handle.register_connection(seat_id.clone());
    let room_code = handle.code.clone();

    let send_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                broadcast = events.recv() => match broadcast {
                    Ok(event) => event,
                    Err(_) => break,
                },
                direct = unicast.recv() => match direct {
                    Some(event) => event,
                    None => break,
                },
            };
            let Ok(text) = serde_json::to_string(&event) else { continue };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => {
                state.connections.touch(conn_id).await;
                dispatch(&handle, &seat_id, &text).await;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
        if state.connections.is_idle(conn_id, state.idle_timeout).await {
            tracing::debug!(conn = conn_id, "closing idle socket");
            break;
        }
    }

    send_task.abort();
    handle.leave(seat_id.clone());
    state.connections.unregister(conn_id).await;
    tracing::info!(room = %room_code, seat = %seat_id, "socket disconnected");
}

async fn send_event(ws_tx: &mut (impl Sink<Message, Error = axum::Error> + Unpin), event: &RoomEvent) {
    if let Ok(text) = serde_json::to_string(event) {
        let _ = ws_tx.send(Message::Text(text)).await;
    }
}

/// Block until the client sends a valid `createRoom`/`joinRoom` frame (or
/// the socket closes first). Anything else before that point is ignored,
/// since the room to operate on isn't known yet.
async fn await_handshake(
    state: &AppState,
    ws_rx: &mut (impl Stream<Item = Result<Message, axum::Error>> + Unpin),
) -> Result<(RoomHandle, String, RoomEvent), RoomError> {
    while let Some(Ok(msg)) = ws_rx.next().await {
        let Message::Text(text) = msg else { continue };
        let Ok(intent) = serde_json::from_str::<ClientIntent>(&text) else { continue };
        return match intent {
            ClientIntent::CreateRoom { display_name } => {
                let (handle, creator_id) = state.rooms.create_room(display_name).await;
                let greeting = RoomEvent::RoomCreated { code: handle.code.clone() };
                Ok((handle, creator_id, greeting))
            }
            ClientIntent::JoinRoom { code, display_name } => {
                let handle = state.rooms.get(&code).await?;
                let seat_id = handle.join(display_name).await;
                let greeting = RoomEvent::RoomJoined { code: handle.code.clone(), seat_id: seat_id.clone() };
                Ok((handle, seat_id, greeting))
            }
            _ => continue,
        };
    }
    Err(RoomError::room_not_found("<none requested>"))
}

/// Parse one inbound frame as a `ClientIntent` and route it to the room
/// handle. Malformed frames are logged and otherwise ignored: a client that
/// sends garbage gets no reply rather than a connection drop, since a typo
/// in one message shouldn't tear down an otherwise-healthy session.
async fn dispatch(handle: &RoomHandle, seat_id: &str, text: &str) {
    let intent: ClientIntent = match serde_json::from_str(text) {
        Ok(intent) => intent,
        Err(e) => {
            tracing::debug!(seat = %seat_id, "malformed client frame: {e}");
            return;
        }
    };

    let seat_id = seat_id.to_string();
    let seat_id_for_log = seat_id.clone();
    let result = match intent {
        ClientIntent::CreateRoom { .. } | ClientIntent::JoinRoom { .. } => {
            // The handshake already happened; resending these on an
            // established socket is a no-op rather than an error.
            Ok(())
        }
        ClientIntent::LeaveRoom => {
            handle.leave(seat_id);
            Ok(())
        }
        ClientIntent::StartRound => handle.start(seat_id).await,
        ClientIntent::RestartRound => handle.restart(seat_id).await,
        ClientIntent::PlaceBet { amount } => handle.place_bet(seat_id, amount).await,
        ClientIntent::ClearBet => handle.clear_bet(seat_id).await,
        ClientIntent::Ready => handle.ready(seat_id).await,
        ClientIntent::Hit => handle.hit(seat_id).await,
        ClientIntent::Stand => handle.stand(seat_id).await,
        ClientIntent::RequestSync { mode, last_seen_round_id } => {
            handle.request_sync(seat_id, mode, last_seen_round_id);
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::debug!(seat = %seat_id_for_log, "intent rejected: {e}");
    }
}
