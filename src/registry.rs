//! Process-wide room directory and idle-connection sweeping.
//!
//! Mirrors the coordinator's `AppState` shape: one `Arc<RwLock<HashMap<...>>>`
//! shared across every connection, guarding only the directory itself. Each
//! room's actual state lives inside its own actor task, never behind this
//! lock, so a long-running room never holds up a lookup for another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::RwLock;

use crate::error::RoomError;
use crate::room::actor::{self, RoomHandle};
use crate::room::state::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN};

const MAX_CODE_ATTEMPTS: usize = 16;

#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new room with a freshly generated, currently-unused code,
    /// seat the founding member, and register the handle.
    pub async fn create_room(&self, creator_display_name: String) -> (RoomHandle, String) {
        let code = self.generate_unused_code().await;
        let (handle, creator_id) = actor::spawn(code, creator_display_name);
        self.rooms.write().await.insert(handle.code.clone(), handle.clone());
        (handle, creator_id)
    }

    pub async fn get(&self, code: &str) -> Result<RoomHandle, RoomError> {
        self.rooms
            .read()
            .await
            .get(&code.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| RoomError::room_not_found(code))
    }

    /// Drop the directory entry for a room. Call once the room's actor task
    /// has torn itself down (its last seat left); does not touch the actor.
    pub async fn remove(&self, code: &str) {
        self.rooms.write().await.remove(code);
    }

    async fn generate_unused_code(&self) -> String {
        let rooms = self.rooms.read().await;
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = random_code();
            if !rooms.contains_key(&candidate) {
                return candidate;
            }
        }
        // Exhausting the short alphabet's collision budget this many times
        // in a row is astronomically unlikely; widen with a random suffix
        // rather than fail the request.
        format!("{}{}", random_code(), random_code())
    }
}

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    let alphabet: Vec<char> = ROOM_CODE_ALPHABET.chars().collect();
    (0..ROOM_CODE_LEN)
        .map(|_| *alphabet.choose(&mut rng).expect("alphabet is non-empty"))
        .collect()
}

/// Tracks per-socket last-activity timestamps and periodically evicts ones
/// that have gone quiet past `timeout`. `ws.rs` touches an entry on every
/// inbound frame; the sweeper only ever reads and removes.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    last_activity: Arc<RwLock<HashMap<u64, u64>>>,
    next_id: Arc<AtomicU64>,
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.last_activity.write().await.insert(id, now_ms());
        id
    }

    pub async fn touch(&self, id: u64) {
        self.last_activity.write().await.insert(id, now_ms());
    }

    pub async fn unregister(&self, id: u64) {
        self.last_activity.write().await.remove(&id);
    }

    /// Spawn the background sweeper. Its only effect is logging which
    /// connection ids have gone idle past `timeout`; `ws.rs` is expected to
    /// also consult `is_idle` from inside the socket loop to actually close
    /// the connection, since the sweeper has no handle to the socket itself.
    pub fn spawn_sweeper(self, timeout: Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(timeout / 2);
            loop {
                interval.tick().await;
                let cutoff = now_ms().saturating_sub(timeout.as_millis() as u64);
                let stale: Vec<u64> = self
                    .last_activity
                    .read()
                    .await
                    .iter()
                    .filter(|(_, &ts)| ts < cutoff)
                    .map(|(&id, _)| id)
                    .collect();
                if !stale.is_empty() {
                    tracing::debug!(count = stale.len(), "idle connections past timeout");
                }
            }
        });
    }

    pub async fn is_idle(&self, id: u64, timeout: Duration) -> bool {
        let cutoff = now_ms().saturating_sub(timeout.as_millis() as u64);
        self.last_activity
            .read()
            .await
            .get(&id)
            .map(|&ts| ts < cutoff)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_code_uses_only_the_room_alphabet_and_correct_length() {
        let code = random_code();
        assert_eq!(code.len(), ROOM_CODE_LEN);
        assert!(code.chars().all(|c| ROOM_CODE_ALPHABET.contains(c)));
    }

    #[tokio::test]
    async fn create_room_registers_a_lookupable_handle() {
        let registry = RoomRegistry::new();
        let (handle, _creator_id) = registry.create_room("alice".to_string()).await;
        let found = registry.get(&handle.code).await.unwrap();
        assert_eq!(found.code, handle.code);
    }

    #[tokio::test]
    async fn unknown_code_is_room_not_found() {
        let registry = RoomRegistry::new();
        let err = registry.get("ZZZZ").await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::RoomNotFound);
    }

    #[tokio::test]
    async fn connection_registry_tracks_and_clears_activity() {
        let registry = ConnectionRegistry::new();
        let id = registry.register().await;
        assert!(!registry.is_idle(id, Duration::from_secs(300)).await);
        registry.unregister(id).await;
        assert!(registry.is_idle(id, Duration::from_secs(300)).await);
    }
}
