// src/broadcast.rs
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::game::Game;
use crate::store::GameId;

/// Identifies one attached party (player or observer) within the service.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn random() -> Self {
        ConnectionId(rand::rng().random())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{:016x}", self.0)
    }
}

/// What a subscriber receives.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Full state after a change, or on first attach.
    LoadGame { game: Game },
    Notification { message: String },
    Error { message: String },
}

impl ServerEvent {
    pub fn notification(message: impl Into<String>) -> Self {
        ServerEvent::Notification { message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error { message: message.into() }
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerEvent::LoadGame { game } => write!(f, "{}", game),
            ServerEvent::Notification { message } => write!(f, "[notice] {}", message),
            ServerEvent::Error { message } => write!(f, "[error] {}", message),
        }
    }
}

/// Which subscribers of a game an event is meant for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Audience {
    All,
    AllExcept(ConnectionId),
    Only(ConnectionId),
}

impl Audience {
    pub fn includes(&self, id: ConnectionId) -> bool {
        match *self {
            Audience::All => true,
            Audience::AllExcept(excluded) => excluded != id,
            Audience::Only(target) => target == id,
        }
    }
}

// --- Fan-out Hub ---

type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// Per-game registry of attached connections, each with its own unbounded queue.
/// Nothing is dropped for a slow reader; a detached connection stops receiving
/// at once. Callers that publish to one game from several threads must
/// serialize those calls to keep every queue in the same order.
#[derive(Debug, Default)]
pub struct Broadcaster {
    games: RwLock<HashMap<GameId, HashMap<ConnectionId, Outbox>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Broadcaster::default()
    }

    pub fn subscribe(&self, game_id: GameId, id: ConnectionId) -> Subscription {
        let (outbox, receiver) = mpsc::unbounded_channel();
        self.games.write().entry(game_id).or_default().insert(id, outbox);
        Subscription { id, game_id, receiver }
    }

    /// Detaches one connection. Its subscription sees the stream end after
    /// whatever was already queued. Returns false if it was not attached.
    pub fn unsubscribe(&self, game_id: GameId, id: ConnectionId) -> bool {
        let mut games = self.games.write();
        let Some(subscribers) = games.get_mut(&game_id) else { return false };
        let removed = subscribers.remove(&id).is_some();
        if subscribers.is_empty() {
            games.remove(&game_id);
        }
        removed
    }

    /// Queues the event for every attached connection in the audience and
    /// returns how many queues accepted it.
    pub fn publish(&self, game_id: GameId, audience: Audience, event: ServerEvent) -> usize {
        let games = self.games.read();
        let Some(subscribers) = games.get(&game_id) else {
            debug!(game_id, "no subscribers, event dropped");
            return 0;
        };
        let mut delivered = 0;
        for (id, outbox) in subscribers.iter().filter(|(id, _)| audience.includes(**id)) {
            match outbox.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => debug!(game_id, connection = %id, "subscription dropped without detaching"),
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, game_id: GameId) -> usize {
        self.games.read().get(&game_id).map_or(0, HashMap::len)
    }

    pub fn clear(&self) {
        self.games.write().clear();
    }
}

/// A connection's view of one game's event stream.
#[derive(Debug)]
pub struct Subscription {
    id: ConnectionId,
    game_id: GameId,
    receiver: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Subscription {
    pub fn id(&self) -> ConnectionId { self.id }
    pub fn game_id(&self) -> GameId { self.game_id }

    /// Waits for the next event addressed to this connection.
    /// `None` once the connection is detached and its queue is empty.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.receiver.recv().await
    }

    /// Next already-queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        self.receiver.try_recv().ok()
    }

    /// Everything pending right now, oldest first.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
