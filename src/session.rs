// src/session.rs
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::broadcast::{Audience, Broadcaster, ConnectionId, ServerEvent, Subscription};
use crate::error::{MoveError, SessionError};
use crate::game::{Game, GameResult};
use crate::moves::Move;
use crate::piece::Team;
use crate::position::Position;
use crate::store::{GameId, GameRecord, GameSummary, MemoryStore, SessionStore};

/// Who is behind a connection and which game it watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub game_id: GameId,
    pub user: String,
}

/// Request handler over a session store and a broadcast hub.
///
/// Every operation that changes a game runs under that game's lock, and all of
/// its events are published before the lock is released, so every subscriber
/// of a game sees changes in the order they were applied. Queries work on a
/// cloned snapshot and never wait for a writer.
pub struct GameService {
    store: Arc<dyn SessionStore>,
    broadcaster: Broadcaster,
    /// One lock per live game. The flag is set by `clear` so that requests
    /// still queued on a wiped game give up instead of touching its successor.
    game_locks: Mutex<HashMap<GameId, Arc<Mutex<bool>>>>,
    connections: RwLock<HashMap<ConnectionId, Attachment>>,
}

impl GameService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        GameService {
            store,
            broadcaster: Broadcaster::new(),
            game_locks: Mutex::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        GameService::new(Arc::new(MemoryStore::new()))
    }

    fn game_lock(&self, game_id: GameId) -> Result<Arc<Mutex<bool>>, SessionError> {
        let mut locks = self.game_locks.lock();
        if self.store.get(game_id).is_none() {
            return Err(SessionError::GameNotFound(game_id));
        }
        Ok(locks.entry(game_id).or_default().clone())
    }

    /// Runs `f` while holding the game's lock.
    fn with_game<T>(&self, game_id: GameId, f: impl FnOnce() -> Result<T, SessionError>) -> Result<T, SessionError> {
        let lock = self.game_lock(game_id)?;
        let retired = lock.lock();
        if *retired {
            return Err(SessionError::GameNotFound(game_id));
        }
        f()
    }

    fn record(&self, game_id: GameId) -> Result<GameRecord, SessionError> {
        self.store.get(game_id).ok_or(SessionError::GameNotFound(game_id))
    }

    pub fn attachment(&self, connection: ConnectionId) -> Result<Attachment, SessionError> {
        self.connections.read().get(&connection).cloned().ok_or(SessionError::NotConnected)
    }

    pub fn connection_count(&self, game_id: GameId) -> usize {
        self.connections.read().values().filter(|a| a.game_id == game_id).count()
    }

    /// Sends a rejection to the initiating connection only and hands it back to the caller.
    fn reject(&self, game_id: GameId, connection: ConnectionId, err: SessionError) -> SessionError {
        warn!(game_id, %connection, error = %err, "request rejected");
        self.broadcaster.publish(game_id, Audience::Only(connection), ServerEvent::error(err.to_string()));
        err
    }

    // --- Lobby ---

    pub fn create_game(&self, name: &str) -> Result<GameId, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::BadRequest("game name must not be empty".into()));
        }
        let game_id = self.store.create(name);
        info!(game_id, name, "game created");
        Ok(game_id)
    }

    pub fn list_games(&self) -> Vec<GameSummary> {
        self.store.list()
    }

    pub fn get_game(&self, game_id: GameId) -> Result<GameRecord, SessionError> {
        self.record(game_id)
    }

    /// Claims a seat. Re-joining your own seat is allowed.
    pub fn join_game(&self, game_id: GameId, user: &str, team: Team) -> Result<(), SessionError> {
        let user = user.trim();
        if user.is_empty() {
            return Err(SessionError::BadRequest("user name must not be empty".into()));
        }
        self.with_game(game_id, || {
            let mut record = self.record(game_id)?;
            match record.player(team) {
                Some(holder) if holder != user => return Err(SessionError::SeatTaken(team)),
                Some(_) => return Ok(()),
                None => {}
            }
            record.set_player(team, Some(user.to_string()));
            self.store.save(game_id, record)?;
            info!(game_id, user, %team, "seat joined");
            Ok(())
        })
    }

    // --- Live Session ---

    /// Attaches `user` to a game as a player (if seated) or an observer.
    /// The returned subscription receives the current state first.
    pub fn connect(&self, game_id: GameId, user: &str) -> Result<Subscription, SessionError> {
        self.with_game(game_id, || self.attach(game_id, user))
    }

    fn attach(&self, game_id: GameId, user: &str) -> Result<Subscription, SessionError> {
        let record = self.record(game_id)?;
        let connection = ConnectionId::random();
        let subscription = self.broadcaster.subscribe(game_id, connection);
        self.connections
            .write()
            .insert(connection, Attachment { game_id, user: user.to_string() });

        let role = match record.seat_of(user) {
            Some(team) => team.to_string(),
            None => "an observer".to_string(),
        };
        info!(game_id, user, %connection, role = %role, "connected");
        self.broadcaster.publish(
            game_id,
            Audience::AllExcept(connection),
            ServerEvent::notification(format!("{} joined the game as {}.", user, role)),
        );
        self.broadcaster.publish(game_id, Audience::Only(connection), ServerEvent::LoadGame { game: record.game });
        Ok(subscription)
    }

    /// Legal moves for the piece on `position`, computed on a snapshot.
    pub fn legal_moves(&self, game_id: GameId, position: Position) -> Result<Vec<Move>, SessionError> {
        if !position.in_range() {
            return Err(MoveError::InvalidPosition(position).into());
        }
        let snapshot = self.record(game_id)?.game;
        Ok(snapshot.valid_moves(position))
    }

    /// The seat a user acts from. A user holding both seats acts for the side to move.
    fn acting_seat(record: &GameRecord, user: &str) -> Option<Team> {
        let to_move = record.game.team_to_move();
        if record.player(to_move) == Some(user) {
            Some(to_move)
        } else {
            record.seat_of(user)
        }
    }

    fn display_name(record: &GameRecord, team: Team) -> String {
        record.player(team).map_or_else(|| team.to_string(), str::to_string)
    }

    /// Applies a move for the player behind `connection` and returns the new state.
    pub fn make_move(&self, connection: ConnectionId, mv: &Move) -> Result<Game, SessionError> {
        let attachment = self.attachment(connection)?;
        let game_id = attachment.game_id;
        self.with_game(game_id, || {
            self.try_move(game_id, connection, &attachment.user, mv)
                .map_err(|err| self.reject(game_id, connection, err))
        })
    }

    fn try_move(&self, game_id: GameId, connection: ConnectionId, user: &str, mv: &Move) -> Result<Game, SessionError> {
        let mut record = self.record(game_id)?;
        if record.game.is_game_over() {
            return Err(SessionError::GameOver);
        }
        let seat = Self::acting_seat(&record, user).ok_or(SessionError::ObserverCannotAct("make moves"))?;
        if record.game.team_to_move() != seat {
            return Err(SessionError::NotYourTurn);
        }
        if record.game.board().get_piece(mv.start()).is_some_and(|piece| piece.team != seat) {
            return Err(SessionError::NotYourPiece);
        }

        record.game.apply_move(mv)?;

        // --- Status of the side now to move ---
        let next = record.game.team_to_move();
        let status = if record.game.is_in_checkmate(next) {
            record.game.set_game_over();
            Some(format!("{} is in checkmate!", Self::display_name(&record, next)))
        } else if record.game.is_in_check(next) {
            Some(format!("{} is in check.", Self::display_name(&record, next)))
        } else if record.game.is_in_stalemate(next) {
            record.game.set_game_over();
            Some("Stalemate!".to_string())
        } else {
            None
        };

        let game = record.game.clone();
        self.store.save(game_id, record)?;
        info!(game_id, user, %mv, "move applied");

        self.broadcaster.publish(game_id, Audience::All, ServerEvent::LoadGame { game: game.clone() });
        self.broadcaster.publish(
            game_id,
            Audience::AllExcept(connection),
            ServerEvent::notification(format!("{} moved {} to {}.", user, mv.start(), mv.end())),
        );
        if let Some(message) = status {
            if let Some(result) = game.outcome() {
                info!(game_id, %result, "game over");
            }
            self.broadcaster.publish(game_id, Audience::All, ServerEvent::notification(message));
        }
        Ok(game)
    }

    /// Detaches a connection, which then receives nothing further.
    /// A seated player gives up every seat they hold.
    pub fn leave(&self, connection: ConnectionId) -> Result<(), SessionError> {
        let attachment = self.connections.write().remove(&connection).ok_or(SessionError::NotConnected)?;
        let game_id = attachment.game_id;
        self.broadcaster.unsubscribe(game_id, connection);

        match self.with_game(game_id, || self.vacate(game_id, connection, &attachment.user)) {
            Err(SessionError::GameNotFound(_)) => {
                info!(game_id, user = %attachment.user, "left a game that no longer exists");
                Ok(())
            }
            other => other,
        }
    }

    fn vacate(&self, game_id: GameId, connection: ConnectionId, user: &str) -> Result<(), SessionError> {
        let mut record = self.record(game_id)?;
        let mut was_player = false;
        for team in Team::ALL {
            if record.player(team) == Some(user) {
                record.set_player(team, None);
                was_player = true;
            }
        }
        if was_player {
            self.store.save(game_id, record)?;
            self.broadcaster.publish(
                game_id,
                Audience::AllExcept(connection),
                ServerEvent::notification(format!("{} left the game", user)),
            );
        }
        info!(game_id, user, was_player, "left");
        Ok(())
    }

    /// Ends the game in the opponent's favour. Players only.
    pub fn resign(&self, connection: ConnectionId) -> Result<GameResult, SessionError> {
        let attachment = self.attachment(connection)?;
        let game_id = attachment.game_id;
        self.with_game(game_id, || {
            self.try_resign(game_id, &attachment.user)
                .map_err(|err| self.reject(game_id, connection, err))
        })
    }

    fn try_resign(&self, game_id: GameId, user: &str) -> Result<GameResult, SessionError> {
        let mut record = self.record(game_id)?;
        let seat = Self::acting_seat(&record, user).ok_or(SessionError::ObserverCannotAct("resign"))?;
        if record.game.is_game_over() {
            return Err(SessionError::GameOver);
        }
        let result = record.game.resign(seat);
        self.store.save(game_id, record)?;
        info!(game_id, user, %result, "resigned");
        self.broadcaster.publish(
            game_id,
            Audience::All,
            ServerEvent::notification(format!("{} ({}) has resigned.", user, seat)),
        );
        Ok(result)
    }

    /// Wipes every game, connection and channel. Waits for in-flight requests
    /// to finish first; requests queued behind them fail with `GameNotFound`.
    pub fn clear(&self) {
        let mut locks = self.game_locks.lock();
        let held: Vec<Arc<Mutex<bool>>> = locks.values().cloned().collect();
        let mut guards: Vec<_> = held.iter().map(|lock| lock.lock()).collect();
        for retired in guards.iter_mut() {
            **retired = true;
        }
        self.store.clear();
        self.connections.write().clear();
        self.broadcaster.clear();
        locks.clear();
        info!(games = held.len(), "service cleared");
    }
}
