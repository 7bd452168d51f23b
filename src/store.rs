// src/store.rs
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use tracing::info;

use crate::error::{SaveLoadError, SessionError};
use crate::game::Game;
use crate::piece::Team;

pub type GameId = u32;

/// Everything persisted for one game.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub id: GameId,
    pub name: String,
    pub white: Option<String>,
    pub black: Option<String>,
    pub game: Game,
}

impl GameRecord {
    pub fn new(id: GameId, name: &str) -> Self {
        GameRecord { id, name: name.to_string(), white: None, black: None, game: Game::new() }
    }

    pub fn player(&self, team: Team) -> Option<&str> {
        match team {
            Team::White => self.white.as_deref(),
            Team::Black => self.black.as_deref(),
        }
    }

    pub fn set_player(&mut self, team: Team, user: Option<String>) {
        match team {
            Team::White => self.white = user,
            Team::Black => self.black = user,
        }
    }

    /// The seat `user` holds in this game, if any. White is checked first.
    pub fn seat_of(&self, user: &str) -> Option<Team> {
        Team::ALL.into_iter().find(|&team| self.player(team) == Some(user))
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary { id: self.id, name: self.name.clone(), white: self.white.clone(), black: self.black.clone() }
    }
}

/// A listing entry: id, display name and occupants.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameSummary {
    pub id: GameId,
    pub name: String,
    pub white: Option<String>,
    pub black: Option<String>,
}

/// Keyed storage of game records.
pub trait SessionStore: Send + Sync {
    fn create(&self, name: &str) -> GameId;
    fn get(&self, id: GameId) -> Option<GameRecord>;
    /// Overwrites an existing record. Unknown ids are rejected.
    fn save(&self, id: GameId, record: GameRecord) -> Result<(), SessionError>;
    fn list(&self) -> Vec<GameSummary>;
    fn clear(&self);
}

// --- In-Memory Store ---

#[derive(Debug)]
struct StoreInner {
    next_id: GameId,
    games: BTreeMap<GameId, GameRecord>,
}

impl Default for StoreInner {
    fn default() -> Self {
        StoreInner { next_id: 1, games: BTreeMap::new() }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn from_records(records: Vec<GameRecord>) -> Self {
        let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let games = records.into_iter().map(|r| (r.id, r)).collect();
        MemoryStore { inner: Mutex::new(StoreInner { next_id, games }) }
    }

    fn records(&self) -> Vec<GameRecord> {
        self.inner.lock().games.values().cloned().collect()
    }

    /// Writes every record to `filename` as pretty JSON.
    pub fn save_to_file(&self, filename: &str) -> Result<(), SaveLoadError> {
        let records = self.records();
        let json_data = serde_json::to_string_pretty(&records)
            .map_err(SaveLoadError::Serialization)?;

        fs::write(filename, json_data)
            .map_err(|e| SaveLoadError::Io(filename.to_string(), e))?;

        info!(filename, games = records.len(), "store saved");
        Ok(())
    }

    /// Rebuilds a store from a file written by [`MemoryStore::save_to_file`].
    /// New ids continue after the largest stored one.
    pub fn load_from_file(filename: &str) -> Result<Self, SaveLoadError> {
        let json_data = fs::read_to_string(filename)
            .map_err(|e| SaveLoadError::Io(filename.to_string(), e))?;
        let records: Vec<GameRecord> = serde_json::from_str(&json_data)?;
        info!(filename, games = records.len(), "store loaded");
        Ok(MemoryStore::from_records(records))
    }
}

impl SessionStore for MemoryStore {
    fn create(&self, name: &str) -> GameId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.games.insert(id, GameRecord::new(id, name));
        id
    }

    fn get(&self, id: GameId) -> Option<GameRecord> {
        self.inner.lock().games.get(&id).cloned()
    }

    fn save(&self, id: GameId, record: GameRecord) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        match inner.games.get_mut(&id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(SessionError::GameNotFound(id)),
        }
    }

    fn list(&self) -> Vec<GameSummary> {
        self.inner.lock().games.values().map(GameRecord::summary).collect()
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        *inner = StoreInner::default();
    }
}
