//! Chess rules engine with a small multi-party session layer.
//!
//! The engine (`position`, `piece`, `board`, `moves`, `game`) generates legal
//! moves and detects check, checkmate and stalemate. The session layer
//! (`store`, `broadcast`, `session`) keeps games by id, serializes moves per
//! game and fans events out to every attached player and observer.

pub mod board;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod game;
pub mod moves;
pub mod piece;
pub mod position;
pub mod session;
pub mod store;

pub use board::Board;
pub use broadcast::{Audience, Broadcaster, ConnectionId, ServerEvent, Subscription};
pub use config::Config;
pub use error::{IllegalReason, MoveError, SaveLoadError, SessionError};
pub use game::{would_leave_in_check, DrawReason, Game, GameResult, WinReason, Winner};
pub use moves::Move;
pub use piece::{Piece, PieceKind, Team};
pub use position::{in_range, Position};
pub use session::GameService;
pub use store::{GameId, GameRecord, GameSummary, MemoryStore, SessionStore};
