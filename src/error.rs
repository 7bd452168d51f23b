// src/error.rs
use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use crate::moves::Move;
use crate::piece::Team;
use crate::position::Position;
use crate::store::GameId;

// --- Engine Errors ---

/// Why a move was refused by the rules engine.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
pub enum IllegalReason {
    NoPiece,
    NotPlayersTurn(Team), // The team whose turn it actually is
    LeavesKingInCheck,
    InvalidPieceMovement,
    MissingPromotion,
    GameOver,
}

impl fmt::Display for IllegalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IllegalReason::NoPiece => write!(f, "there is no piece on the starting square"),
            IllegalReason::NotPlayersTurn(turn) => write!(f, "it is {}'s turn to move", turn),
            IllegalReason::LeavesKingInCheck => write!(f, "it leaves the king in check"),
            IllegalReason::InvalidPieceMovement => write!(f, "the piece cannot move that way"),
            IllegalReason::MissingPromotion => write!(f, "a pawn reaching the last rank needs a promotion piece (q, r, b or n)"),
            IllegalReason::GameOver => write!(f, "the game is already over"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("Position {0} is off the board")]
    InvalidPosition(Position),
    #[error("Illegal move '{mv}': {reason}")]
    IllegalMove { mv: Move, reason: IllegalReason },
    #[error("No {0} king on the board")]
    NoKingPresent(Team),
    #[error("Invalid move format: {0}. Use a format like 'e2e4', 'e2 e4' or 'a7a8q'.")]
    InvalidFormat(String),
}

impl MoveError {
    pub(crate) fn illegal(mv: &Move, reason: IllegalReason) -> Self {
        MoveError::IllegalMove { mv: *mv, reason }
    }
}

// --- Persistence Errors ---

#[derive(Debug, thiserror::Error)]
pub enum SaveLoadError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error with file '{0}': {1}")]
    Io(String, #[source] io::Error),
}

// --- Session Errors ---

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Game {0} not found")]
    GameNotFound(GameId),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("The {0} seat is already taken")]
    SeatTaken(Team),
    #[error("Connection is not attached to a game")]
    NotConnected,
    #[error("Observers cannot {0}. Join the game as a player to play.")]
    ObserverCannotAct(&'static str),
    #[error("Cannot move on the other player's turn")]
    NotYourTurn,
    #[error("Cannot move the other player's piece")]
    NotYourPiece,
    #[error("The game has ended")]
    GameOver,
    #[error(transparent)]
    Move(#[from] MoveError),
    #[error(transparent)]
    Persistence(#[from] SaveLoadError),
}
