// src/moves.rs
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MoveError;
use crate::piece::PieceKind;
use crate::position::Position;

lazy_static! {
    // "e2e4", "e2 e4", "e7e8q", "e7 e8 q"
    static ref MOVE_PATTERN: Regex =
        Regex::new(r"(?i)^([a-h][1-8])\s*([a-h][1-8])\s*([qrbn])?$").expect("move pattern is valid");
}

/// One ply: a piece goes from `start` to `end`, optionally promoting.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Move {
    start: Position,
    end: Position,
    promotion: Option<PieceKind>,
}

impl Move {
    pub const fn new(start: Position, end: Position, promotion: Option<PieceKind>) -> Self {
        Move { start, end, promotion }
    }

    pub fn start(&self) -> Position { self.start }
    pub fn end(&self) -> Position { self.end }
    pub fn promotion(&self) -> Option<PieceKind> { self.promotion }

    pub fn with_promotion(self, kind: PieceKind) -> Self {
        Move { promotion: Some(kind), ..self }
    }

    /// Parses long algebraic notation. Only the format is checked, not legality.
    pub fn parse(input: &str) -> Result<Move, MoveError> {
        let trimmed = input.trim();
        let caps = MOVE_PATTERN
            .captures(trimmed)
            .ok_or_else(|| MoveError::InvalidFormat(trimmed.to_string()))?;

        let square = |i: usize| {
            caps.get(i)
                .and_then(|m| Position::from_algebraic(m.as_str()))
                .ok_or_else(|| MoveError::InvalidFormat(trimmed.to_string()))
        };
        let start = square(1)?;
        let end = square(2)?;
        let promotion = caps
            .get(3)
            .and_then(|m| m.as_str().chars().next())
            .and_then(PieceKind::promotion_from_char);

        Ok(Move::new(start, end, promotion))
    }
}

impl FromStr for Move {
    type Err = MoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Move::parse(s)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.start, self.end)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.symbol())?;
        }
        Ok(())
    }
}
