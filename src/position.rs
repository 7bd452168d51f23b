// src/position.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MoveError;

pub const BOARD_SIZE: i8 = 8;

/// A square on the board as a 1-based (row, column) pair.
///
/// Row 1 is White's back rank and column 1 is the a-file. Coordinates outside
/// `1..=8` can still be represented so that callers can build a candidate square
/// first and ask [`in_range`] afterwards; nothing on the board ever lives there.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    row: i8,
    column: i8,
}

impl Position {
    pub const fn new(row: i8, column: i8) -> Self {
        Position { row, column }
    }

    pub fn row(&self) -> i8 { self.row }
    pub fn column(&self) -> i8 { self.column }

    pub fn in_range(&self) -> bool {
        (1..=BOARD_SIZE).contains(&self.row) && (1..=BOARD_SIZE).contains(&self.column)
    }

    /// The square `dr` rows and `dc` columns away. May land off the board.
    pub fn offset(&self, dr: i8, dc: i8) -> Position {
        Position::new(self.row.saturating_add(dr), self.column.saturating_add(dc))
    }

    /// Square index 0-63 (a1 = 0, h1 = 7, a8 = 56), or None when off the board.
    pub fn index(&self) -> Option<u8> {
        if !self.in_range() { return None; }
        Some(((self.row - 1) * BOARD_SIZE + (self.column - 1)) as u8)
    }

    pub fn from_index(index: u8) -> Position {
        let rank = (index / 8) as i8;
        let file = (index % 8) as i8;
        Position::new(rank + 1, file + 1)
    }

    /// Every on-board square, a1 through h8.
    pub fn all() -> impl Iterator<Item = Position> {
        (0..64u8).map(Position::from_index)
    }

    pub fn to_algebraic(&self) -> Option<String> {
        if !self.in_range() { return None; }
        let file_char = (b'a' + (self.column - 1) as u8) as char;
        let rank_char = (b'0' + self.row as u8) as char;
        Some(format!("{}{}", file_char, rank_char))
    }

    pub fn from_algebraic(s: &str) -> Option<Position> {
        if s.len() != 2 { return None; }
        let mut chars = s.chars();
        let file_char = chars.next()?.to_ascii_lowercase();
        let rank_char = chars.next()?;
        let file = match file_char { 'a'..='h' => Some(file_char as u8 - b'a'), _ => None }?;
        let rank = match rank_char { '1'..='8' => Some(rank_char as u8 - b'1'), _ => None }?;
        Some(Position::new(rank as i8 + 1, file as i8 + 1))
    }
}

/// True iff `position` lies on the 8x8 board.
pub fn in_range(position: &Position) -> bool {
    position.in_range()
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_algebraic() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "({}, {})", self.row, self.column),
        }
    }
}

impl FromStr for Position {
    type Err = MoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_algebraic(s.trim())
            .ok_or_else(|| MoveError::InvalidFormat(format!("'{}' is not a square (use a1..h8)", s.trim())))
    }
}
