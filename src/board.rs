// src/board.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::piece::{Piece, PieceKind, Team};
use crate::position::{Position, BOARD_SIZE};

// Back rank layout, a-file through h-file
const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook, PieceKind::Knight, PieceKind::Bishop, PieceKind::Queen,
    PieceKind::King, PieceKind::Bishop, PieceKind::Knight, PieceKind::Rook,
];

/// An 8x8 grid of optional pieces.
///
/// Cloning yields a fully independent copy; equality and hashing compare every cell.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, Default)]
pub struct Board {
    squares: [[Option<Piece>; 8]; 8], // [row - 1][column - 1]
}

impl Board {
    /// An empty board.
    pub fn new() -> Self {
        Board::default()
    }

    /// A board in the standard starting layout.
    pub fn standard() -> Self {
        let mut board = Board::new();
        board.reset_to_standard_starting_position();
        board
    }

    /// Overwrites a cell. `None` clears it. Off-board positions are ignored.
    pub fn add_piece(&mut self, position: Position, piece: Option<Piece>) {
        if let Some(cell) = self.cell_mut(position) {
            *cell = piece;
        }
    }

    pub fn get_piece(&self, position: Position) -> Option<Piece> {
        if !position.in_range() { return None; }
        self.squares[(position.row() - 1) as usize][(position.column() - 1) as usize]
    }

    fn cell_mut(&mut self, position: Position) -> Option<&mut Option<Piece>> {
        if !position.in_range() { return None; }
        Some(&mut self.squares[(position.row() - 1) as usize][(position.column() - 1) as usize])
    }

    pub fn reset_to_standard_starting_position(&mut self) {
        self.squares = [[None; 8]; 8];
        for column in 1..=BOARD_SIZE {
            let kind = BACK_RANK[(column - 1) as usize];
            self.add_piece(Position::new(1, column), Some(Piece::new(Team::White, kind)));
            self.add_piece(Position::new(2, column), Some(Piece::new(Team::White, PieceKind::Pawn)));
            self.add_piece(Position::new(7, column), Some(Piece::new(Team::Black, PieceKind::Pawn)));
            self.add_piece(Position::new(8, column), Some(Piece::new(Team::Black, kind)));
        }
    }

    /// Every occupied square with its piece, a1 through h8.
    pub fn pieces(&self) -> impl Iterator<Item = (Position, Piece)> + '_ {
        Position::all().filter_map(move |position| self.get_piece(position).map(|piece| (position, piece)))
    }

    /// The first king of `team` found scanning from a1, if any.
    pub fn find_king(&self, team: Team) -> Option<Position> {
        self.pieces()
            .find(|(_, piece)| piece.team == team && piece.kind == PieceKind::King)
            .map(|(position, _)| position)
    }

    pub fn piece_count(&self) -> usize {
        self.pieces().count()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  +-----------------+")?;
        for row in (1..=BOARD_SIZE).rev() {
            write!(f, "{} | ", row)?;
            for column in 1..=BOARD_SIZE {
                match self.get_piece(Position::new(row, column)) {
                    Some(piece) => write!(f, "{} ", piece)?,
                    None => write!(f, ". ")?,
                }
            }
            writeln!(f, "|")?;
        }
        writeln!(f, "  +-----------------+")?;
        write!(f, "    a b c d e f g h")
    }
}
