// src/piece.rs
use lazy_static::lazy_static; // Precomputed leaper tables
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::board::Board;
use crate::moves::Move;
use crate::position::Position;

// --- Bitboard Constants (leaper tables) ---
const FILE_A: u64 = 0x0101010101010101;
const FILE_B: u64 = FILE_A << 1;
const FILE_G: u64 = FILE_A << 6;
const FILE_H: u64 = FILE_A << 7;

const RANK_1: u64 = 0x00000000000000FF;
const RANK_2: u64 = RANK_1 << 8;
const RANK_7: u64 = RANK_1 << 48;
const RANK_8: u64 = RANK_1 << 56;

const NOT_FILE_A: u64 = !FILE_A;
const NOT_FILE_B: u64 = !FILE_B;
const NOT_FILE_G: u64 = !FILE_G;
const NOT_FILE_H: u64 = !FILE_H;

const NOT_RANK_1: u64 = !RANK_1;
const NOT_RANK_2: u64 = !RANK_2;
const NOT_RANK_7: u64 = !RANK_7;
const NOT_RANK_8: u64 = !RANK_8;

// Ray directions for sliding pieces
const DIRECTIONS: &[(i8, i8, bool)] = &[ // (dr, dc, is_diagonal)
    ( 1,  0, false), (-1,  0, false), ( 0,  1, false), ( 0, -1, false), // Orthogonal
    ( 1,  1, true),  ( 1, -1, true),  (-1,  1, true),  (-1, -1, true),  // Diagonal
];

/// Pieces a pawn may become on the last rank, in the order moves are emitted.
pub const PROMOTION_KINDS: [PieceKind; 4] = [PieceKind::Queen, PieceKind::Rook, PieceKind::Bishop, PieceKind::Knight];

// --- Teams and Kinds ---
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Team { White, Black }

impl Team {
    pub const ALL: [Team; 2] = [Team::White, Team::Black];

    pub fn opponent(&self) -> Team {
        match self { Team::White => Team::Black, Team::Black => Team::White }
    }

    /// Row delta of a single pawn step.
    pub fn pawn_direction(&self) -> i8 {
        match self { Team::White => 1, Team::Black => -1 }
    }

    pub fn pawn_start_row(&self) -> i8 {
        match self { Team::White => 2, Team::Black => 7 }
    }

    pub fn promotion_row(&self) -> i8 {
        match self { Team::White => 8, Team::Black => 1 }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::White => write!(f, "white"),
            Team::Black => write!(f, "black"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PieceKind { Pawn, Knight, Bishop, Rook, Queen, King }

impl PieceKind {
    pub fn symbol(&self) -> char {
        match self {
            PieceKind::Pawn => 'p', PieceKind::Knight => 'n', PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r', PieceKind::Queen => 'q', PieceKind::King => 'k',
        }
    }

    /// Parses a promotion letter. Kings and pawns are never promotion targets.
    pub fn promotion_from_char(c: char) -> Option<PieceKind> {
        match c.to_ascii_lowercase() {
            'q' => Some(PieceKind::Queen), 'r' => Some(PieceKind::Rook),
            'b' => Some(PieceKind::Bishop), 'n' => Some(PieceKind::Knight),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Piece {
    pub team: Team,
    pub kind: PieceKind,
}

impl Piece {
    pub fn new(team: Team, kind: PieceKind) -> Self { Piece { team, kind } }

    pub fn from_char(c: char) -> Option<Self> {
        let team = if c.is_uppercase() { Team::White } else { Team::Black };
        let kind = match c.to_ascii_lowercase() {
            'p' => PieceKind::Pawn, 'n' => PieceKind::Knight, 'b' => PieceKind::Bishop,
            'r' => PieceKind::Rook, 'q' => PieceKind::Queen, 'k' => PieceKind::King,
            _ => return None,
        };
        Some(Piece::new(team, kind))
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = self.kind.symbol();
        let symbol = match self.team {
            Team::White => symbol.to_ascii_uppercase(),
            Team::Black => symbol,
        };
        write!(f, "{}", symbol)
    }
}

// --- Precomputed Move Tables ---

lazy_static! {
    static ref KNIGHT_ATTACKS: [u64; 64] = compute_knight_attacks();
    static ref KING_ATTACKS: [u64; 64] = compute_king_attacks();
}

fn compute_knight_attacks() -> [u64; 64] {
    let mut attacks = [0u64; 64];
    for sq in 0..64 {
        let from_bb = 1u64 << sq;
        let mut moves: u64 = 0;
        // Masks keep the offsets from wrapping around the board edges
        moves |= (from_bb & NOT_FILE_H & NOT_RANK_7 & NOT_RANK_8).wrapping_shl(17); // Up 2 Right 1
        moves |= (from_bb & NOT_FILE_A & NOT_RANK_7 & NOT_RANK_8).wrapping_shl(15); // Up 2 Left 1
        moves |= (from_bb & NOT_FILE_G & NOT_FILE_H & NOT_RANK_8).wrapping_shl(10); // Up 1 Right 2
        moves |= (from_bb & NOT_FILE_A & NOT_FILE_B & NOT_RANK_8).wrapping_shl(6);  // Up 1 Left 2
        moves |= (from_bb & NOT_FILE_A & NOT_RANK_1 & NOT_RANK_2).wrapping_shr(17); // Down 2 Left 1
        moves |= (from_bb & NOT_FILE_H & NOT_RANK_1 & NOT_RANK_2).wrapping_shr(15); // Down 2 Right 1
        moves |= (from_bb & NOT_FILE_A & NOT_FILE_B & NOT_RANK_1).wrapping_shr(10); // Down 1 Left 2
        moves |= (from_bb & NOT_FILE_G & NOT_FILE_H & NOT_RANK_1).wrapping_shr(6);  // Down 1 Right 2
        attacks[sq as usize] = moves;
    }
    attacks
}

fn compute_king_attacks() -> [u64; 64] {
    let mut attacks = [0u64; 64];
    for sq in 0..64 {
        let from_bb = 1u64 << sq;
        let mut moves: u64 = 0;
        moves |= (from_bb & NOT_FILE_A & NOT_RANK_8).wrapping_shl(7); // Up-Left
        moves |= (from_bb             & NOT_RANK_8).wrapping_shl(8); // Up
        moves |= (from_bb & NOT_FILE_H & NOT_RANK_8).wrapping_shl(9); // Up-Right
        moves |= (from_bb & NOT_FILE_A            ).wrapping_shr(1); // Left
        moves |= (from_bb & NOT_FILE_H            ).wrapping_shl(1); // Right
        moves |= (from_bb & NOT_FILE_A & NOT_RANK_1).wrapping_shr(9); // Down-Left
        moves |= (from_bb             & NOT_RANK_1).wrapping_shr(8); // Down
        moves |= (from_bb & NOT_FILE_H & NOT_RANK_1).wrapping_shr(7); // Down-Right
        attacks[sq as usize] = moves;
    }
    attacks
}

// --- Pseudo-Legal Move Generation ---

impl Piece {
    /// Every pseudo-legal move for this piece standing on `from`.
    ///
    /// Board edges and same-team occupancy are respected; whether the move would
    /// leave the mover's own king attacked is not considered here.
    pub fn piece_moves(&self, board: &Board, from: Position) -> Vec<Move> {
        let mut moves = Vec::with_capacity(28);
        let Some(from_sq) = from.index() else { return moves };

        match self.kind {
            PieceKind::Pawn => self.pawn_moves(board, from, &mut moves),
            PieceKind::Knight => self.leaper_moves(board, from, KNIGHT_ATTACKS[from_sq as usize], &mut moves),
            PieceKind::King => self.leaper_moves(board, from, KING_ATTACKS[from_sq as usize], &mut moves),
            PieceKind::Bishop => self.sliding_moves(board, from, true, false, &mut moves),
            PieceKind::Rook => self.sliding_moves(board, from, false, true, &mut moves),
            PieceKind::Queen => self.sliding_moves(board, from, true, true, &mut moves),
        }
        moves
    }

    /// Empty or held by the other team.
    #[inline]
    fn can_land_on(&self, board: &Board, to: Position) -> bool {
        to.in_range() && board.get_piece(to).map_or(true, |occupant| occupant.team != self.team)
    }

    fn leaper_moves(&self, board: &Board, from: Position, targets: u64, moves: &mut Vec<Move>) {
        let mut results = targets;
        while results != 0 {
            let to = Position::from_index(results.trailing_zeros() as u8);
            if self.can_land_on(board, to) {
                moves.push(Move::new(from, to, None));
            }
            results &= results - 1; // Clear the least significant bit
        }
    }

    fn pawn_moves(&self, board: &Board, from: Position, moves: &mut Vec<Move>) {
        let direction = self.team.pawn_direction();

        // 1. Single push, then double push from the starting row through an empty square
        let one = from.offset(direction, 0);
        if one.in_range() && board.get_piece(one).is_none() {
            self.add_pawn_move(from, one, moves);
            if from.row() == self.team.pawn_start_row() {
                let two = from.offset(2 * direction, 0);
                if two.in_range() && board.get_piece(two).is_none() {
                    moves.push(Move::new(from, two, None));
                }
            }
        }

        // 2. Diagonal captures (no en passant)
        for dc in [-1, 1] {
            let target = from.offset(direction, dc);
            if !target.in_range() { continue; }
            if board.get_piece(target).map_or(false, |occupant| occupant.team != self.team) {
                self.add_pawn_move(from, target, moves);
            }
        }
    }

    /// A pawn arriving on the far rank becomes one move per promotion kind.
    fn add_pawn_move(&self, from: Position, to: Position, moves: &mut Vec<Move>) {
        if to.row() == self.team.promotion_row() {
            for kind in PROMOTION_KINDS {
                moves.push(Move::new(from, to, Some(kind)));
            }
        } else {
            moves.push(Move::new(from, to, None));
        }
    }

    fn sliding_moves(&self, board: &Board, from: Position, diagonals: bool, orthogonals: bool, moves: &mut Vec<Move>) {
        for &(dr, dc, is_diagonal) in DIRECTIONS {
            if !((diagonals && is_diagonal) || (orthogonals && !is_diagonal)) { continue; }
            let mut current = from;
            loop {
                current = current.offset(dr, dc);
                if !current.in_range() { break; } // Off board

                match board.get_piece(current) {
                    None => moves.push(Move::new(from, current, None)),
                    Some(occupant) => {
                        if occupant.team != self.team {
                            moves.push(Move::new(from, current, None)); // Capture ends the ray
                        }
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pos(s: &str) -> Position {
        Position::from_algebraic(s).unwrap()
    }

    fn destinations(moves: &[Move]) -> HashSet<Position> {
        moves.iter().map(|m| m.end()).collect()
    }

    fn squares(names: &[&str]) -> HashSet<Position> {
        names.iter().map(|name| pos(name)).collect()
    }

    fn board_with(pieces: &[(&str, Piece)]) -> Board {
        let mut board = Board::new();
        for (square, piece) in pieces {
            board.add_piece(pos(square), Some(*piece));
        }
        board
    }

    #[test]
    fn knight_in_corner_has_two_targets() {
        let knight = Piece::new(Team::White, PieceKind::Knight);
        let board = board_with(&[("a1", knight)]);
        let moves = knight.piece_moves(&board, pos("a1"));
        assert_eq!(destinations(&moves), squares(&["b3", "c2"]));
    }

    #[test]
    fn knight_cannot_land_on_own_piece_but_can_capture() {
        let knight = Piece::new(Team::White, PieceKind::Knight);
        let board = board_with(&[
            ("d4", knight),
            ("e6", Piece::new(Team::White, PieceKind::Pawn)),
            ("c6", Piece::new(Team::Black, PieceKind::Pawn)),
        ]);
        let targets = destinations(&knight.piece_moves(&board, pos("d4")));
        assert_eq!(targets.len(), 7);
        assert!(!targets.contains(&pos("e6")));
        assert!(targets.contains(&pos("c6")));
    }

    #[test]
    fn king_in_center_reaches_all_neighbours() {
        let king = Piece::new(Team::Black, PieceKind::King);
        let board = board_with(&[("e5", king)]);
        assert_eq!(king.piece_moves(&board, pos("e5")).len(), 8);
        let corner = board_with(&[("h8", king)]);
        assert_eq!(king.piece_moves(&corner, pos("h8")).len(), 3);
    }

    #[test]
    fn rook_ray_stops_at_blockers() {
        let rook = Piece::new(Team::White, PieceKind::Rook);
        let board = board_with(&[
            ("d4", rook),
            ("d6", Piece::new(Team::Black, PieceKind::Knight)),
            ("f4", Piece::new(Team::White, PieceKind::Pawn)),
        ]);
        let targets = destinations(&rook.piece_moves(&board, pos("d4")));
        assert!(targets.contains(&pos("d5")));
        assert!(targets.contains(&pos("d6"))); // capture
        assert!(!targets.contains(&pos("d7")));
        assert!(targets.contains(&pos("e4")));
        assert!(!targets.contains(&pos("f4")));
        // Down to d1 (3), left to a4 (3), up 2, right 1
        assert_eq!(targets.len(), 9);
    }

    #[test]
    fn bishop_and_queen_directions() {
        let bishop = Piece::new(Team::White, PieceKind::Bishop);
        let queen = Piece::new(Team::White, PieceKind::Queen);
        let empty = Board::new();
        assert_eq!(bishop.piece_moves(&empty, pos("d4")).len(), 13);
        assert_eq!(queen.piece_moves(&empty, pos("d4")).len(), 27);
        assert_eq!(queen.piece_moves(&empty, pos("a1")).len(), 21);
    }

    #[test]
    fn pawn_single_and_double_push_from_start() {
        let pawn = Piece::new(Team::White, PieceKind::Pawn);
        let board = board_with(&[("e2", pawn)]);
        assert_eq!(
            destinations(&pawn.piece_moves(&board, pos("e2"))),
            squares(&["e3", "e4"])
        );

        let black = Piece::new(Team::Black, PieceKind::Pawn);
        let board = board_with(&[("c7", black)]);
        assert_eq!(
            destinations(&black.piece_moves(&board, pos("c7"))),
            squares(&["c6", "c5"])
        );
    }

    #[test]
    fn pawn_double_push_needs_both_squares_empty() {
        let pawn = Piece::new(Team::White, PieceKind::Pawn);
        let blocked_near = board_with(&[("e2", pawn), ("e3", Piece::new(Team::Black, PieceKind::Rook))]);
        assert!(pawn.piece_moves(&blocked_near, pos("e2")).is_empty());

        let blocked_far = board_with(&[("e2", pawn), ("e4", Piece::new(Team::Black, PieceKind::Rook))]);
        assert_eq!(destinations(&pawn.piece_moves(&blocked_far, pos("e2"))), squares(&["e3"]));
    }

    #[test]
    fn pawn_captures_only_diagonally_onto_opponents() {
        let pawn = Piece::new(Team::White, PieceKind::Pawn);
        let board = board_with(&[
            ("d4", pawn),
            ("c5", Piece::new(Team::Black, PieceKind::Knight)),
            ("e5", Piece::new(Team::White, PieceKind::Knight)),
            ("d5", Piece::new(Team::Black, PieceKind::Pawn)),
        ]);
        assert_eq!(destinations(&pawn.piece_moves(&board, pos("d4"))), squares(&["c5"]));
    }

    #[test]
    fn promotion_emits_one_move_per_kind() {
        let pawn = Piece::new(Team::White, PieceKind::Pawn);
        let board = board_with(&[("b7", pawn)]);
        let moves = pawn.piece_moves(&board, pos("b7"));
        assert_eq!(moves.len(), 4);
        let kinds: HashSet<_> = moves.iter().map(|m| m.promotion()).collect();
        let expected: HashSet<_> = PROMOTION_KINDS.iter().map(|k| Some(*k)).collect();
        assert_eq!(kinds, expected);

        let capture = board_with(&[("b7", pawn), ("a8", Piece::new(Team::Black, PieceKind::Rook))]);
        assert_eq!(pawn.piece_moves(&capture, pos("b7")).len(), 8);
    }

    #[test]
    fn black_pawn_promotes_on_row_one() {
        let pawn = Piece::new(Team::Black, PieceKind::Pawn);
        let board = board_with(&[("h2", pawn)]);
        let moves = pawn.piece_moves(&board, pos("h2"));
        assert_eq!(moves.len(), 4);
        assert!(moves.iter().all(|m| m.end() == pos("h1") && m.promotion().is_some()));
    }

    #[test]
    fn letters_round_trip_through_display() {
        for c in "KQRBNPkqrbnp".chars() {
            assert_eq!(Piece::from_char(c).unwrap().to_string(), c.to_string());
        }
        assert_eq!(Piece::from_char('x'), None);
        assert_eq!(PieceKind::promotion_from_char('K'), None);
        assert_eq!(PieceKind::promotion_from_char('N'), Some(PieceKind::Knight));
    }

    #[test]
    fn off_board_origin_yields_nothing() {
        let queen = Piece::new(Team::White, PieceKind::Queen);
        assert!(queen.piece_moves(&Board::new(), Position::new(0, 0)).is_empty());
    }
}
