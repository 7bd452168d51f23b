// src/game.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::board::Board;
use crate::error::{IllegalReason, MoveError};
use crate::moves::Move;
use crate::piece::{Piece, PieceKind, Team};
use crate::position::Position;

// --- Game Result Enums ---

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
pub enum WinReason { Checkmate, Resignation }

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
pub enum DrawReason { Stalemate }

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
pub enum GameResult {
    Win(Team, WinReason),
    Draw(DrawReason),
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::Win(team, reason) => write!(f, "{} wins by {:?}", team, reason),
            GameResult::Draw(reason) => write!(f, "Draw by {:?}", reason),
        }
    }
}

/// Who won, as reported to clients.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Winner { White, Black, Draw, None }

impl From<Team> for Winner {
    fn from(team: Team) -> Self {
        match team { Team::White => Winner::White, Team::Black => Winner::Black }
    }
}

// --- Pure Rule Helpers ---

/// Moves the piece on `mv.start` to `mv.end`, replacing it with the promotion
/// kind when one is given. Performs no validation.
fn play_unchecked(board: &mut Board, mv: &Move) {
    let Some(piece) = board.get_piece(mv.start()) else { return };
    let landing = match (piece.kind, mv.promotion()) {
        (PieceKind::Pawn, Some(kind)) if mv.end().row() == piece.team.promotion_row() => Piece::new(piece.team, kind),
        _ => piece,
    };
    board.add_piece(mv.end(), Some(landing));
    board.add_piece(mv.start(), None);
}

/// True if any piece of the other team can reach `team`'s king.
/// A board without that king is never in check.
pub fn is_team_in_check(board: &Board, team: Team) -> bool {
    let Some(king) = board.find_king(team) else {
        debug!(%team, "no king on the board, treating as not in check");
        return false;
    };
    board
        .pieces()
        .filter(|(_, piece)| piece.team != team)
        .any(|(from, piece)| piece.piece_moves(board, from).iter().any(|m| m.end() == king))
}

/// Plays `mv` on a private copy of `board` and reports whether `team` ends up in check.
/// The caller's board is never touched.
pub fn would_leave_in_check(board: &Board, mv: &Move, team: Team) -> bool {
    let mut simulated = board.clone();
    play_unchecked(&mut simulated, mv);
    is_team_in_check(&simulated, team)
}

// --- Game State ---

/// A board plus whose turn it is and whether play has ended.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Game {
    board: Board,
    team_to_move: Team,
    game_over: bool,
    resigned: Option<Team>,
}

impl Default for Game {
    fn default() -> Self { Game::new() }
}

impl Game {
    /// Standard starting layout, White to move.
    pub fn new() -> Self {
        Game::from_board(Board::standard(), Team::White)
    }

    /// Starts from an arbitrary layout. Useful for composed positions.
    pub fn from_board(board: Board, team_to_move: Team) -> Self {
        Game { board, team_to_move, game_over: false, resigned: None }
    }

    pub fn board(&self) -> &Board { &self.board }
    pub fn team_to_move(&self) -> Team { self.team_to_move }
    pub fn resigned(&self) -> Option<Team> { self.resigned }

    /// Marks the game finished. There is no way back.
    pub fn set_game_over(&mut self) { self.game_over = true; }

    pub fn resign(&mut self, team: Team) -> GameResult {
        self.resigned = Some(team);
        self.game_over = true;
        GameResult::Win(team.opponent(), WinReason::Resignation)
    }

    pub fn king_position(&self, team: Team) -> Result<Position, MoveError> {
        self.board.find_king(team).ok_or(MoveError::NoKingPresent(team))
    }

    /// Legal moves for the piece on `position`: its pseudo-legal moves minus those
    /// that would leave its own king in check. Empty when there is no piece.
    pub fn valid_moves(&self, position: Position) -> Vec<Move> {
        let Some(piece) = self.board.get_piece(position) else { return Vec::new() };
        piece
            .piece_moves(&self.board, position)
            .into_iter()
            .filter(|mv| !would_leave_in_check(&self.board, mv, piece.team))
            .collect()
    }

    /// Validates `mv` fully, then plays it and passes the turn.
    /// On error the game is left exactly as it was.
    pub fn apply_move(&mut self, mv: &Move) -> Result<(), MoveError> {
        // --- Validation ---
        for square in [mv.start(), mv.end()] {
            if !square.in_range() { return Err(MoveError::InvalidPosition(square)); }
        }
        if self.game_over {
            return Err(MoveError::illegal(mv, IllegalReason::GameOver));
        }
        let piece = self.board.get_piece(mv.start())
            .ok_or_else(|| MoveError::illegal(mv, IllegalReason::NoPiece))?;
        if piece.team != self.team_to_move {
            return Err(MoveError::illegal(mv, IllegalReason::NotPlayersTurn(self.team_to_move)));
        }

        let legal = self.valid_moves(mv.start());
        if !legal.contains(mv) {
            let same_squares = |m: &Move| m.start() == mv.start() && m.end() == mv.end();
            let reason = if mv.promotion().is_none() && legal.iter().any(|m| same_squares(m)) {
                IllegalReason::MissingPromotion
            } else if piece.piece_moves(&self.board, mv.start()).iter().any(|m| m == mv || (same_squares(m) && mv.promotion().is_none())) {
                IllegalReason::LeavesKingInCheck
            } else {
                IllegalReason::InvalidPieceMovement
            };
            return Err(MoveError::illegal(mv, reason));
        }

        // --- Mutation ---
        play_unchecked(&mut self.board, mv);
        self.team_to_move = self.team_to_move.opponent();
        debug!(%mv, next = %self.team_to_move, "move applied");
        Ok(())
    }

    pub fn is_in_check(&self, team: Team) -> bool {
        is_team_in_check(&self.board, team)
    }

    pub fn has_any_legal_move(&self, team: Team) -> bool {
        self.board
            .pieces()
            .filter(|(_, piece)| piece.team == team)
            .any(|(position, _)| !self.valid_moves(position).is_empty())
    }

    pub fn is_in_checkmate(&self, team: Team) -> bool {
        self.is_in_check(team) && !self.has_any_legal_move(team)
    }

    pub fn is_in_stalemate(&self, team: Team) -> bool {
        !self.is_in_check(team) && !self.has_any_legal_move(team)
    }

    /// Over once finished by resignation, or when either team is mated or stalemated.
    pub fn is_game_over(&self) -> bool {
        self.game_over
            || Team::ALL.iter().any(|&team| self.is_in_checkmate(team) || self.is_in_stalemate(team))
    }

    pub fn outcome(&self) -> Option<GameResult> {
        if let Some(team) = self.resigned {
            return Some(GameResult::Win(team.opponent(), WinReason::Resignation));
        }
        for team in Team::ALL {
            if self.is_in_checkmate(team) {
                return Some(GameResult::Win(team.opponent(), WinReason::Checkmate));
            }
        }
        if Team::ALL.iter().any(|&team| self.is_in_stalemate(team)) {
            return Some(GameResult::Draw(DrawReason::Stalemate));
        }
        None
    }

    pub fn winner(&self) -> Winner {
        match self.outcome() {
            Some(GameResult::Win(team, _)) => Winner::from(team),
            Some(GameResult::Draw(_)) => Winner::Draw,
            None => Winner::None,
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.board)?;
        match self.outcome() {
            Some(result) => write!(f, "Game over: {}", result),
            None if self.game_over => write!(f, "Game over"),
            None => {
                write!(f, "Turn: {}", self.team_to_move)?;
                if self.is_in_check(self.team_to_move) { write!(f, " (in check)")?; }
                Ok(())
            }
        }
    }
}
