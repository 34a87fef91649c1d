use serde::{Deserialize, Serialize};
use shared::domain::{Color, MoveRecord, Piece, PieceKind, Square, BOARD_SIZE};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RuleViolation {
    #[error("no piece on {from}")]
    NoPieceAtSource { from: Square },
    #[error("it is not {color}'s turn")]
    NotYourTurn { color: Color },
    #[error("{to} already holds a piece of the moving side")]
    OwnPieceAtTarget { to: Square },
    #[error("piece on {from} cannot reach {to}")]
    IllegalPattern { from: Square, to: Square },
    #[error("path from {from} to {to} is obstructed")]
    PathBlocked { from: Square, to: Square },
}

/// Logical 6x6 game state: grid, turn tracker and append-only move history.
/// The sole mutation path is [`BoardState::apply`]; everything else is a
/// read-only view. No sensor or transport knowledge lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    cells: [[Option<Piece>; BOARD_SIZE]; BOARD_SIZE],
    turn: Color,
    history: Vec<MoveRecord>,
}

impl Default for BoardState {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardState {
    /// Initial layout: black on rows 0-1 (rank 6 side), white on rows 4-5.
    pub fn new() -> Self {
        use PieceKind::{Bishop, King, Pawn, Queen, Rook};

        let back_rank = [Rook, Bishop, Queen, King, Bishop, Rook];
        let mut cells: [[Option<Piece>; BOARD_SIZE]; BOARD_SIZE] = Default::default();
        for file in 0..BOARD_SIZE {
            cells[0][file] = Some(Piece::new(back_rank[file], Color::Black));
            cells[1][file] = Some(Piece::new(Pawn, Color::Black));
            cells[4][file] = Some(Piece::new(Pawn, Color::White));
            cells[5][file] = Some(Piece::new(back_rank[file], Color::White));
        }

        Self {
            cells,
            turn: Color::White,
            history: Vec::new(),
        }
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.cells[square.rank()][square.file()]
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    pub fn last_move(&self) -> Option<MoveRecord> {
        self.history.last().copied()
    }

    /// Presence-only projection of the grid, in the same orientation the
    /// snapshot codec produces. Used as the reconciliation baseline.
    pub fn occupancy(&self) -> [[bool; BOARD_SIZE]; BOARD_SIZE] {
        let mut grid = [[false; BOARD_SIZE]; BOARD_SIZE];
        for (rank, row) in self.cells.iter().enumerate() {
            for (file, cell) in row.iter().enumerate() {
                grid[rank][file] = cell.is_some();
            }
        }
        grid
    }

    /// Validates and commits a move. Fails closed: on any rule violation the
    /// grid, turn and history are left untouched. A successful commit flips
    /// the turn, which is also why replaying the same call cannot apply
    /// twice: the source square is empty the second time.
    pub fn apply(&mut self, from: Square, to: Square) -> Result<MoveRecord, RuleViolation> {
        let piece = self
            .piece_at(from)
            .ok_or(RuleViolation::NoPieceAtSource { from })?;
        if piece.color != self.turn {
            return Err(RuleViolation::NotYourTurn { color: piece.color });
        }

        let target = self.piece_at(to);
        if target.is_some_and(|t| t.color == piece.color) {
            return Err(RuleViolation::OwnPieceAtTarget { to });
        }

        if !pattern_allows(piece, from, to, target.is_some()) {
            return Err(RuleViolation::IllegalPattern { from, to });
        }

        if needs_clear_path(piece.kind) && !self.is_path_clear(from, to) {
            return Err(RuleViolation::PathBlocked { from, to });
        }

        self.cells[to.rank()][to.file()] = Some(piece);
        self.cells[from.rank()][from.file()] = None;
        self.turn = self.turn.opponent();

        let record = MoveRecord {
            from,
            to,
            piece,
            captured: target,
        };
        self.history.push(record);
        Ok(record)
    }

    /// Walks the unit step vector between the exclusive endpoints; false on
    /// the first occupied square. Callers guarantee the squares are aligned
    /// on a rank, file or diagonal.
    pub fn is_path_clear(&self, from: Square, to: Square) -> bool {
        let step_rank = (to.rank() as i8 - from.rank() as i8).signum();
        let step_file = (to.file() as i8 - from.file() as i8).signum();

        let mut rank = from.rank() as i8 + step_rank;
        let mut file = from.file() as i8 + step_file;
        while (rank, file) != (to.rank() as i8, to.file() as i8) {
            if self.cells[rank as usize][file as usize].is_some() {
                return false;
            }
            rank += step_rank;
            file += step_file;
        }
        true
    }
}

fn needs_clear_path(kind: PieceKind) -> bool {
    matches!(kind, PieceKind::Rook | PieceKind::Bishop | PieceKind::Queen)
}

/// Movement geometry only; occupancy along the path is checked separately.
/// `capturing` is true when the destination holds an opposing piece.
fn pattern_allows(piece: Piece, from: Square, to: Square, capturing: bool) -> bool {
    let d_rank = to.rank() as i8 - from.rank() as i8;
    let d_file = to.file() as i8 - from.file() as i8;

    match piece.kind {
        PieceKind::Pawn => {
            // White sits on the high-index rows and advances toward row 0.
            let forward = match piece.color {
                Color::White => -1,
                Color::Black => 1,
            };
            if d_rank != forward {
                return false;
            }
            (d_file == 0 && !capturing) || (d_file.abs() == 1 && capturing)
        }
        PieceKind::Rook => (d_rank == 0) != (d_file == 0),
        PieceKind::Bishop => d_rank != 0 && d_rank.abs() == d_file.abs(),
        PieceKind::Queen => {
            let straight = (d_rank == 0) != (d_file == 0);
            let diagonal = d_rank != 0 && d_rank.abs() == d_file.abs();
            straight || diagonal
        }
        PieceKind::King => d_rank.abs().max(d_file.abs()) == 1,
    }
}
