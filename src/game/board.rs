//! Board Geometry
//!
//! The 10x10 letter grid and the rules for which cells may be
//! selected together when spelling a word.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::BOARD_SIZE;

// =============================================================================
// CELL POSITION
// =============================================================================

/// A board coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellPos {
    /// Row index (0 = top)
    pub row: u8,
    /// Column index (0 = left)
    pub col: u8,
}

impl CellPos {
    /// Create a position.
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Is this position on the board?
    #[inline]
    pub fn in_bounds(self) -> bool {
        (self.row as usize) < BOARD_SIZE && (self.col as usize) < BOARD_SIZE
    }

    /// Orthogonal neighbour: Manhattan distance 1 along exactly one axis.
    pub fn is_adjacent(self, other: CellPos) -> bool {
        let dr = self.row.abs_diff(other.row);
        let dc = self.col.abs_diff(other.col);
        (dr == 1 && dc == 0) || (dr == 0 && dc == 1)
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.col)
    }
}

// =============================================================================
// BOARD
// =============================================================================

/// Fixed-size letter grid.
///
/// Cells are append-only during play: once a letter lands it is never
/// cleared or overwritten until the whole board is reset for a rematch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [[Option<char>; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Letter at a position, if any.
    pub fn get(&self, pos: CellPos) -> Option<char> {
        if !pos.in_bounds() {
            return None;
        }
        self.cells[pos.row as usize][pos.col as usize]
    }

    /// Is the cell on the board and still empty?
    pub fn is_empty_at(&self, pos: CellPos) -> bool {
        pos.in_bounds() && self.get(pos).is_none()
    }

    /// Is the cell on the board and filled?
    pub fn is_filled_at(&self, pos: CellPos) -> bool {
        self.get(pos).is_some()
    }

    /// Write a letter into an empty cell.
    ///
    /// Returns false (and leaves the board untouched) if the cell is off
    /// the board or already holds a letter.
    pub fn place(&mut self, pos: CellPos, letter: char) -> bool {
        if !self.is_empty_at(pos) {
            return false;
        }
        self.cells[pos.row as usize][pos.col as usize] = Some(letter);
        true
    }

    /// Concatenate letters along a path, in path order. Empty cells are skipped.
    pub fn read_word(&self, path: &[CellPos]) -> String {
        path.iter().filter_map(|pos| self.get(*pos)).collect()
    }

    /// Number of filled cells.
    pub fn filled_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }

    /// Iterate rows of the grid.
    pub fn rows(&self) -> impl Iterator<Item = &[Option<char>; BOARD_SIZE]> {
        self.cells.iter()
    }
}

// =============================================================================
// SELECTION RULES
// =============================================================================

/// Can `next` extend a claim path?
///
/// The path must stay a straight, orthogonally contiguous, non-repeating run:
/// - `next` is adjacent to the last selected cell
/// - once two or more cells are selected, `next` shares a row with the
///   first cell or shares a column with it
pub fn can_extend_path(path: &[CellPos], next: CellPos) -> bool {
    if path.contains(&next) {
        return false;
    }

    let (first, last) = match (path.first(), path.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return true,
    };

    if path.len() > 1 && first.row != next.row && first.col != next.col {
        return false;
    }

    last.is_adjacent(next)
}

/// Normalize a typed letter.
///
/// Accepts exactly one ASCII Latin letter (either case) and returns it
/// uppercased. Everything else is rejected.
pub fn normalize_letter(input: &str) -> Option<char> {
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase()),
        _ => None,
    }
}
