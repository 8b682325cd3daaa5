use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single grid cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    /// Enterable while the count stays below the grid capacity.
    Occupied(u8),
    /// Permanently excluded from occupancy. Only set at seed time.
    Disabled,
}

impl Cell {
    /// An empty, enterable cell.
    pub const EMPTY: Cell = Cell::Occupied(0);

    /// Returns the occupancy count, or `None` for a disabled cell.
    pub fn count(&self) -> Option<u8> {
        match *self {
            Cell::Occupied(n) => Some(n),
            Cell::Disabled => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Cell::Disabled)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::EMPTY
    }
}

/// Integer grid coordinate. `(0, 0)` is the top-left cell, `y` grows downwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

impl Coord {
    /// Creates a new Coord.
    pub fn new(x: usize, y: usize) -> Self {
        Coord { x, y }
    }

    /// Moves by a signed offset. Returns `None` if either axis would go negative.
    /// Upper bounds are the grid's concern.
    pub fn offset(&self, dx: isize, dy: isize) -> Option<Coord> {
        Some(Coord {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
