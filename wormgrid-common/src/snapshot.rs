use serde::{Serialize, Deserialize};
use crate::cell::{Cell, Coord};

/// A consistent copy of the grid taken under the grid lock, read by the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Frame counter of the render loop that requested the snapshot.
    pub frame: u64,
    pub cells_wide: usize,
    pub cells_high: usize,
    /// Number of display tiers (K). Also the per-cell capacity.
    pub tiers: u8,
    /// Row-major cell states, `cells[y * cells_wide + x]`.
    pub cells: Vec<Cell>,
}

impl Snapshot {
    pub fn cell(&self, coord: Coord) -> Option<Cell> {
        if coord.x >= self.cells_wide || coord.y >= self.cells_high {
            return None;
        }
        self.cells.get(coord.y * self.cells_wide + coord.x).copied()
    }

    /// Maps a cell onto a display tier in `0..tiers`.
    /// Tier 0 is the background (disabled or empty), counts at or over capacity use the top tier.
    pub fn tier(&self, coord: Coord) -> u8 {
        match self.cell(coord) {
            Some(Cell::Occupied(n)) => n.min(self.tiers.saturating_sub(1)),
            Some(Cell::Disabled) | None => 0,
        }
    }

    /// Sum of all occupancy counts.
    pub fn total_occupancy(&self) -> u64 {
        self.cells.iter().filter_map(|c| c.count()).map(u64::from).sum()
    }

    pub fn disabled_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_disabled()).count()
    }

    /// Number of cells that cannot take another segment (disabled cells excluded).
    pub fn full_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| matches!(c, Cell::Occupied(n) if *n >= self.tiers))
            .count()
    }
}
