use anyhow::Result;
use log::{trace, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use wormgrid_common::{Cell, Coord, SimParams, Snapshot};

/// Fixed-size occupancy grid. Every count is the number of worm segments
/// registered at that cell, plus whatever the template seeded there.
#[derive(Debug, Clone)]
pub struct Grid {
    cells_wide: usize,
    cells_high: usize,
    capacity: u8,
    cells: Vec<Cell>, // Row-major
}

/// Outcome of seeding a grid from a template.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub disabled: usize,
    pub seeded: usize,
    pub unknown_chars: usize,
    pub truncated: bool,
}

impl Grid {
    /// Creates an empty grid. `capacity` is K, the count at which a cell stops accepting segments.
    pub fn new(cells_wide: usize, cells_high: usize, capacity: u8) -> Result<Self> {
        if cells_wide == 0 || cells_high == 0 {
            anyhow::bail!("Grid dimensions must be positive (got {}x{}).", cells_wide, cells_high);
        }
        if capacity == 0 {
            anyhow::bail!("Grid capacity must be greater than 0.");
        }
        let num_cells = cells_wide
            .checked_mul(cells_high)
            .ok_or_else(|| anyhow::anyhow!("Grid {}x{} is too large.", cells_wide, cells_high))?;

        Ok(Self {
            cells_wide,
            cells_high,
            capacity,
            cells: vec![Cell::EMPTY; num_cells],
        })
    }

    pub fn from_params(params: &SimParams) -> Result<Self> {
        Self::new(params.cells_wide, params.cells_high, params.capacity)
    }

    pub fn cells_wide(&self) -> usize {
        self.cells_wide
    }

    pub fn cells_high(&self) -> usize {
        self.cells_high
    }

    pub fn capacity(&self) -> u8 {
        self.capacity
    }

    #[inline(always)]
    fn index(&self, coord: Coord) -> Option<usize> {
        if coord.x < self.cells_wide && coord.y < self.cells_high {
            Some(coord.y * self.cells_wide + coord.x)
        } else {
            None
        }
    }

    pub fn in_bounds(&self, coord: Coord) -> bool {
        self.index(coord).is_some()
    }

    pub fn cell(&self, coord: Coord) -> Option<Cell> {
        self.index(coord).map(|i| self.cells[i])
    }

    /// Offsets `coord`, returning `None` when the result leaves the grid.
    pub fn neighbor(&self, coord: Coord, dx: isize, dy: isize) -> Option<Coord> {
        coord.offset(dx, dy).filter(|&c| self.in_bounds(c))
    }

    /// In bounds, not disabled, and below capacity.
    pub fn is_enterable(&self, coord: Coord) -> bool {
        matches!(self.cell(coord), Some(Cell::Occupied(n)) if n < self.capacity)
    }

    /// Claims one unit of occupancy at `coord`. Leaves the grid untouched and
    /// returns false when the cell cannot be entered.
    pub fn try_enter(&mut self, coord: Coord) -> bool {
        if !self.is_enterable(coord) {
            trace!("Entry refused at {}: {:?}", coord, self.cell(coord));
            return false;
        }
        let Some(idx) = self.index(coord) else { return false };
        if let Cell::Occupied(n) = &mut self.cells[idx] {
            debug_assert!(*n < self.capacity, "claimed a full cell at {}", coord);
            *n += 1;
        }
        true
    }

    /// Releases one unit of occupancy at `coord`. A disabled cell stays disabled.
    pub fn leave(&mut self, coord: Coord) {
        let Some(idx) = self.index(coord) else {
            warn!("Leave requested for out-of-bounds cell {}.", coord);
            return;
        };
        match &mut self.cells[idx] {
            Cell::Occupied(n) if *n >= 1 => *n -= 1,
            Cell::Occupied(_) => warn!("Leave requested for empty cell {}. Ignoring.", coord),
            Cell::Disabled => {}
        }
    }

    /// Pre-seeds the grid from rows of template characters:
    /// `.` leaves a cell untouched, a space disables it, a digit sets its count.
    /// Rows and columns beyond the grid are dropped.
    pub fn seed_from_template<S: AsRef<str>>(&mut self, rows: &[S]) -> SeedSummary {
        let mut summary = SeedSummary::default();
        if rows.len() > self.cells_high {
            summary.truncated = true;
        }

        for (y, row) in rows.iter().take(self.cells_high).enumerate() {
            for (x, ch) in row.as_ref().chars().enumerate() {
                if x >= self.cells_wide {
                    summary.truncated = true;
                    break;
                }
                let idx = y * self.cells_wide + x;
                match ch {
                    '.' => {}
                    ' ' => {
                        self.cells[idx] = Cell::Disabled;
                        summary.disabled += 1;
                    }
                    '0'..='9' => {
                        // Digit chars always map to 0..=9
                        self.cells[idx] = Cell::Occupied(ch as u8 - b'0');
                        summary.seeded += 1;
                    }
                    _ => summary.unknown_chars += 1,
                }
            }
        }
        summary
    }

    /// Every cell a new segment could be placed in.
    pub fn enterable_cells(&self) -> Vec<Coord> {
        (0..self.cells_high)
            .flat_map(|y| (0..self.cells_wide).map(move |x| Coord::new(x, y)))
            .filter(|&c| self.is_enterable(c))
            .collect()
    }

    pub fn snapshot(&self, frame: u64) -> Snapshot {
        Snapshot {
            frame,
            cells_wide: self.cells_wide,
            cells_high: self.cells_high,
            tiers: self.capacity,
            cells: self.cells.clone(),
        }
    }
}

/// The grid behind the single exclusion lock shared by every worm actor and the renderer.
#[derive(Debug, Clone)]
pub struct SharedGrid {
    inner: Arc<Mutex<Grid>>,
}

impl SharedGrid {
    pub fn new(grid: Grid) -> Self {
        Self { inner: Arc::new(Mutex::new(grid)) }
    }

    /// Acquires the grid lock. Fails if an actor panicked while holding it.
    pub fn lock(&self) -> Result<MutexGuard<'_, Grid>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("Grid lock poisoned by a panicked worm actor."))
    }

    /// Copies the whole grid in one critical section.
    pub fn snapshot(&self, frame: u64) -> Result<Snapshot> {
        Ok(self.lock()?.snapshot(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_dimensions() {
        assert!(Grid::new(0, 5, 4).is_err());
        assert!(Grid::new(5, 0, 4).is_err());
        assert!(Grid::new(5, 5, 0).is_err());
        let grid = Grid::new(4, 3, 4).unwrap();
        assert_eq!(grid.enterable_cells().len(), 12);
    }

    #[test]
    fn test_try_enter_respects_capacity() {
        let mut grid = Grid::new(2, 2, 4).unwrap();
        let c = Coord::new(1, 1);
        for expected in 1..=4 {
            assert!(grid.try_enter(c));
            assert_eq!(grid.cell(c), Some(Cell::Occupied(expected)));
        }
        assert!(!grid.is_enterable(c));
        assert!(!grid.try_enter(c));
        assert_eq!(grid.cell(c), Some(Cell::Occupied(4)));

        assert!(!grid.try_enter(Coord::new(2, 0)));
        assert!(!grid.try_enter(Coord::new(0, 2)));
    }

    #[test]
    fn test_leave_decrements_and_keeps_disabled() {
        let mut grid = Grid::new(3, 1, 4).unwrap();
        grid.seed_from_template(&[". 2"]);

        grid.leave(Coord::new(2, 0));
        assert_eq!(grid.cell(Coord::new(2, 0)), Some(Cell::Occupied(1)));

        grid.leave(Coord::new(1, 0));
        assert_eq!(grid.cell(Coord::new(1, 0)), Some(Cell::Disabled));

        // Never goes negative
        grid.leave(Coord::new(0, 0));
        assert_eq!(grid.cell(Coord::new(0, 0)), Some(Cell::Occupied(0)));

        // Out of bounds is ignored
        grid.leave(Coord::new(9, 9));
    }

    #[test]
    fn test_template_all_dots_leaves_defaults() {
        let mut grid = Grid::new(4, 2, 4).unwrap();
        let summary = grid.seed_from_template(&["....", "...."]);
        assert_eq!(summary, SeedSummary::default());
        assert!(grid.snapshot(0).cells.iter().all(|&c| c == Cell::Occupied(0)));
    }

    #[test]
    fn test_template_digits_and_spaces() {
        let mut grid = Grid::new(3, 3, 4).unwrap();
        let summary = grid.seed_from_template(&["333", "   "]);
        assert_eq!(summary.seeded, 3);
        assert_eq!(summary.disabled, 3);
        for x in 0..3 {
            assert_eq!(grid.cell(Coord::new(x, 0)), Some(Cell::Occupied(3)));
            assert_eq!(grid.cell(Coord::new(x, 1)), Some(Cell::Disabled));
            assert_eq!(grid.cell(Coord::new(x, 2)), Some(Cell::Occupied(0)));
        }

        // Disabled cells never accept entry
        for _ in 0..10 {
            for x in 0..3 {
                assert!(!grid.try_enter(Coord::new(x, 1)));
            }
        }
        assert!(grid.snapshot(0).cells[3..6].iter().all(|c| c.is_disabled()));

        // Seeded 3 leaves room for exactly one segment at K = 4
        assert!(grid.try_enter(Coord::new(0, 0)));
        assert!(!grid.try_enter(Coord::new(0, 0)));
    }

    #[test]
    fn test_template_truncates_to_grid() {
        let mut grid = Grid::new(2, 2, 4).unwrap();
        let summary = grid.seed_from_template(&["1111", "2", "333"]);
        assert!(summary.truncated);
        assert_eq!(summary.seeded, 3);
        assert_eq!(grid.cell(Coord::new(1, 0)), Some(Cell::Occupied(1)));
        assert_eq!(grid.cell(Coord::new(0, 1)), Some(Cell::Occupied(2)));
        assert_eq!(grid.cell(Coord::new(1, 1)), Some(Cell::Occupied(0)));
    }

    #[test]
    fn test_template_unknown_chars_are_ignored() {
        let mut grid = Grid::new(3, 1, 4).unwrap();
        let summary = grid.seed_from_template(&["x#1"]);
        assert_eq!(summary.unknown_chars, 2);
        assert_eq!(grid.cell(Coord::new(0, 0)), Some(Cell::Occupied(0)));
        assert_eq!(grid.cell(Coord::new(2, 0)), Some(Cell::Occupied(1)));
    }

    #[test]
    fn test_neighbor_stays_in_bounds() {
        let grid = Grid::new(3, 3, 4).unwrap();
        let corner = Coord::new(2, 2);
        assert_eq!(grid.neighbor(corner, 1, 0), None);
        assert_eq!(grid.neighbor(corner, 0, 1), None);
        assert_eq!(grid.neighbor(corner, -1, 0), Some(Coord::new(1, 2)));
        assert_eq!(grid.neighbor(Coord::new(0, 0), 0, -1), None);
    }

    #[test]
    fn test_shared_snapshot_is_a_copy() {
        let shared = SharedGrid::new(Grid::new(2, 2, 4).unwrap());
        let before = shared.snapshot(1).unwrap();
        assert!(shared.lock().unwrap().try_enter(Coord::new(0, 0)));
        let after = shared.snapshot(2).unwrap();
        assert_eq!(before.total_occupancy(), 0);
        assert_eq!(after.total_occupancy(), 1);
        assert_eq!(after.frame, 2);
    }
}
