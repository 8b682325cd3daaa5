use crate::grid::Grid;
use anyhow::Result;
use log::{debug, trace};
use rand::prelude::*;
use rand::seq::IndexedRandom;
use std::collections::VecDeque;
use std::time::Duration;
use wormgrid_common::{Coord, SimParams};

/// Random probes for a free start cell before falling back to a full scan.
const PLACEMENT_ATTEMPTS: usize = 1000;

/// One of the four cardinal directions a worm travels in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Heading {
    Up,
    Down,
    Left,
    Right,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::Up, Heading::Down, Heading::Left, Heading::Right];

    /// Grid offset for one step. `Up` decreases `y`.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Heading::Up => (0, -1),
            Heading::Down => (0, 1),
            Heading::Left => (-1, 0),
            Heading::Right => (1, 0),
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Heading {
        Heading::ALL[rng.random_range(0..Heading::ALL.len())]
    }
}

/// What happened to a worm during one tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Moved one cell; `pruned` is set when the tail was dropped to respect the size cap.
    Advanced { pruned: bool },
    /// The claim on the target failed. The body was reversed instead of moving.
    RaceLost,
    /// No enterable neighbor from either end. The body was reversed and the worm stood still.
    DeadEnd,
}

/// A single worm: a capped body of segments (head at the front) and a heading.
#[derive(Debug, Clone)]
pub struct Worm {
    name: String,
    max_size: usize,
    speed: Duration,
    turn_chance: f64,
    heading: Heading,
    body: VecDeque<Coord>,
}

impl Worm {
    /// Places a new one-segment worm on a random non-full, non-disabled cell and claims it.
    pub fn spawn<R: Rng + ?Sized>(
        name: impl Into<String>,
        max_size: usize,
        speed: Duration,
        turn_chance: f64,
        grid: &mut Grid,
        rng: &mut R,
    ) -> Result<Self> {
        let name = name.into();
        if max_size == 0 {
            anyhow::bail!("Worm '{}' needs a size cap of at least 1.", name);
        }
        let start = pick_start_cell(grid, rng)
            .ok_or_else(|| anyhow::anyhow!("No enterable cell left to place worm '{}'.", name))?;
        if !grid.try_enter(start) {
            anyhow::bail!("Start cell {} for worm '{}' could not be claimed.", start, name);
        }
        debug!(
            "Spawned {} at {} (max_size {}, speed {} ms)",
            name, start, max_size, speed.as_millis()
        );

        Ok(Self {
            name,
            max_size,
            speed,
            turn_chance,
            heading: Heading::random(rng),
            body: VecDeque::from([start]),
        })
    }

    /// Draws size and speed from the configured ranges (or fixed overrides) and spawns.
    pub fn spawn_with_params<R: Rng + ?Sized>(
        name: impl Into<String>,
        params: &SimParams,
        grid: &mut Grid,
        rng: &mut R,
    ) -> Result<Self> {
        let max_size = params
            .fixed_size
            .unwrap_or_else(|| rng.random_range(params.size_range.0..=params.size_range.1));
        let speed_ms = params
            .fixed_speed_ms
            .unwrap_or_else(|| rng.random_range(params.speed_range_ms.0..=params.speed_range_ms.1));
        Self::spawn(name, max_size, Duration::from_millis(speed_ms), params.turn_chance, grid, rng)
    }

    /// Builds a worm from an existing body without touching the grid.
    /// The caller is responsible for the body's cells already being claimed.
    pub fn from_body(
        name: impl Into<String>,
        max_size: usize,
        speed: Duration,
        turn_chance: f64,
        heading: Heading,
        body: impl IntoIterator<Item = Coord>,
    ) -> Self {
        Self {
            name: name.into(),
            max_size,
            speed,
            turn_chance,
            heading,
            body: body.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Tick interval.
    pub fn speed(&self) -> Duration {
        self.speed
    }

    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub fn head(&self) -> Option<Coord> {
        self.body.front().copied()
    }

    pub fn body(&self) -> &VecDeque<Coord> {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// With probability `turn_chance`, picks a fresh random heading regardless of feasibility.
    /// Needs no grid access, so actors call it outside the lock.
    pub fn maybe_turn<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.turn_chance > 0.0 && rng.random_bool(self.turn_chance) {
            self.heading = Heading::random(rng);
            return true;
        }
        false
    }

    /// One full tick: random turn, then the grid step.
    pub fn tick<R: Rng + ?Sized>(&mut self, grid: &mut Grid, rng: &mut R) -> TickOutcome {
        self.maybe_turn(rng);
        self.advance(grid, rng)
    }

    /// The inspect-then-claim part of a tick. Must run as one critical section on the grid.
    pub fn advance<R: Rng + ?Sized>(&mut self, grid: &mut Grid, rng: &mut R) -> TickOutcome {
        let Some(head) = self.head() else {
            return TickOutcome::DeadEnd;
        };

        let (dx, dy) = self.heading.delta();
        let straight = grid.neighbor(head, dx, dy).filter(|&c| grid.is_enterable(c));

        let target = match straight {
            Some(target) => target,
            None => match self.find_way_out(grid, rng) {
                Some(target) => target,
                None => {
                    // Stand still; try the other orientation next tick
                    self.heading = Heading::random(rng);
                    trace!("{} is boxed in at {}", self.name, head);
                    return TickOutcome::DeadEnd;
                }
            },
        };

        if !grid.try_enter(target) {
            self.body.make_contiguous().reverse();
            trace!("{} lost the claim on {}, reversing", self.name, target);
            return TickOutcome::RaceLost;
        }

        self.body.push_front(target);
        let mut pruned = false;
        while self.body.len() > self.max_size {
            if let Some(tail) = self.body.pop_back() {
                grid.leave(tail);
                pruned = true;
            }
        }
        TickOutcome::Advanced { pruned }
    }

    /// Heading fallback when the straight-ahead cell is blocked: try the head,
    /// then reverse the body once and try from the old tail.
    fn find_way_out<R: Rng + ?Sized>(&mut self, grid: &Grid, rng: &mut R) -> Option<Coord> {
        let found = self.pick_feasible_heading(grid, rng).or_else(|| {
            self.body.make_contiguous().reverse();
            self.pick_feasible_heading(grid, rng)
        });
        found.map(|(heading, target)| {
            self.heading = heading;
            target
        })
    }

    /// Uniformly picks one of the headings whose target from the head is enterable.
    pub fn pick_feasible_heading<R: Rng + ?Sized>(&self, grid: &Grid, rng: &mut R) -> Option<(Heading, Coord)> {
        let head = self.head()?;
        let feasible: Vec<(Heading, Coord)> = Heading::ALL
            .iter()
            .filter_map(|&h| {
                let (dx, dy) = h.delta();
                grid.neighbor(head, dx, dy)
                    .filter(|&c| grid.is_enterable(c))
                    .map(|c| (h, c))
            })
            .collect();
        feasible.choose(rng).copied()
    }
}

/// Random probing first, then a full scan when probing keeps hitting full or disabled cells.
fn pick_start_cell<R: Rng + ?Sized>(grid: &Grid, rng: &mut R) -> Option<Coord> {
    for _ in 0..PLACEMENT_ATTEMPTS {
        let candidate = Coord::new(
            rng.random_range(0..grid.cells_wide()),
            rng.random_range(0..grid.cells_high()),
        );
        if grid.is_enterable(candidate) {
            return Some(candidate);
        }
    }
    grid.enterable_cells().choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use wormgrid_common::Cell;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn placed_worm(grid: &mut Grid, max_size: usize, heading: Heading, body: &[Coord]) -> Worm {
        for &c in body {
            assert!(grid.try_enter(c));
        }
        Worm::from_body("test", max_size, Duration::from_millis(10), 0.0, heading, body.iter().copied())
    }

    #[test]
    fn test_forced_up_grows_body() {
        let mut grid = Grid::new(3, 3, 4).unwrap();
        let mut worm = placed_worm(&mut grid, 4, Heading::Up, &[Coord::new(1, 1)]);

        let outcome = worm.tick(&mut grid, &mut rng());
        assert_eq!(outcome, TickOutcome::Advanced { pruned: false });
        assert_eq!(worm.head(), Some(Coord::new(1, 0)));
        assert_eq!(worm.len(), 2);
        assert_eq!(grid.cell(Coord::new(1, 0)), Some(Cell::Occupied(1)));
        assert_eq!(grid.cell(Coord::new(1, 1)), Some(Cell::Occupied(1)));
    }

    #[test]
    fn test_forced_up_with_cap_one_releases_tail() {
        let mut grid = Grid::new(3, 3, 4).unwrap();
        let mut worm = placed_worm(&mut grid, 1, Heading::Up, &[Coord::new(1, 1)]);

        let outcome = worm.tick(&mut grid, &mut rng());
        assert_eq!(outcome, TickOutcome::Advanced { pruned: true });
        assert_eq!(worm.body().iter().copied().collect::<Vec<_>>(), vec![Coord::new(1, 0)]);
        assert_eq!(grid.cell(Coord::new(1, 0)), Some(Cell::Occupied(1)));
        assert_eq!(grid.cell(Coord::new(1, 1)), Some(Cell::Occupied(0)));
    }

    #[test]
    fn test_blocked_heading_falls_back_to_feasible_one() {
        // Only the cell to the right of (1, 1) is open
        let mut grid = Grid::new(3, 3, 4).unwrap();
        grid.seed_from_template(&[". .", " ..", ". ."]);
        let mut worm = placed_worm(&mut grid, 3, Heading::Up, &[Coord::new(1, 1)]);

        let outcome = worm.advance(&mut grid, &mut rng());
        assert_eq!(outcome, TickOutcome::Advanced { pruned: false });
        assert_eq!(worm.heading(), Heading::Right);
        assert_eq!(worm.head(), Some(Coord::new(2, 1)));
    }

    #[test]
    fn test_out_of_bounds_heading_falls_back() {
        let mut grid = Grid::new(2, 1, 4).unwrap();
        let mut worm = placed_worm(&mut grid, 2, Heading::Left, &[Coord::new(0, 0)]);

        assert_eq!(worm.advance(&mut grid, &mut rng()), TickOutcome::Advanced { pruned: false });
        assert_eq!(worm.heading(), Heading::Right);
        assert_eq!(worm.head(), Some(Coord::new(1, 0)));
    }

    #[test]
    fn test_boxed_in_single_segment_stands_still() {
        let mut grid = Grid::new(3, 3, 4).unwrap();
        grid.seed_from_template(&[". .", " . ", ". ."]);
        let mut worm = placed_worm(&mut grid, 4, Heading::Up, &[Coord::new(1, 1)]);
        let before = grid.snapshot(0);

        let outcome = worm.advance(&mut grid, &mut rng());
        assert_eq!(outcome, TickOutcome::DeadEnd);
        assert_eq!(worm.head(), Some(Coord::new(1, 1)));
        assert_eq!(worm.len(), 1);
        assert_eq!(grid.snapshot(0), before);
    }

    #[test]
    fn test_boxed_in_both_ends_reverses_body() {
        // Each end sits on a cell seeded to 3, so with the worm there they are full
        let mut grid = Grid::new(2, 1, 4).unwrap();
        grid.seed_from_template(&["33"]);
        let mut worm = placed_worm(&mut grid, 4, Heading::Left, &[Coord::new(0, 0), Coord::new(1, 0)]);
        let before = grid.snapshot(0);

        let outcome = worm.advance(&mut grid, &mut rng());
        assert_eq!(outcome, TickOutcome::DeadEnd);
        assert_eq!(
            worm.body().iter().copied().collect::<Vec<_>>(),
            vec![Coord::new(1, 0), Coord::new(0, 0)]
        );
        assert_eq!(grid.snapshot(0), before);
    }

    #[test]
    fn test_worm_folds_back_over_own_tail() {
        let mut grid = Grid::new(1, 4, 4).unwrap();
        grid.seed_from_template(&["4", ".", ".", "."]);
        let mut worm = placed_worm(&mut grid, 2, Heading::Up, &[Coord::new(0, 1), Coord::new(0, 2)]);

        // (0, 0) is full; the only enterable neighbor is the worm's own tail cell
        let outcome = worm.advance(&mut grid, &mut rng());
        assert_eq!(outcome, TickOutcome::Advanced { pruned: true });
        assert_eq!(worm.heading(), Heading::Down);
        assert_eq!(worm.len(), 2);
        assert_eq!(grid.snapshot(0).total_occupancy(), 4 + 2);
    }

    #[test]
    fn test_reversal_lets_worm_back_out() {
        // Head and tail cells are full with the worm on them; only the tail end has a way out
        let mut grid = Grid::new(1, 4, 4).unwrap();
        grid.seed_from_template(&["4", "3", "3", "."]);
        let mut worm = placed_worm(&mut grid, 2, Heading::Up, &[Coord::new(0, 1), Coord::new(0, 2)]);

        let outcome = worm.advance(&mut grid, &mut rng());
        assert_eq!(outcome, TickOutcome::Advanced { pruned: true });
        assert_eq!(worm.heading(), Heading::Down);
        assert_eq!(
            worm.body().iter().copied().collect::<Vec<_>>(),
            vec![Coord::new(0, 3), Coord::new(0, 2)]
        );
        assert_eq!(grid.cell(Coord::new(0, 1)), Some(Cell::Occupied(3)));
        assert_eq!(grid.cell(Coord::new(0, 2)), Some(Cell::Occupied(4)));
        assert_eq!(grid.cell(Coord::new(0, 3)), Some(Cell::Occupied(1)));
    }

    #[test]
    fn test_pick_feasible_heading_none_when_surrounded() {
        let mut grid = Grid::new(3, 3, 4).unwrap();
        grid.seed_from_template(&[".4.", "4.4", ".4."]);
        let worm = placed_worm(&mut grid, 4, Heading::Up, &[Coord::new(1, 1)]);
        assert_eq!(worm.pick_feasible_heading(&grid, &mut rng()), None);
    }

    #[test]
    fn test_pick_feasible_heading_is_uniform_over_options() {
        let mut grid = Grid::new(3, 3, 4).unwrap();
        grid.seed_from_template(&["...", " . ", "..."]);
        let worm = placed_worm(&mut grid, 4, Heading::Up, &[Coord::new(1, 1)]);

        let mut rng = rng();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let (heading, target) = worm.pick_feasible_heading(&grid, &mut rng).unwrap();
            assert!(matches!(heading, Heading::Up | Heading::Down));
            assert!(grid.is_enterable(target));
            seen.insert(heading);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_spawn_claims_an_enterable_cell() {
        let mut grid = Grid::new(3, 1, 4).unwrap();
        grid.seed_from_template(&["4 ."]);
        let worm = Worm::spawn("w", 5, Duration::from_millis(20), 0.1, &mut grid, &mut rng()).unwrap();
        assert_eq!(worm.head(), Some(Coord::new(2, 0)));
        assert_eq!(grid.cell(Coord::new(2, 0)), Some(Cell::Occupied(1)));
    }

    #[test]
    fn test_spawn_fails_on_full_grid() {
        let mut grid = Grid::new(2, 1, 1).unwrap();
        grid.seed_from_template(&["1 "]);
        assert!(Worm::spawn("w", 5, Duration::from_millis(20), 0.1, &mut grid, &mut rng()).is_err());
    }

    #[test]
    fn test_spawn_with_params_uses_overrides() {
        let mut params = wormgrid_common::WormGridConfig::default().get_sim_params();
        params.fixed_size = Some(2);
        params.fixed_speed_ms = Some(15);
        let mut grid = Grid::from_params(&params).unwrap();
        let worm = Worm::spawn_with_params("w", &params, &mut grid, &mut rng()).unwrap();
        assert_eq!(worm.max_size(), 2);
        assert_eq!(worm.speed(), Duration::from_millis(15));

        params.fixed_size = None;
        params.fixed_speed_ms = None;
        let worm = Worm::spawn_with_params("v", &params, &mut grid, &mut rng()).unwrap();
        assert!((4..=6).contains(&worm.max_size()));
        assert!((20..=80).contains(&(worm.speed().as_millis() as u64)));
    }

    #[test]
    fn test_body_never_exceeds_cap_and_occupancy_matches() {
        let mut grid = Grid::new(6, 6, 2).unwrap();
        let mut rng = rng();
        let mut worms: Vec<Worm> = (0..8)
            .map(|i| Worm::spawn(format!("w{}", i), 3, Duration::ZERO, 0.1, &mut grid, &mut rng).unwrap())
            .collect();

        for _ in 0..500 {
            for worm in worms.iter_mut() {
                worm.tick(&mut grid, &mut rng);
                assert!(worm.len() <= worm.max_size());
            }
        }

        let snapshot = grid.snapshot(0);
        let segments: usize = worms.iter().map(|w| w.len()).sum();
        assert_eq!(snapshot.total_occupancy(), segments as u64);
        assert!(snapshot.cells.iter().all(|c| c.count().map_or(true, |n| n <= 2)));
        for worm in &worms {
            for &c in worm.body() {
                assert!(grid.cell(c).and_then(|cell| cell.count()).unwrap_or(0) >= 1);
            }
        }
    }

    #[test]
    fn test_maybe_turn_disabled_at_zero_chance() {
        let mut worm = Worm::from_body("w", 3, Duration::ZERO, 0.0, Heading::Left, [Coord::new(0, 0)]);
        let mut rng = rng();
        for _ in 0..100 {
            assert!(!worm.maybe_turn(&mut rng));
        }
        assert_eq!(worm.heading(), Heading::Left);
    }
}
