use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Simulation parameters derived from the configuration, handed to the grid, the worms and the render loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Grid
    pub cells_wide: usize,
    pub cells_high: usize,
    pub capacity: u8, // K: number of display tiers, also the per-cell segment cap

    // Worms
    pub num_worms: usize,
    pub size_range: (usize, usize), // Inclusive
    pub speed_range_ms: (u64, u64), // Inclusive
    pub fixed_size: Option<usize>,
    pub fixed_speed_ms: Option<u64>,
    pub turn_chance: f64, // Probability per tick of picking a fresh random heading

    // Display
    pub frame_interval: Duration,
    pub headless: bool,
    pub headless_duration: Duration,
    pub status_line: bool,
}

impl SimParams {
    pub fn num_cells(&self) -> usize {
        self.cells_wide * self.cells_high
    }
}
