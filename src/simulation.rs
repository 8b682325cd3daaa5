use crate::grid::{Grid, SharedGrid};
use crate::template::Template;
use crate::worm::{TickOutcome, Worm};
use anyhow::{Context, Result};
use log::{debug, error, info, trace, warn};
use rand::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use wormgrid_common::{Coord, SimParams, Snapshot, WormGridConfig};

/// Global stop flag. Goes from false to true once and never back.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// Per-actor counters handed back when a worm's loop exits.
#[derive(Debug, Clone, Default)]
pub struct WormReport {
    pub name: String,
    pub max_size: usize,
    pub ticks: u64,
    pub advances: u64,
    pub prunes: u64,
    pub races_lost: u64,
    pub dead_ends: u64,
    /// Final body, head first.
    pub body: Vec<Coord>,
}

impl WormReport {
    fn record(&mut self, outcome: TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Advanced { pruned } => {
                self.advances += 1;
                if pruned {
                    self.prunes += 1;
                }
            }
            TickOutcome::RaceLost => self.races_lost += 1,
            TickOutcome::DeadEnd => self.dead_ends += 1,
        }
    }
}

/// Owns the shared grid, the stop signal and one actor thread per worm.
pub struct WormSimulation {
    params: SimParams,
    grid: SharedGrid,
    stop: StopSignal,
    handles: Vec<JoinHandle<WormReport>>,
}

impl WormSimulation {
    /// Builds the grid and seeds it from the configured template. No actors run yet.
    pub fn new(config: WormGridConfig) -> Result<Self> {
        let params = config.get_sim_params();
        let mut grid = Grid::from_params(&params)?;

        // --- Seed From Template ---
        if let Some(template) = Template::from_source(&config.template_source())? {
            let summary = grid.seed_from_template(template.rows());
            if summary.truncated {
                warn!(
                    "Template ({}x{}) exceeds the {}x{} grid; extra rows/columns ignored.",
                    template.width(), template.height(), params.cells_wide, params.cells_high
                );
            }
            if summary.unknown_chars > 0 {
                warn!("Template contains {} characters outside '.', ' ', '0'-'9'; left untouched.", summary.unknown_chars);
            }
            info!("Grid seeded: {} cells disabled, {} cells pre-filled.", summary.disabled, summary.seeded);
        }

        Ok(Self {
            params,
            grid: SharedGrid::new(grid),
            stop: StopSignal::new(),
            handles: Vec::new(),
        })
    }

    /// Places `num_worms` worms and starts each on its own thread.
    pub fn spawn_worms(&mut self) -> Result<()> {
        let mut rng = StdRng::from_os_rng();
        for i in 0..self.params.num_worms {
            let name = format!("worm-{}", i);
            let worm = {
                let mut grid = self.grid.lock()?;
                Worm::spawn_with_params(name.as_str(), &self.params, &mut grid, &mut rng)?
            };
            self.start_actor(worm)?;
        }
        info!("Started {} worm actors.", self.handles.len());
        Ok(())
    }

    /// Starts an already-placed worm as an independent actor.
    pub fn start_actor(&mut self, worm: Worm) -> Result<()> {
        let grid = self.grid.clone();
        let stop = self.stop.clone();
        let rng = StdRng::from_os_rng();
        let handle = thread::Builder::new()
            .name(worm.name().to_string())
            .spawn(move || run_worm(worm, grid, stop, rng))
            .context("Failed to spawn worm actor thread")?;
        self.handles.push(handle);
        Ok(())
    }

    /// Raises the stop signal. Actors notice it at the top of their next tick.
    pub fn stop(&self) {
        if !self.stop.is_raised() {
            info!("Stop signal raised.");
        }
        self.stop.raise();
    }

    /// Waits for every actor to exit and collects their reports. Raises the stop signal first.
    pub fn join(&mut self) -> Vec<WormReport> {
        self.stop();
        let mut reports = Vec::with_capacity(self.handles.len());
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("worm").to_string();
            match handle.join() {
                Ok(report) => {
                    debug!(
                        "{}: {} ticks, {} advances, {} prunes, {} lost races, {} dead ends, length {}/{}",
                        report.name, report.ticks, report.advances, report.prunes,
                        report.races_lost, report.dead_ends, report.body.len(), report.max_size
                    );
                    reports.push(report);
                }
                Err(_) => error!("Worm actor '{}' panicked.", name),
            }
        }

        let ticks: u64 = reports.iter().map(|r| r.ticks).sum();
        let advances: u64 = reports.iter().map(|r| r.advances).sum();
        let dead_ends: u64 = reports.iter().map(|r| r.dead_ends).sum();
        info!(
            "Joined {} worm actors | ticks {} | advances {} | dead ends {}",
            reports.len(), ticks, advances, dead_ends
        );
        reports
    }

    pub fn snapshot(&self, frame: u64) -> Result<Snapshot> {
        self.grid.snapshot(frame)
    }

    pub fn grid(&self) -> &SharedGrid {
        &self.grid
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn running_actors(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    pub fn actor_count(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for WormSimulation {
    fn drop(&mut self) {
        // Threads are not joined here; they exit on their own within one tick
        self.stop.raise();
    }
}

/// Actor loop: check stop, turn, step under the grid lock, sleep outside it.
fn run_worm(mut worm: Worm, grid: SharedGrid, stop: StopSignal, mut rng: StdRng) -> WormReport {
    let mut report = WormReport {
        name: worm.name().to_string(),
        max_size: worm.max_size(),
        ..WormReport::default()
    };

    loop {
        if stop.is_raised() {
            break;
        }

        worm.maybe_turn(&mut rng);

        let outcome = match grid.lock() {
            Ok(mut guard) => worm.advance(&mut guard, &mut rng),
            Err(e) => {
                error!("{} stopping: {}", worm.name(), e);
                break;
            }
        };
        trace!("{} -> {:?}", worm.name(), outcome);
        report.record(outcome);

        thread::sleep(worm.speed());
    }

    report.body = worm.body().iter().copied().collect();
    report
}
