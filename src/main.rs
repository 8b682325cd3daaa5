use anyhow::Result;
use std::time::Instant;
use log::{info, debug};

// Define modules used by main
mod grid;
mod render;
mod simulation;
mod template;
mod worm;

use render::{run_render_loop, Frontend, HeadlessFrontend, TerminalFrontend};
use simulation::WormSimulation;
use wormgrid_common::WormGridConfig;

const CONFIG_PATH: &str = "wormgrid.toml";

fn main() -> Result<()> {
    // Initialize the logger. The terminal display owns stdout, so redirect stderr to keep logs readable.
    env_logger::init();

    info!("Starting worm grid...");

    // --- Load Configuration ---
    let (config, from_file) = WormGridConfig::load_or_default(CONFIG_PATH)?;
    if from_file {
        info!("Loaded configuration from {}.", CONFIG_PATH);
    } else {
        info!("No {} found, using built-in defaults.", CONFIG_PATH);
    }

    // --- Initialize Grid ---
    let mut sim = WormSimulation::new(config)?;
    let params = sim.params().clone();
    info!(
        "Grid {}x{} with {} tiers, {} worms.",
        params.cells_wide, params.cells_high, params.capacity, params.num_worms
    );
    debug!("Simulation Parameters: {:#?}", params);

    // --- Start Worm Actors ---
    sim.spawn_worms()?;

    // --- Render Loop ---
    let start_time = Instant::now();
    let rendered = if params.headless {
        let mut frontend = HeadlessFrontend::new(params.headless_duration);
        run_frontend(&sim, &mut frontend)
    } else {
        // Terminal is restored when the frontend drops at the end of the closure
        TerminalFrontend::enter(params.status_line)
            .and_then(|mut frontend| run_frontend(&sim, &mut frontend))
    };

    // --- Shutdown ---
    let reports = sim.join();
    let frames = rendered?;
    let segments: usize = reports.iter().map(|r| r.body.len()).sum();
    info!(
        "Rendered {} frames in {:.2} s | {} worms stopped holding {} segments.",
        frames,
        start_time.elapsed().as_secs_f64(),
        reports.len(),
        segments
    );

    info!("Worm grid complete.");
    Ok(())
}

fn run_frontend<F: Frontend>(sim: &WormSimulation, frontend: &mut F) -> Result<u64> {
    let result = run_render_loop(sim, frontend);
    // Any exit from the loop, including errors, stops the actors
    sim.stop();
    result
}
