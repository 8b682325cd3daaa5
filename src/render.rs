use crate::simulation::WormSimulation;
use anyhow::Result;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use log::{info, warn};
use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};
use wormgrid_common::{Coord, Snapshot};

// Tier palette anchors: dark gray, dark teal, medium teal, light teal
const TIER_ANCHORS: [(u8, u8, u8); 4] = [(40, 40, 40), (20, 95, 137), (36, 191, 255), (87, 255, 255)];

// Each cell is a block plus a gap column, which reads as a bordered rectangle grid
const CELL_GLYPH: &str = "\u{2588}";
const CELL_GAP: &str = " ";
const CELL_COLUMNS: usize = 2;

/// Display/event collaborator driven by the render loop.
pub trait Frontend {
    /// Polls for termination intent (window close, escape key).
    fn quit_requested(&mut self) -> Result<bool>;

    /// Draws one frame from a consistent grid snapshot.
    fn present(&mut self, snapshot: &Snapshot, running_worms: usize) -> Result<()>;
}

/// Frame pacing: sleeps out whatever is left of the frame interval.
#[derive(Debug)]
pub struct FrameClock {
    interval: Duration,
    next: Instant,
}

impl FrameClock {
    pub fn new(interval: Duration) -> Self {
        Self { interval, next: Instant::now() + interval }
    }

    /// Blocks until the next frame is due. A late frame restarts the schedule rather than bursting to catch up.
    pub fn tick(&mut self) {
        let now = Instant::now();
        if now < self.next {
            std::thread::sleep(self.next - now);
            self.next += self.interval;
        } else {
            self.next = now + self.interval;
        }
    }
}

/// Colour for a tier in `0..tiers`, interpolated across the palette anchors.
pub fn tier_color(tier: u8, tiers: u8) -> Color {
    let (r, g, b) = tier_rgb(tier, tiers);
    Color::Rgb { r, g, b }
}

fn tier_rgb(tier: u8, tiers: u8) -> (u8, u8, u8) {
    if tiers <= 1 {
        return TIER_ANCHORS[0];
    }
    let pos = (tier.min(tiers - 1) as usize * (TIER_ANCHORS.len() - 1)) as f32 / (tiers - 1) as f32;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(TIER_ANCHORS.len() - 1);
    let frac = pos - lo as f32;
    let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * frac).round() as u8;
    let (a, b) = (TIER_ANCHORS[lo], TIER_ANCHORS[hi]);
    (lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

fn pad_or_trunc(s: &str, width: usize) -> String {
    let mut out: String = s.chars().take(width).collect();
    let len = out.chars().count();
    if len < width {
        out.extend(std::iter::repeat(' ').take(width - len));
    }
    out
}

fn status_text(snapshot: &Snapshot, running_worms: usize) -> String {
    format!(
        "worms {} | segments {} | full {} | disabled {} | frame {} | Esc/q quit",
        running_worms,
        snapshot.total_occupancy(),
        snapshot.full_count(),
        snapshot.disabled_count(),
        snapshot.frame
    )
}

/// Full-screen terminal display. Restores the terminal when dropped.
pub struct TerminalFrontend {
    out: Stdout,
    status_line: bool,
    needs_clear: bool,
}

impl TerminalFrontend {
    pub fn enter(status_line: bool) -> Result<Self> {
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, cursor::Hide)?;
        terminal::enable_raw_mode()?;
        execute!(out, DisableLineWrap)?;
        Ok(Self { out, status_line, needs_clear: true })
    }

    fn restore(&mut self) -> io::Result<()> {
        execute!(self.out, ResetColor, EnableLineWrap)?;
        terminal::disable_raw_mode()?;
        execute!(self.out, LeaveAlternateScreen, cursor::Show)
    }
}

impl Drop for TerminalFrontend {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}

impl Frontend for TerminalFrontend {
    fn quit_requested(&mut self) -> Result<bool> {
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind == KeyEventKind::Press => match k.code {
                    KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(true),
                    KeyCode::Char('c') if k.modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),
                    _ => {}
                },
                Event::Resize(_, _) => self.needs_clear = true,
                _ => {}
            }
        }
        Ok(false)
    }

    fn present(&mut self, snapshot: &Snapshot, running_worms: usize) -> Result<()> {
        let (cols_u16, rows_u16) = terminal::size()?;
        let term_cols = cols_u16 as usize;
        let term_rows = rows_u16 as usize;
        let reserved = if self.status_line { 1 } else { 0 };

        let grid_rows = snapshot.cells_high.min(term_rows.saturating_sub(reserved));
        let grid_cols = snapshot.cells_wide.min(term_cols / CELL_COLUMNS);

        let out = &mut self.out;
        queue!(out, BeginSynchronizedUpdate)?;
        if self.needs_clear {
            queue!(out, Clear(ClearType::All))?;
            self.needs_clear = false;
        }

        let mut cur_color: Option<Color> = None;
        for y in 0..grid_rows {
            queue!(out, cursor::MoveTo(0, y as u16))?;
            for x in 0..grid_cols {
                let color = tier_color(snapshot.tier(Coord::new(x, y)), snapshot.tiers);
                if cur_color != Some(color) {
                    queue!(out, SetForegroundColor(color))?;
                    cur_color = Some(color);
                }
                queue!(out, Print(CELL_GLYPH), Print(CELL_GAP))?;
            }
        }
        queue!(out, ResetColor)?;

        if self.status_line && term_rows > grid_rows {
            queue!(
                out,
                cursor::MoveTo(0, grid_rows as u16),
                Print(pad_or_trunc(&status_text(snapshot, running_worms), term_cols))
            )?;
        }

        queue!(out, EndSynchronizedUpdate)?;
        out.flush()?;
        Ok(())
    }
}

/// No display: logs a status line now and then and asks to quit after a fixed duration.
pub struct HeadlessFrontend {
    started: Instant,
    duration: Duration,
    status_interval: Duration,
    last_status: Option<Instant>,
}

impl HeadlessFrontend {
    pub fn new(duration: Duration) -> Self {
        Self {
            started: Instant::now(),
            duration,
            status_interval: Duration::from_secs(5),
            last_status: None,
        }
    }
}

impl Frontend for HeadlessFrontend {
    fn quit_requested(&mut self) -> Result<bool> {
        Ok(self.started.elapsed() >= self.duration)
    }

    fn present(&mut self, snapshot: &Snapshot, running_worms: usize) -> Result<()> {
        let due = self.last_status.map_or(true, |t| t.elapsed() >= self.status_interval);
        if due {
            info!("{} | elapsed {:.1} s", status_text(snapshot, running_worms), self.started.elapsed().as_secs_f64());
            self.last_status = Some(Instant::now());
        }
        Ok(())
    }
}

/// Main control loop: poll for quit, snapshot under the lock, draw outside it, pace.
/// Raises the simulation's stop signal on termination intent. Returns the number of frames drawn.
pub fn run_render_loop<F: Frontend + ?Sized>(sim: &WormSimulation, frontend: &mut F) -> Result<u64> {
    let mut clock = FrameClock::new(sim.params().frame_interval);
    let mut frame: u64 = 0;

    loop {
        if frontend.quit_requested()? {
            info!("Termination requested after {} frames.", frame);
            sim.stop();
            break;
        }

        let snapshot = sim.snapshot(frame)?;
        frontend.present(&snapshot, sim.running_actors())?;
        frame += 1;

        clock.tick();
    }
    Ok(frame)
}
