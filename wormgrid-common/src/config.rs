use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::SimParams;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Grid dimensions and capacity
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    #[serde(default = "default_cells_wide")]
    pub cells_wide: usize,
    #[serde(default = "default_cells_high")]
    pub cells_high: usize,
    /// Number of display tiers. Doubles as the per-cell capacity.
    #[serde(default = "default_tiers")]
    pub tiers: u8,
}

// Worm population, loaded from wormgrid.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct WormConfig {
    #[serde(default = "default_worm_count")]
    pub count: usize,
    #[serde(default = "default_min_size")]
    pub min_size: usize,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_min_speed_ms")]
    pub min_speed_ms: u64,
    #[serde(default = "default_max_speed_ms")]
    pub max_speed_ms: u64,
    #[serde(default = "default_turn_chance")]
    pub turn_chance: f64,
    // Overrides applied to every worm instead of the random ranges
    #[serde(default)]
    pub fixed_size: Option<usize>,
    #[serde(default)]
    pub fixed_speed_ms: Option<u64>,
}

// Display and frame pacing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Run without a terminal, logging status instead of drawing.
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_headless_duration_secs")]
    pub headless_duration_secs: u64,
    #[serde(default = "default_status_line")]
    pub status_line: bool,
}

// Optional pattern used to pre-seed the grid
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TemplateConfig {
    /// Use the built-in pattern when no path is given.
    #[serde(default = "default_builtin")]
    pub builtin: bool,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Where the grid pattern comes from, resolved from `TemplateConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    None,
    Builtin,
    File(PathBuf),
}

// Main configuration structure, loaded from wormgrid.toml.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct WormGridConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub worms: WormConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub template: TemplateConfig,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            cells_wide: default_cells_wide(),
            cells_high: default_cells_high(),
            tiers: default_tiers(),
        }
    }
}

impl Default for WormConfig {
    fn default() -> Self {
        WormConfig {
            count: default_worm_count(),
            min_size: default_min_size(),
            max_size: default_max_size(),
            min_speed_ms: default_min_speed_ms(),
            max_speed_ms: default_max_speed_ms(),
            turn_chance: default_turn_chance(),
            fixed_size: None,
            fixed_speed_ms: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            fps: default_fps(),
            headless: false,
            headless_duration_secs: default_headless_duration_secs(),
            status_line: default_status_line(),
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        TemplateConfig {
            builtin: default_builtin(),
            path: None,
        }
    }
}

impl WormGridConfig {
    /// Loads the configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;

        Ok(config)
    }

    /// Loads the file if it exists, otherwise falls back to the built-in defaults.
    /// Returns the config and whether it came from disk.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        if path.as_ref().exists() {
            Ok((Self::load(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: WormGridConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid.cells_wide == 0 || self.grid.cells_high == 0 {
            anyhow::bail!("grid dimensions must be positive (got {}x{}).", self.grid.cells_wide, self.grid.cells_high);
        }
        if self.grid.tiers == 0 {
            anyhow::bail!("grid.tiers must be greater than 0.");
        }
        if self.worms.min_size == 0 || self.worms.fixed_size == Some(0) {
            anyhow::bail!("worm sizes must be at least 1.");
        }
        if self.worms.min_size > self.worms.max_size {
            anyhow::bail!("worms.min_size ({}) exceeds worms.max_size ({}).", self.worms.min_size, self.worms.max_size);
        }
        if self.worms.min_speed_ms > self.worms.max_speed_ms {
            anyhow::bail!("worms.min_speed_ms ({}) exceeds worms.max_speed_ms ({}).", self.worms.min_speed_ms, self.worms.max_speed_ms);
        }
        if !(0.0..=1.0).contains(&self.worms.turn_chance) {
            anyhow::bail!("worms.turn_chance must be within [0, 1] (got {}).", self.worms.turn_chance);
        }
        if self.display.fps == 0 {
            anyhow::bail!("display.fps must be greater than 0.");
        }
        Ok(())
    }

    pub fn template_source(&self) -> TemplateSource {
        match (&self.template.path, self.template.builtin) {
            (Some(path), _) => TemplateSource::File(path.clone()),
            (None, true) => TemplateSource::Builtin,
            (None, false) => TemplateSource::None,
        }
    }

    /// Converts the configuration into parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        SimParams {
            cells_wide: self.grid.cells_wide,
            cells_high: self.grid.cells_high,
            capacity: self.grid.tiers,
            num_worms: self.worms.count,
            size_range: (self.worms.min_size, self.worms.max_size),
            speed_range_ms: (self.worms.min_speed_ms, self.worms.max_speed_ms),
            fixed_size: self.worms.fixed_size,
            fixed_speed_ms: self.worms.fixed_speed_ms,
            turn_chance: self.worms.turn_chance,
            frame_interval: Duration::from_nanos(1_000_000_000 / self.display.fps as u64),
            headless: self.display.headless,
            headless_duration: Duration::from_secs(self.display.headless_duration_secs),
            status_line: self.display.status_line,
        }
    }
}

fn default_cells_wide() -> usize {
    40
}

fn default_cells_high() -> usize {
    25
}

fn default_tiers() -> u8 {
    4 // dark gray, dark teal, medium teal, light teal
}

fn default_worm_count() -> usize {
    50
}

fn default_min_size() -> usize {
    4
}

fn default_max_size() -> usize {
    6
}

fn default_min_speed_ms() -> u64 {
    20
}

fn default_max_speed_ms() -> u64 {
    80
}

fn default_turn_chance() -> f64 {
    0.10
}

fn default_fps() -> u32 {
    30
}

fn default_headless_duration_secs() -> u64 {
    10
}

fn default_status_line() -> bool {
    true
}

fn default_builtin() -> bool {
    true
}
