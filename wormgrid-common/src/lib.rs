pub mod cell;
pub mod config;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use cell::{Cell, Coord};
pub use config::{WormGridConfig, GridConfig, WormConfig, DisplayConfig, TemplateConfig, TemplateSource};
pub use sim_params::SimParams;
pub use snapshot::Snapshot;
