//! Orchestration Layer
//!
//! This crate provides the host-side glue for the 2D SPH kernel:
//! - JSON scene configuration with defaults and validation
//! - Spawning the initial particle block from a scene
//! - A frame-driven runner with pause, single-step and reset

#![warn(missing_docs)]

pub mod config;
pub mod runner;

pub use config::SimulationConfig;
pub use runner::{FrameReport, FrameRunner, HostInput, RunnerState};

/// Create a complete simulation from a configuration file
///
/// This function performs the full simulation setup pipeline:
/// 1. Load and validate the configuration
/// 2. Spawn the initial particle block
/// 3. Create the simulation kernel
/// 4. Wrap it in a FrameRunner for per-frame driving
///
/// # Arguments
/// * `config_path` - Path to the JSON configuration file
///
/// # Returns
/// A `FrameRunner` ready to be advanced, or an error if setup fails
///
/// # Example
/// ```no_run
/// use fluid_orchestrator::{create_simulation, HostInput};
///
/// let mut runner = create_simulation("configs/dam-break-2d.json")?;
/// let report = runner.advance(1.0 / 60.0, &HostInput::default());
/// println!("{} steps", report.steps);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_simulation(config_path: &str) -> Result<FrameRunner, Box<dyn std::error::Error>> {
    tracing::info!("Creating simulation from config: {}", config_path);

    let config = SimulationConfig::load(config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);

    let runner = FrameRunner::from_config(&config)?;

    tracing::info!("Simulation ready");
    Ok(runner)
}
