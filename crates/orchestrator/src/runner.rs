//! Frame-driven simulation runner
//!
//! This module provides the `FrameRunner`, which the host calls once per
//! rendered frame. It turns wall-clock frame time into a fixed number of
//! simulation steps, copies pointer input into the parameter snapshot before
//! each step, and handles pause, single-step and reset requests.

use fluid_kernel::{FluidSimulation, InteractionInput, SimulationStats, SpawnData};
use tracing::{debug, info};

use crate::config::{InteractionConfig, SimulationConfig, TimingConfig};

/// Runner state enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Frames advance the simulation
    Running,
    /// Frames leave the simulation untouched unless a single step is requested
    Paused,
}

/// Input sampled by the host for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostInput {
    /// Pointer position and buttons
    pub interaction: InteractionInput,
    /// Toggle between running and paused before this frame
    pub toggle_pause: bool,
    /// Run exactly one frame while paused
    pub step_once: bool,
    /// Restore the initial particle block before this frame
    pub reset: bool,
}

/// What one call to [`FrameRunner::advance`] did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Simulation steps executed this frame
    pub steps: u32,
    /// Timestep of each of those steps (seconds)
    pub step_dt: f32,
    /// Total simulated time this frame (seconds)
    pub simulated_time: f32,
    /// Runner state after the frame
    pub state: RunnerState,
}

/// Owns a simulation and drives it once per rendered frame
pub struct FrameRunner {
    simulation: FluidSimulation,
    spawn: SpawnData,
    timing: TimingConfig,
    interaction: InteractionConfig,
    state: RunnerState,
    step_requested: bool,
    frame_count: u64,
    sim_time: f64,
}

impl FrameRunner {
    /// Create a runner around an existing simulation
    ///
    /// # Arguments
    /// * `simulation` - The simulation to drive
    /// * `spawn` - Initial state restored by [`reset`](Self::reset)
    /// * `timing` - Frame timing
    /// * `interaction` - Pointer interaction strength and radius
    pub fn new(
        mut simulation: FluidSimulation,
        spawn: SpawnData,
        timing: TimingConfig,
        interaction: InteractionConfig,
    ) -> Result<Self, String> {
        let params = simulation.params().with_interaction_radius(interaction.radius);
        simulation
            .set_params(params)
            .map_err(|e| format!("Invalid interaction radius: {}", e))?;

        Ok(Self {
            simulation,
            spawn,
            timing,
            interaction,
            state: RunnerState::Running,
            step_requested: false,
            frame_count: 0,
            sim_time: 0.0,
        })
    }

    /// Build the simulation described by `config` and wrap it in a runner
    pub fn from_config(config: &SimulationConfig) -> Result<Self, String> {
        let spawn = config.spawner().spawn();
        let simulation = config.build_simulation_from(&spawn)?;
        info!(
            name = %config.name,
            particles = simulation.particle_count(),
            iterations_per_frame = config.timing.iterations_per_frame,
            "frame runner ready"
        );
        Self::new(
            simulation,
            spawn,
            config.timing.clone(),
            config.interaction.clone(),
        )
    }

    /// Advance by one rendered frame of `frame_time` wall-clock seconds
    pub fn advance(&mut self, frame_time: f32, input: &HostInput) -> FrameReport {
        self.frame_count += 1;

        if input.reset {
            if let Err(e) = self.reset() {
                tracing::warn!("Reset failed: {}", e);
            }
        }
        if input.toggle_pause {
            self.toggle_pause();
        }
        if input.step_once {
            self.request_step();
        }

        let single_step = self.state == RunnerState::Paused && self.step_requested;
        if self.state == RunnerState::Paused && !single_step {
            return self.report(0, 0.0);
        }
        self.step_requested = false;

        let iterations = self.timing.iterations_per_frame;
        let step_dt = self.timing.step_dt(frame_time);
        if !(step_dt > 0.0 && step_dt.is_finite()) {
            debug!(frame = self.frame_count, frame_time, "skipping frame with no simulated time");
            return self.report(0, 0.0);
        }

        for _ in 0..iterations {
            self.simulation
                .set_interaction(&input.interaction, self.interaction.strength);
            self.simulation.step(step_dt);
        }
        self.sim_time += (step_dt * iterations as f32) as f64;

        debug!(
            frame = self.frame_count,
            steps = iterations,
            step_dt,
            single_step,
            sim_time = self.sim_time,
            "frame advanced"
        );
        self.report(iterations, step_dt)
    }

    fn report(&self, steps: u32, step_dt: f32) -> FrameReport {
        FrameReport {
            steps,
            step_dt,
            simulated_time: steps as f32 * step_dt,
            state: self.state,
        }
    }

    /// Pause the simulation
    pub fn pause(&mut self) {
        self.state = RunnerState::Paused;
    }

    /// Resume the simulation
    pub fn resume(&mut self) {
        self.state = RunnerState::Running;
    }

    /// Flip between running and paused
    pub fn toggle_pause(&mut self) {
        self.state = match self.state {
            RunnerState::Running => RunnerState::Paused,
            RunnerState::Paused => RunnerState::Running,
        };
        info!(state = ?self.state, "runner state changed");
    }

    /// Run one frame on the next [`advance`](Self::advance) even while paused
    pub fn request_step(&mut self) {
        self.step_requested = true;
    }

    /// Restore the initial particle block
    pub fn reset(&mut self) -> Result<(), String> {
        self.simulation
            .reset(&self.spawn)
            .map_err(|e| format!("Failed to reset simulation: {}", e))?;
        self.sim_time = 0.0;
        Ok(())
    }

    /// Get current runner state
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Frames seen since creation
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Simulated time since creation or the last reset (seconds)
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Frame timing in use
    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// The driven simulation
    pub fn simulation(&self) -> &FluidSimulation {
        &self.simulation
    }

    /// Mutable access to the driven simulation (e.g. to retune parameters)
    pub fn simulation_mut(&mut self) -> &mut FluidSimulation {
        &mut self.simulation
    }

    /// Diagnostics over the current state
    pub fn stats(&self) -> SimulationStats {
        self.simulation.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_runner() -> FrameRunner {
        let config = SimulationConfig {
            particle_count: 64,
            ..Default::default()
        };
        FrameRunner::from_config(&config).unwrap()
    }

    #[test]
    fn test_running_frame_steps_iterations() {
        let mut runner = small_runner();
        let report = runner.advance(1.0 / 60.0, &HostInput::default());
        assert_eq!(report.steps, 3);
        assert!((report.step_dt - 1.0 / 180.0).abs() < 1e-7);
        assert_eq!(runner.simulation().step_count(), 3);
    }

    #[test]
    fn test_long_frame_is_capped() {
        let mut runner = small_runner();
        let report = runner.advance(0.5, &HostInput::default());
        assert!((report.simulated_time - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_paused_runner_does_not_step() {
        let mut runner = small_runner();
        runner.pause();
        let report = runner.advance(1.0 / 60.0, &HostInput::default());
        assert_eq!(report.steps, 0);
        assert_eq!(report.state, RunnerState::Paused);
        assert_eq!(runner.simulation().step_count(), 0);
    }

    #[test]
    fn test_single_step_while_paused() {
        let mut runner = small_runner();
        runner.pause();
        let input = HostInput { step_once: true, ..Default::default() };
        assert_eq!(runner.advance(1.0 / 60.0, &input).steps, 3);
        // The request is consumed.
        assert_eq!(runner.advance(1.0 / 60.0, &HostInput::default()).steps, 0);
    }

    #[test]
    fn test_toggle_pause_input() {
        let mut runner = small_runner();
        let toggle = HostInput { toggle_pause: true, ..Default::default() };
        assert_eq!(runner.advance(1.0 / 60.0, &toggle).state, RunnerState::Paused);
        assert_eq!(runner.advance(1.0 / 60.0, &toggle).state, RunnerState::Running);
    }

    #[test]
    fn test_zero_frame_time_is_skipped() {
        let mut runner = small_runner();
        let report = runner.advance(0.0, &HostInput::default());
        assert_eq!(report.steps, 0);
        assert_eq!(runner.simulation().step_count(), 0);
    }

    #[test]
    fn test_interaction_radius_from_config() {
        let runner = small_runner();
        assert_eq!(
            runner.simulation().params().interaction_radius,
            InteractionConfig::default().radius
        );
    }
}
