//! Configuration parsing and validation for 2D SPH scenes

use fluid_kernel::{FluidSimulation, ParticleSpawner, SimParams, SpawnData};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::fs;

/// Main simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable scene name
    #[serde(default = "default_name")]
    pub name: String,
    /// Number of particles (fixed for the lifetime of the simulation)
    #[serde(default = "default_particle_count")]
    pub particle_count: usize,
    /// Cell table size; defaults to the particle count
    #[serde(default)]
    pub cell_table_size: Option<usize>,
    /// Fluid and kernel parameters
    #[serde(default)]
    pub fluid: FluidConfig,
    /// Container size, centred at the origin [width, height]
    #[serde(default = "default_bounds")]
    pub bounds: [f32; 2],
    /// Optional obstacle box
    #[serde(default)]
    pub obstacle: Option<ObstacleConfig>,
    /// Initial particle block
    #[serde(default)]
    pub spawn: SpawnConfig,
    /// Frame timing
    #[serde(default)]
    pub timing: TimingConfig,
    /// Pointer interaction
    #[serde(default)]
    pub interaction: InteractionConfig,
}

/// Fluid and kernel parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidConfig {
    /// Kernel support radius, also the hash cell size
    pub smoothing_radius: f32,
    /// Rest density
    pub target_density: f32,
    /// Pressure stiffness
    pub pressure_multiplier: f32,
    /// Near-pressure stiffness
    pub near_pressure_multiplier: f32,
    /// Viscosity strength
    pub viscosity_strength: f32,
    /// Gravity vector [x, y]
    pub gravity: [f32; 2],
    /// Fraction of normal velocity kept after a wall hit
    pub collision_damping: f32,
    /// Mass of every particle
    pub particle_mass: f32,
    /// Collision radius of a particle
    pub particle_radius: f32,
}

/// Axis-aligned obstacle box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleConfig {
    /// Centre [x, y]
    pub centre: [f32; 2],
    /// Full size [width, height]
    pub size: [f32; 2],
}

/// Initial particle block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Centre of the block [x, y]
    pub centre: [f32; 2],
    /// Full size of the block [width, height]
    pub size: [f32; 2],
    /// Initial velocity [x, y]
    pub initial_velocity: [f32; 2],
    /// Random displacement applied to each grid position
    pub jitter_strength: f32,
    /// RNG seed for the jitter
    pub seed: u64,
}

/// Frame timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Simulation steps per rendered frame
    pub iterations_per_frame: u32,
    /// Multiplier on wall-clock frame time
    pub time_scale: f32,
    /// Frame time is capped at `1 / max_timestep_fps`
    pub max_timestep_fps: f32,
}

/// Pointer interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Unsigned strength; the pointer buttons pick the sign
    pub strength: f32,
    /// Radius of the interaction disc
    pub radius: f32,
}

// Default values
fn default_name() -> String {
    "untitled".to_string()
}

fn default_particle_count() -> usize {
    4096
}

fn default_bounds() -> [f32; 2] {
    [17.1, 9.3]
}

impl Default for FluidConfig {
    fn default() -> Self {
        let p = SimParams::default();
        Self {
            smoothing_radius: p.smoothing_radius,
            target_density: p.target_density,
            pressure_multiplier: p.pressure_multiplier,
            near_pressure_multiplier: p.near_pressure_multiplier,
            viscosity_strength: p.viscosity_strength,
            gravity: p.gravity.to_array(),
            collision_damping: p.collision_damping,
            particle_mass: p.particle_mass,
            particle_radius: p.particle_radius,
        }
    }
}

impl Default for SpawnConfig {
    fn default() -> Self {
        let s = ParticleSpawner::default();
        Self {
            centre: s.centre.to_array(),
            size: s.size.to_array(),
            initial_velocity: s.initial_velocity.to_array(),
            jitter_strength: s.jitter_strength,
            seed: s.seed,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            iterations_per_frame: 3,
            time_scale: 1.0,
            max_timestep_fps: 60.0,
        }
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            strength: 90.0,
            radius: 2.0,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            particle_count: default_particle_count(),
            cell_table_size: None,
            fluid: FluidConfig::default(),
            bounds: default_bounds(),
            obstacle: None,
            spawn: SpawnConfig::default(),
            timing: TimingConfig::default(),
            interaction: InteractionConfig::default(),
        }
    }
}

impl TimingConfig {
    /// Simulated time covered by one frame of `frame_time` wall-clock seconds.
    pub fn frame_dt(&self, frame_time: f32) -> f32 {
        (frame_time * self.time_scale).min(1.0 / self.max_timestep_fps)
    }

    /// Timestep of each iteration within a frame.
    pub fn step_dt(&self, frame_time: f32) -> f32 {
        self.frame_dt(frame_time) / self.iterations_per_frame as f32
    }
}

impl SimulationConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        Self::from_json_str(&contents).map_err(|e| format!("{}: {}", path, e))
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let config: SimulationConfig = serde_json::from_str(json)
            .map_err(|e| format!("Failed to parse config JSON: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        // Check population and cell table
        if self.particle_count == 0 {
            return Err("particle_count must be at least 1".to_string());
        }
        if let Some(table_size) = self.cell_table_size {
            if table_size < self.particle_count {
                return Err(format!(
                    "cell_table_size ({}) must be at least particle_count ({})",
                    table_size, self.particle_count
                ));
            }
        }

        // Check spawn block
        if self.spawn.size[0] < 0.0 || self.spawn.size[1] <= 0.0 {
            return Err("spawn.size must be non-negative with a positive height".to_string());
        }
        if self.spawn.jitter_strength < 0.0 {
            return Err("spawn.jitter_strength must be non-negative".to_string());
        }

        // Check obstacle
        if let Some(obstacle) = &self.obstacle {
            if obstacle.size[0] <= 0.0 || obstacle.size[1] <= 0.0 {
                return Err("obstacle.size must be positive on both axes".to_string());
            }
        }

        // Check timing
        if self.timing.iterations_per_frame == 0 {
            return Err("timing.iterations_per_frame must be at least 1".to_string());
        }
        if !(self.timing.time_scale > 0.0 && self.timing.time_scale.is_finite()) {
            return Err("timing.time_scale must be positive".to_string());
        }
        if !(self.timing.max_timestep_fps > 0.0 && self.timing.max_timestep_fps.is_finite()) {
            return Err("timing.max_timestep_fps must be positive".to_string());
        }

        // Check interaction
        if self.interaction.strength < 0.0 {
            return Err("interaction.strength must be non-negative".to_string());
        }

        // Kernel-level parameter checks
        self.to_params()
            .validate()
            .map_err(|e| format!("Invalid fluid parameters: {}", e))
    }

    /// Kernel parameter snapshot for this scene
    pub fn to_params(&self) -> SimParams {
        let f = &self.fluid;
        let mut params = SimParams::default()
            .with_smoothing_radius(f.smoothing_radius)
            .with_target_density(f.target_density)
            .with_pressure(f.pressure_multiplier, f.near_pressure_multiplier)
            .with_viscosity(f.viscosity_strength)
            .with_gravity(Vec2::from_array(f.gravity))
            .with_collision_damping(f.collision_damping)
            .with_particle_mass(f.particle_mass)
            .with_particle_radius(f.particle_radius)
            .with_bounds_size(Vec2::from_array(self.bounds))
            .with_interaction_radius(self.interaction.radius);
        if let Some(obstacle) = &self.obstacle {
            params = params.with_obstacle(
                Vec2::from_array(obstacle.centre),
                Vec2::from_array(obstacle.size),
            );
        }
        params.delta_time = self.timing.step_dt(f32::INFINITY);
        params
    }

    /// Spawner for the initial particle block
    pub fn spawner(&self) -> ParticleSpawner {
        ParticleSpawner {
            count: self.particle_count,
            centre: Vec2::from_array(self.spawn.centre),
            size: Vec2::from_array(self.spawn.size),
            initial_velocity: Vec2::from_array(self.spawn.initial_velocity),
            jitter_strength: self.spawn.jitter_strength,
            seed: self.spawn.seed,
        }
    }

    /// Cell table size actually used
    pub fn effective_cell_table_size(&self) -> usize {
        self.cell_table_size.unwrap_or(self.particle_count)
    }

    /// Spawn the particles and build the simulation
    pub fn build_simulation(&self) -> Result<FluidSimulation, String> {
        self.build_simulation_from(&self.spawner().spawn())
    }

    /// Build the simulation from an already spawned particle block
    pub fn build_simulation_from(&self, spawn: &SpawnData) -> Result<FluidSimulation, String> {
        FluidSimulation::with_cell_table_size(
            self.to_params(),
            spawn.positions.clone(),
            spawn.velocities.clone(),
            self.effective_cell_table_size(),
        )
        .map_err(|e| format!("Failed to create simulation: {}", e))
    }
}
