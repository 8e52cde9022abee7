//! Per-step simulation parameters.
//!
//! [`SimParams`] is an immutable snapshot handed by reference to every stage
//! of a step. Host inputs (interaction point, mouse buttons, delta time) are
//! copied into it once, before the first stage runs.
//!
//! The struct is `#[repr(C)]` and `Pod` so a host can upload it verbatim as a
//! uniform buffer for a GPU rendition of the same stages.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};

/// Divisor applied to the interaction strength when blending gravity out near
/// the interaction centre.
const INTERACTION_GRAVITY_FALLOFF: f32 = 10.0;

/// Immutable-per-step simulation configuration.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
#[serde(default)]
pub struct SimParams {
    /// Kernel support radius `h`; also the spatial hash cell size.
    pub smoothing_radius: f32,
    /// Rest density the pressure term drives towards.
    pub target_density: f32,
    /// Stiffness of the density pressure term.
    pub pressure_multiplier: f32,
    /// Stiffness of the short-range near-pressure term.
    pub near_pressure_multiplier: f32,
    /// Strength of velocity diffusion between neighbors.
    pub viscosity_strength: f32,
    /// Fraction of normal velocity kept (and reversed) after a wall hit.
    pub collision_damping: f32,
    /// Mass carried by every particle.
    pub particle_mass: f32,
    /// Collision radius of a particle, subtracted from the bounds.
    pub particle_radius: f32,
    /// Signed interaction strength: positive pulls, negative pushes, zero is off.
    pub interaction_strength: f32,
    /// Radius of the interaction disc.
    pub interaction_radius: f32,
    /// Timestep of the current step (seconds).
    pub delta_time: f32,
    /// Gravitational acceleration.
    pub gravity: Vec2,
    /// Half-extent of the axis-aligned container centred at the origin.
    pub half_bounds: Vec2,
    /// Interaction point in simulation space.
    pub interaction_point: Vec2,
    /// Centre of the obstacle box.
    pub obstacle_centre: Vec2,
    /// Half-extent of the obstacle box; zero on either axis disables it.
    pub obstacle_half_size: Vec2,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            smoothing_radius: 0.35,
            target_density: 55.0,
            pressure_multiplier: 500.0,
            near_pressure_multiplier: 18.0,
            viscosity_strength: 0.06,
            collision_damping: 0.95,
            particle_mass: 1.0,
            particle_radius: 0.0,
            interaction_strength: 0.0,
            interaction_radius: 2.0,
            delta_time: 1.0 / 120.0,
            gravity: Vec2::new(0.0, -12.0),
            half_bounds: Vec2::new(8.55, 4.65),
            interaction_point: Vec2::ZERO,
            obstacle_centre: Vec2::ZERO,
            obstacle_half_size: Vec2::ZERO,
        }
    }
}

impl SimParams {
    /// Set the smoothing radius.
    pub fn with_smoothing_radius(mut self, h: f32) -> Self {
        self.smoothing_radius = h;
        self
    }

    /// Set the target (rest) density.
    pub fn with_target_density(mut self, density: f32) -> Self {
        self.target_density = density;
        self
    }

    /// Set pressure and near-pressure multipliers.
    pub fn with_pressure(mut self, pressure: f32, near_pressure: f32) -> Self {
        self.pressure_multiplier = pressure;
        self.near_pressure_multiplier = near_pressure;
        self
    }

    /// Set viscosity strength.
    pub fn with_viscosity(mut self, strength: f32) -> Self {
        self.viscosity_strength = strength;
        self
    }

    /// Set the gravity vector.
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set collision damping.
    pub fn with_collision_damping(mut self, damping: f32) -> Self {
        self.collision_damping = damping;
        self
    }

    /// Set the container from its full size (the stored value is half of it).
    pub fn with_bounds_size(mut self, size: Vec2) -> Self {
        self.half_bounds = size * 0.5;
        self
    }

    /// Set particle mass.
    pub fn with_particle_mass(mut self, mass: f32) -> Self {
        self.particle_mass = mass;
        self
    }

    /// Set particle collision radius.
    pub fn with_particle_radius(mut self, radius: f32) -> Self {
        self.particle_radius = radius;
        self
    }

    /// Place an obstacle box given its centre and full size.
    pub fn with_obstacle(mut self, centre: Vec2, size: Vec2) -> Self {
        self.obstacle_centre = centre;
        self.obstacle_half_size = size * 0.5;
        self
    }

    /// Set the interaction point and signed strength for the next step.
    pub fn with_interaction(mut self, point: Vec2, signed_strength: f32) -> Self {
        self.interaction_point = point;
        self.interaction_strength = signed_strength;
        self
    }

    /// Set the interaction radius.
    pub fn with_interaction_radius(mut self, radius: f32) -> Self {
        self.interaction_radius = radius;
        self
    }

    /// Whether an obstacle box takes part in collision handling.
    #[inline]
    pub fn has_obstacle(&self) -> bool {
        self.obstacle_half_size.x > 0.0 && self.obstacle_half_size.y > 0.0
    }

    /// Whether a pull or push interaction is active this step.
    #[inline]
    pub fn interaction_active(&self) -> bool {
        self.interaction_strength != 0.0 && self.interaction_radius > 0.0
    }

    /// Weight applied to gravity at the very centre of a pull interaction.
    ///
    /// Pushes never weaken gravity.
    #[inline]
    pub fn interaction_gravity_weight(&self, centre_t: f32) -> f32 {
        1.0 - centre_t * (self.interaction_strength / INTERACTION_GRAVITY_FALLOFF).clamp(0.0, 1.0)
    }

    /// Check every parameter a step depends on.
    pub fn validate(&self) -> Result<()> {
        let h = self.smoothing_radius;
        if !(h > 0.0 && h.is_finite()) {
            return Err(KernelError::InvalidSmoothingRadius(h));
        }
        let half = self.half_bounds;
        if !(half.x > 0.0 && half.y > 0.0 && half.is_finite()) {
            return Err(KernelError::InvalidBounds { x: half.x, y: half.y });
        }

        non_negative("target_density", self.target_density)?;
        non_negative("pressure_multiplier", self.pressure_multiplier)?;
        non_negative("near_pressure_multiplier", self.near_pressure_multiplier)?;
        non_negative("viscosity_strength", self.viscosity_strength)?;
        non_negative("collision_damping", self.collision_damping)?;
        non_negative("particle_radius", self.particle_radius)?;
        non_negative("interaction_radius", self.interaction_radius)?;
        non_negative("delta_time", self.delta_time)?;

        if !(self.particle_mass > 0.0 && self.particle_mass.is_finite()) {
            return Err(KernelError::InvalidParameter {
                name: "particle_mass",
                value: self.particle_mass,
            });
        }
        if self.particle_radius >= half.x.min(half.y) {
            return Err(KernelError::InvalidParameter {
                name: "particle_radius",
                value: self.particle_radius,
            });
        }
        if self.has_obstacle() {
            let reach = self.obstacle_centre.abs() + self.obstacle_half_size;
            if !(reach.is_finite() && reach.x <= half.x && reach.y <= half.y) {
                return Err(KernelError::ObstacleOutsideBounds {
                    x: self.obstacle_centre.x,
                    y: self.obstacle_centre.y,
                });
            }
        }
        if !self.interaction_strength.is_finite() {
            return Err(KernelError::InvalidParameter {
                name: "interaction_strength",
                value: self.interaction_strength,
            });
        }
        if !self.gravity.is_finite() {
            return Err(KernelError::InvalidParameter {
                name: "gravity",
                value: self.gravity.length(),
            });
        }
        Ok(())
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(KernelError::InvalidParameter { name, value })
    }
}

/// Mouse-style interaction state sampled by the host once per step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InteractionInput {
    /// Interaction point in simulation space.
    pub point: Vec2,
    /// Pull particles towards the point (e.g. left button held).
    pub pull: bool,
    /// Push particles away from the point (e.g. right button held).
    pub push: bool,
}

impl InteractionInput {
    /// Signed strength for the current buttons.
    ///
    /// Pull maps to `+strength`, push to `-strength`; both or neither is inactive.
    pub fn signed_strength(&self, strength: f32) -> f32 {
        match (self.pull, self.push) {
            (true, false) => strength,
            (false, true) => -strength,
            _ => 0.0,
        }
    }

    /// Copy this input into a parameter snapshot.
    pub fn apply(&self, params: SimParams, strength: f32) -> SimParams {
        params.with_interaction(self.point, self.signed_strength(strength))
    }
}
