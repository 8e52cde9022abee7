//! Particle data structures using struct-of-arrays layout.
//!
//! All arrays are parallel: index `i` across every array refers to the same
//! particle. The population is fixed once the arrays are created; resets
//! overwrite in place without reallocating.

use glam::Vec2;

use crate::error::{KernelError, Result};

/// Struct-of-arrays particle storage.
#[derive(Debug, Clone)]
pub struct ParticleArrays {
    /// Authoritative positions. Written only by integration and collision.
    pub position: Vec<Vec2>,
    /// One-step look-ahead positions used for hashing and the SPH kernels.
    pub predicted_position: Vec<Vec2>,
    /// Velocities.
    pub velocity: Vec<Vec2>,
    /// Packed `(density, near_density)` per particle.
    pub density: Vec<Vec2>,
    /// Free scalar carried along with each particle; ignored by the physics.
    pub property: Vec<f32>,
}

impl ParticleArrays {
    /// Allocate arrays for the given initial positions and velocities.
    ///
    /// Predicted positions start at the initial positions, densities and
    /// properties at zero.
    pub fn new(positions: Vec<Vec2>, velocities: Vec<Vec2>) -> Result<Self> {
        let n = positions.len();
        if n == 0 {
            return Err(KernelError::EmptyPopulation);
        }
        if velocities.len() != n {
            return Err(KernelError::ArrayLengthMismatch {
                name: "velocities",
                expected: n,
                actual: velocities.len(),
            });
        }
        Ok(Self {
            predicted_position: positions.clone(),
            position: positions,
            velocity: velocities,
            density: vec![Vec2::ZERO; n],
            property: vec![0.0; n],
        })
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.position.len()
    }

    /// Always `false` for a constructed store; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// Overwrite kinematic state in place with new initial conditions.
    ///
    /// Densities and properties are cleared.
    pub fn reset(&mut self, positions: &[Vec2], velocities: &[Vec2]) -> Result<()> {
        let n = self.len();
        if positions.len() != n {
            return Err(KernelError::ArrayLengthMismatch {
                name: "positions",
                expected: n,
                actual: positions.len(),
            });
        }
        if velocities.len() != n {
            return Err(KernelError::ArrayLengthMismatch {
                name: "velocities",
                expected: n,
                actual: velocities.len(),
            });
        }
        self.position.copy_from_slice(positions);
        self.predicted_position.copy_from_slice(positions);
        self.velocity.copy_from_slice(velocities);
        self.density.fill(Vec2::ZERO);
        self.property.fill(0.0);
        Ok(())
    }
}

/// Per-particle record laid out for direct upload to a rendering layer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleInstance {
    /// Current position.
    pub position: Vec2,
    /// Current velocity.
    pub velocity: Vec2,
    /// `(density, near_density)`.
    pub density: Vec2,
    /// Host scalar property.
    pub property: f32,
    /// Pads the record to 32 bytes.
    pub _padding: f32,
}
